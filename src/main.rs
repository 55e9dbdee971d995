use anyhow::Context;
use clap::{Parser, Subcommand};
use wmbus_rs::util::hex::decode_hex;
use wmbus_rs::{
    init_logger, AesKey, Dispatcher, DriverRegistry, DriverSelection, Meter, MeterConfig,
    WMBusFrame,
};

#[derive(Parser)]
#[command(name = "wmbus-cli")]
#[command(about = "CLI tool for decoding wM-Bus telegrams")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a telegram and list candidate drivers
    Analyze {
        /// Telegram bytes as hex
        telegram: String,
    },
    /// Decode a telegram end to end
    Decode {
        /// Telegram bytes as hex
        telegram: String,
        /// Driver name ("auto" resolves from the registry)
        #[arg(short, long, default_value = "auto")]
        driver: String,
        /// AES-128 key as hex, for encrypted telegrams
        #[arg(short, long)]
        key: Option<String>,
        /// Meter name used in the output
        #[arg(short, long, default_value = "meter")]
        name: String,
    },
    /// List the registered drivers
    Drivers,
}

fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { telegram } => {
            let raw = decode_hex(&telegram).context("telegram is not valid hex")?;
            let dispatcher = Dispatcher::with_default_drivers();
            let analysis = dispatcher
                .analyze_telegram(&raw)
                .context("telegram analysis failed")?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Commands::Decode {
            telegram,
            driver,
            key,
            name,
        } => {
            let raw = decode_hex(&telegram).context("telegram is not valid hex")?;
            let frame = WMBusFrame::parse(&raw).context("frame parsing failed")?;

            let selection = if driver.eq_ignore_ascii_case("auto") {
                DriverSelection::Auto
            } else {
                DriverSelection::Named(driver)
            };
            let key = key
                .map(|k| AesKey::from_hex(&k))
                .transpose()
                .context("invalid AES key")?;

            let registry = DriverRegistry::with_defaults();
            let mut meter = Meter::new(MeterConfig {
                name,
                address: frame.address,
                driver: selection,
                key,
            });

            let reading = meter
                .process_telegram(&registry, &raw)
                .context("telegram decoding failed")?;
            println!("{}", serde_json::to_string_pretty(reading)?);
        }
        Commands::Drivers => {
            let registry = DriverRegistry::with_defaults();
            for descriptor in registry.descriptors() {
                println!("{:<12} {}", descriptor.name, descriptor.description);
            }
        }
    }

    Ok(())
}
