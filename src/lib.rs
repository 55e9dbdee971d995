//! # wmbus-rs - A Rust Crate for Wireless M-Bus Telegram Decoding
//!
//! The wmbus-rs crate decodes wireless M-Bus (wM-Bus) telegrams — the
//! short radio frames utility meters (water, heat, electricity, gas)
//! broadcast periodically — into structured, typed readings that
//! downstream integrations (file sinks, MQTT, databases) can consume.
//!
//! ## Features
//!
//! - Parse wM-Bus link-layer frames into header fields and payload
//! - Validate the EN 13757-4 block CRCs (polynomial 0x3D65)
//! - Decrypt mode 5 (AES-128 CBC) payloads with externally supplied keys
//! - Decode the self-describing DIF/VIF data record stream
//! - Match telegrams to meter-family drivers by declared capability
//! - Route telegrams to configured meters and keep the latest reading
//! - Analysis mode that suggests candidate drivers for unknown meters
//!
//! ## Usage
//!
//! ```rust
//! use wmbus_rs::{Dispatcher, DriverSelection, MeterConfig};
//!
//! let dispatcher = Dispatcher::with_default_drivers();
//! dispatcher.add_meter(MeterConfig {
//!     name: "kitchen".to_string(),
//!     address: 0x57573713,
//!     driver: DriverSelection::Auto,
//!     key: None,
//! });
//!
//! // Feed telegram bytes from your receiver:
//! // dispatcher.process_telegram(&raw)?;
//! ```

pub mod constants;
pub mod dispatcher;
pub mod drivers;
pub mod error;
pub mod logging;
pub mod meter;
pub mod payload;
pub mod util;
pub mod wmbus;

pub use crate::error::WMBusError;
pub use crate::logging::{init_logger, log_info};

// Core pipeline types
pub use dispatcher::{Dispatcher, TelegramAnalysis, TelegramOutcome};
pub use meter::{DriverSelection, Meter, MeterConfig, Reading};
pub use payload::{decode_records, DataRecord, RecordFunction, RecordValue};
pub use wmbus::{
    decode_manufacturer, encode_manufacturer, AesKey, DeviceType, EncryptionMode, TelegramHeader,
    WMBusFrame,
};

// Driver system
pub use drivers::{
    Driver, DriverDescriptor, DriverMatch, DriverRegistry, MatchQuality, VersionClaim,
};
