//! # Meter Orchestration
//!
//! A [`Meter`] binds a configured identity (name, address, driver
//! selection, optional key) to the decoding pipeline and holds the most
//! recent [`Reading`]. For each telegram addressed to it the meter runs
//! frame parsing, CRC validation, decryption and driver decoding; a
//! failed telegram is reported and simply waits for the next periodic
//! broadcast — there is no immediate retry.
//!
//! A meter starts unbound (no driver resolved). The first processed
//! telegram, or an explicit [`Meter::bind`], resolves the driver; once
//! bound the meter stays bound for its lifetime. If resolution fails the
//! meter remains unbound and the caller must reconfigure.

use crate::drivers::{Driver, DriverRegistry};
use crate::error::WMBusError;
use crate::payload::record::DataRecord;
use crate::wmbus::crc;
use crate::wmbus::crypto::{self, AesKey};
use crate::wmbus::frame::WMBusFrame;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Driver selection from the configuration collaborator.
#[derive(Debug, Clone)]
pub enum DriverSelection {
    /// Resolve by matching the telegram header against registry claims
    Auto,
    /// Use the named driver
    Named(String),
}

/// Validated per-meter configuration handed to the core.
///
/// The core never parses configuration file syntax and never persists
/// these values.
#[derive(Debug, Clone)]
pub struct MeterConfig {
    /// User-assigned name
    pub name: String,
    /// Device address the meter broadcasts under
    pub address: u32,
    /// Driver selection (explicit or auto)
    pub driver: DriverSelection,
    /// AES-128 key for encrypted telegrams
    pub key: Option<AesKey>,
}

/// One decoded telegram: ordered data records plus metadata.
///
/// Immutable once produced; a new telegram produces a new reading and
/// never mutates a prior one. Sinks receive a clone.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    /// Name of the meter that produced this reading
    pub meter: String,
    /// Device address the telegram carried
    pub address: u32,
    /// Access number of the telegram (0 without application header)
    pub access_number: u8,
    /// Decode timestamp
    pub timestamp: DateTime<Utc>,
    /// Ordered decoded records
    pub records: Vec<DataRecord>,
}

impl Reading {
    /// Current (storage 0, instantaneous) value of a quantity.
    pub fn current(&self, quantity: &str) -> Option<&DataRecord> {
        self.records.iter().find(|r| r.is_current(quantity))
    }

    /// True when any record could not be interpreted.
    pub fn has_unparsed_records(&self) -> bool {
        self.records.iter().any(|r| !r.parsed)
    }
}

/// A configured meter bound to the decoding pipeline.
pub struct Meter {
    config: MeterConfig,
    driver: Option<Arc<dyn Driver>>,
    last_reading: Option<Reading>,
    last_access_number: Option<u8>,
}

impl Meter {
    /// Create an unbound meter from its configuration.
    pub fn new(config: MeterConfig) -> Self {
        Self {
            config,
            driver: None,
            last_reading: None,
            last_access_number: None,
        }
    }

    /// The user-assigned meter name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The configured device address.
    pub fn address(&self) -> u32 {
        self.config.address
    }

    /// True once a driver has been resolved.
    pub fn is_bound(&self) -> bool {
        self.driver.is_some()
    }

    /// The most recent reading, if any telegram decoded successfully.
    pub fn last_reading(&self) -> Option<&Reading> {
        self.last_reading.as_ref()
    }

    /// Explicitly resolve this meter's driver against the registry.
    ///
    /// On failure the meter stays unbound; there is no retry, the caller
    /// must fix the configuration.
    pub fn bind(&mut self, registry: &DriverRegistry) -> Result<(), WMBusError> {
        if self.driver.is_some() {
            return Ok(());
        }

        let driver = match &self.config.driver {
            DriverSelection::Named(name) => registry
                .by_name(name)
                .ok_or_else(|| WMBusError::UnknownDriver(name.clone()))?,
            DriverSelection::Auto => {
                // Auto resolution needs a telegram header; it happens on
                // the first processed telegram instead.
                return Ok(());
            }
        };

        log::info!(
            "Meter {} bound to driver {}",
            self.config.name,
            driver.descriptor().name
        );
        self.driver = Some(driver);
        Ok(())
    }

    /// Run the full pipeline for one telegram addressed to this meter.
    pub fn process_telegram(
        &mut self,
        registry: &DriverRegistry,
        raw: &[u8],
    ) -> Result<&Reading, WMBusError> {
        let frame = WMBusFrame::parse(raw)?;
        self.process_frame(registry, &frame, raw)
    }

    /// Pipeline entry for an already-parsed frame (the dispatcher parses
    /// the header once and shares it).
    pub fn process_frame(
        &mut self,
        registry: &DriverRegistry,
        frame: &WMBusFrame,
        raw: &[u8],
    ) -> Result<&Reading, WMBusError> {
        if frame.address != self.config.address {
            return Err(WMBusError::AddressMismatch {
                expected: self.config.address,
                actual: frame.address,
            });
        }

        // A corrupted frame cannot be trusted; dropped, not fatal
        crc::check_telegram(raw)?;

        // Out-of-order telegrams must not overwrite the stored reading.
        // Only enforced when the application header carries a counter.
        if frame.has_app_header {
            if let Some(last) = self.last_access_number {
                if !access_number_advances(last, frame.access_number) {
                    return Err(WMBusError::OutOfOrderTelegram {
                        received: frame.access_number,
                        last,
                    });
                }
            }
        }

        let payload = crypto::decrypt_payload(frame, self.config.key.as_ref())?;

        let driver = self.resolve_driver(registry, frame)?;
        let records: Vec<DataRecord> = driver.decode(frame, &payload);

        let reading = Reading {
            meter: self.config.name.clone(),
            address: frame.address,
            access_number: frame.access_number,
            timestamp: Utc::now(),
            records,
        };

        if frame.has_app_header {
            self.last_access_number = Some(frame.access_number);
        }
        self.last_reading = Some(reading);

        log::info!("Meter {} updated", self.config.name);
        Ok(self.last_reading.as_ref().unwrap())
    }

    /// Resolve (and cache) the driver for this meter.
    fn resolve_driver(
        &mut self,
        registry: &DriverRegistry,
        frame: &WMBusFrame,
    ) -> Result<Arc<dyn Driver>, WMBusError> {
        if let Some(driver) = &self.driver {
            return Ok(Arc::clone(driver));
        }

        let driver = match &self.config.driver {
            DriverSelection::Named(name) => registry
                .by_name(name)
                .ok_or_else(|| WMBusError::UnknownDriver(name.clone()))?,
            DriverSelection::Auto => registry.find_driver(&frame.header())?,
        };

        log::info!(
            "Meter {} bound to driver {}",
            self.config.name,
            driver.descriptor().name
        );
        self.driver = Some(Arc::clone(&driver));
        Ok(driver)
    }
}

/// Serial-number comparison of u8 access numbers.
///
/// The counter wraps at 255, so "greater" means a forward distance of
/// 1..=127.
fn access_number_advances(last: u8, new: u8) -> bool {
    let distance = new.wrapping_sub(last);
    distance != 0 && distance < 0x80
}
