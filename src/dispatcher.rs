//! # Telegram Dispatcher
//!
//! Owns the meter collection, keyed by device address. Each incoming
//! telegram's header is parsed once; the address is looked up in O(1) and
//! the telegram is delegated to the matching meter. Unmatched telegrams
//! are reported as unrecognized rather than blindly tried against every
//! meter's driver — the separately invoked analysis mode exists for that
//! case and surfaces the registry's candidate drivers to a human.
//!
//! The meter map supports concurrent lookups with single-writer updates;
//! per-meter decoding is serialized through the meter's own lock, so
//! telegrams for different meters may be processed concurrently while two
//! telegrams for the same meter are ordered by receipt.

use crate::drivers::{DriverMatch, DriverRegistry};
use crate::error::WMBusError;
use crate::meter::{Meter, MeterConfig, Reading};
use crate::payload::record::{decode_records, DataRecord};
use crate::util::logging::{log_frame_hex, LogThrottle};
use crate::wmbus::crypto::EncryptionMode;
use crate::wmbus::frame::WMBusFrame;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Result of routing one telegram.
#[derive(Debug)]
pub enum TelegramOutcome {
    /// The telegram decoded successfully on a configured meter.
    Decoded { meter: String, reading: Reading },
    /// No configured meter matches the telegram's address.
    Unrecognized { address: u32, manufacturer: String },
}

/// Diagnostic analysis of a telegram, for the unmatched case.
#[derive(Debug, Serialize)]
pub struct TelegramAnalysis {
    pub manufacturer: String,
    pub address: u32,
    pub version: u8,
    pub device_type: String,
    pub encrypted: bool,
    pub encryption_mode: u8,
    pub access_number: u8,
    /// Drivers whose claim matches the header, in registry order
    pub candidate_drivers: Vec<DriverMatch>,
    /// Decoded records (only for unencrypted payloads)
    pub records: Vec<DataRecord>,
}

/// Routes telegrams to the meters configured for them.
pub struct Dispatcher {
    registry: DriverRegistry,
    meters: RwLock<HashMap<u32, Arc<Mutex<Meter>>>>,
    /// Throttles the unrecognized-telegram log; an unconfigured meter
    /// nearby would otherwise spam every few seconds
    unrecognized_throttle: Mutex<LogThrottle>,
}

impl Dispatcher {
    /// Create a dispatcher around an explicitly populated registry.
    pub fn new(registry: DriverRegistry) -> Self {
        Self {
            registry,
            meters: RwLock::new(HashMap::new()),
            unrecognized_throttle: Mutex::new(LogThrottle::new(10_000, 5)),
        }
    }

    /// Create a dispatcher with the built-in drivers.
    pub fn with_default_drivers() -> Self {
        Self::new(DriverRegistry::with_defaults())
    }

    /// The driver registry this dispatcher selects from.
    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Add a configured meter. A meter already registered under the same
    /// address is replaced.
    pub fn add_meter(&self, config: MeterConfig) {
        let address = config.address;
        let meter = Arc::new(Mutex::new(Meter::new(config)));

        let mut meters = self.meters.write().unwrap();
        if meters.insert(address, meter).is_some() {
            log::warn!("Replaced meter registered for address {address:#010x}");
        }
    }

    /// Number of configured meters.
    pub fn meter_count(&self) -> usize {
        self.meters.read().unwrap().len()
    }

    /// Clone of the most recent reading of the meter at `address`.
    pub fn reading(&self, address: u32) -> Option<Reading> {
        let meter = {
            let meters = self.meters.read().unwrap();
            meters.get(&address).cloned()
        }?;
        let guard = meter.lock().unwrap();
        guard.last_reading().cloned()
    }

    /// Route one telegram to its meter.
    ///
    /// The header is parsed here exactly once and shared with the meter.
    /// An address with no configured meter yields `Unrecognized`; decode
    /// failures on the configured meter propagate as typed errors.
    pub fn process_telegram(&self, raw: &[u8]) -> Result<TelegramOutcome, WMBusError> {
        let frame = WMBusFrame::parse(raw)?;

        let meter = {
            let meters = self.meters.read().unwrap();
            meters.get(&frame.address).cloned()
        };

        match meter {
            Some(meter) => {
                let mut guard = meter.lock().unwrap();
                let reading = guard.process_frame(&self.registry, &frame, raw)?.clone();
                Ok(TelegramOutcome::Decoded {
                    meter: guard.name().to_string(),
                    reading,
                })
            }
            None => {
                if self.unrecognized_throttle.lock().unwrap().allow() {
                    log::debug!(
                        "Unrecognized telegram from {} address {:#010x}",
                        frame.manufacturer(),
                        frame.address
                    );
                    log_frame_hex("Unrecognized telegram", raw);
                }
                Ok(TelegramOutcome::Unrecognized {
                    address: frame.address,
                    manufacturer: frame.manufacturer(),
                })
            }
        }
    }

    /// Analyze a telegram without routing it: header fields plus the
    /// ordered candidate driver list, to help a human choose a driver
    /// and key for an unconfigured meter.
    pub fn analyze_telegram(&self, raw: &[u8]) -> Result<TelegramAnalysis, WMBusError> {
        let frame = WMBusFrame::parse(raw)?;
        let mode = EncryptionMode::from_security_word(frame.security_word);

        let records = if mode == EncryptionMode::None {
            decode_records(&frame.payload)
        } else {
            Vec::new()
        };

        Ok(TelegramAnalysis {
            manufacturer: frame.manufacturer(),
            address: frame.address,
            version: frame.version,
            device_type: frame.device_type.name(),
            encrypted: mode != EncryptionMode::None,
            encryption_mode: mode.mode_number(),
            access_number: frame.access_number,
            candidate_drivers: self.registry.analyze(&frame.header()),
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::DriverSelection;
    use crate::payload::record::encode_record;
    use crate::wmbus::frame::encode_manufacturer;

    fn telegram(address: u32, access_number: u8) -> Vec<u8> {
        WMBusFrame::build(
            0x44,
            encode_manufacturer("KAM").unwrap(),
            address,
            0x1B,
            0x07,
            access_number,
            0x00,
            0x0000,
            &encode_record(0x04, 0x13, 1234),
        )
    }

    fn dispatcher_with_meter(address: u32) -> Dispatcher {
        let dispatcher = Dispatcher::with_default_drivers();
        dispatcher.add_meter(MeterConfig {
            name: "kitchen".to_string(),
            address,
            driver: DriverSelection::Auto,
            key: None,
        });
        dispatcher
    }

    #[test]
    fn test_routing_to_configured_meter() {
        let dispatcher = dispatcher_with_meter(0x57573713);

        match dispatcher.process_telegram(&telegram(0x57573713, 1)).unwrap() {
            TelegramOutcome::Decoded { meter, reading } => {
                assert_eq!(meter, "kitchen");
                assert!(reading.current("Volume").is_some());
            }
            other => panic!("expected Decoded, got {other:?}"),
        }

        assert!(dispatcher.reading(0x57573713).is_some());
    }

    #[test]
    fn test_unknown_address_unrecognized() {
        let dispatcher = dispatcher_with_meter(0x57573713);

        match dispatcher.process_telegram(&telegram(0x11111111, 1)).unwrap() {
            TelegramOutcome::Unrecognized { address, manufacturer } => {
                assert_eq!(address, 0x11111111);
                assert_eq!(manufacturer, "KAM");
            }
            other => panic!("expected Unrecognized, got {other:?}"),
        }
    }

    #[test]
    fn test_analysis_lists_candidates() {
        let dispatcher = Dispatcher::with_default_drivers();
        let analysis = dispatcher.analyze_telegram(&telegram(0x22222222, 9)).unwrap();

        assert_eq!(analysis.manufacturer, "KAM");
        assert_eq!(analysis.device_type, "water");
        assert!(!analysis.encrypted);
        let names: Vec<_> = analysis
            .candidate_drivers
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert!(names.contains(&"multical21"));
        assert!(!analysis.records.is_empty());
    }

    #[test]
    fn test_meter_replacement_warns_not_fails() {
        let dispatcher = dispatcher_with_meter(0x57573713);
        dispatcher.add_meter(MeterConfig {
            name: "kitchen-v2".to_string(),
            address: 0x57573713,
            driver: DriverSelection::Auto,
            key: None,
        });
        assert_eq!(dispatcher.meter_count(), 1);
    }
}
