//! # Meter Driver System
//!
//! A driver is the per-meter-family unit that turns a decrypted payload
//! into named, typed, unit-tagged values. Drivers declare a static claim
//! (manufacturer codes, device types, version) and the registry selects
//! one by matching a telegram's header against those claims — no runtime
//! reflection, just an explicitly populated list.
//!
//! Matching policy: an exact version claim beats any wildcard claim. Two
//! exact claims for the same header are a configuration error reported as
//! `AmbiguousDriver`; silently picking one would risk mis-decoding
//! billing data. Wildcard ties resolve by registration order, which keeps
//! `find_driver` deterministic.

pub mod generic;
pub mod multical21;
pub mod qwater;

use crate::error::WMBusError;
use crate::payload::record::{DataRecord, RecordValue};
use crate::wmbus::frame::{DeviceType, TelegramHeader, WMBusFrame};
use serde::Serialize;
use std::sync::Arc;

/// Version claim of a driver descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionClaim {
    /// Any version (wildcard)
    Any,
    /// Any version greater than or equal to the given one (wildcard)
    AtLeast(u8),
    /// One of the listed versions (exact)
    Exact(&'static [u8]),
}

/// How well a descriptor matched a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum MatchQuality {
    Exact,
    Wildcard,
}

/// Static identity and capability claim of a driver.
#[derive(Debug, Clone)]
pub struct DriverDescriptor {
    /// Short driver name used in configuration ("multical21")
    pub name: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Claimed manufacturer codes; empty claims all manufacturers
    pub manufacturers: &'static [&'static str],
    /// Claimed device types; empty claims all types
    pub device_types: &'static [DeviceType],
    /// Claimed versions
    pub versions: VersionClaim,
}

impl DriverDescriptor {
    /// Evaluate this claim against a telegram header.
    pub fn matches(&self, header: &TelegramHeader) -> Option<MatchQuality> {
        if !self.manufacturers.is_empty()
            && !self.manufacturers.contains(&header.manufacturer().as_str())
        {
            return None;
        }

        if !self.device_types.is_empty() && !self.device_types.contains(&header.device_type) {
            return None;
        }

        match self.versions {
            VersionClaim::Any => Some(MatchQuality::Wildcard),
            VersionClaim::AtLeast(min) if header.version >= min => Some(MatchQuality::Wildcard),
            VersionClaim::AtLeast(_) => None,
            VersionClaim::Exact(versions) if versions.contains(&header.version) => {
                Some(MatchQuality::Exact)
            }
            VersionClaim::Exact(_) => None,
        }
    }
}

/// Uniform decode contract implemented once per meter family.
///
/// `decode` receives the parsed frame (for status bits and model
/// detection) and the decrypted records area. Record-level problems are
/// recovered locally into flagged records; decode itself does not fail.
pub trait Driver: Send + Sync {
    /// The static claim this driver registers under.
    fn descriptor(&self) -> &DriverDescriptor;

    /// Decode the payload's data records into meter values.
    fn decode(&self, frame: &WMBusFrame, payload: &[u8]) -> Vec<DataRecord>;
}

/// One candidate from [`DriverRegistry::analyze`].
#[derive(Debug, Clone, Serialize)]
pub struct DriverMatch {
    pub name: String,
    pub quality: MatchQuality,
}

/// Holds the set of known drivers in registration order.
///
/// Built once at startup and shared by reference; registration happens
/// before dispatch starts, so lookups are read-only.
pub struct DriverRegistry {
    drivers: Vec<Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            drivers: Vec::new(),
        }
    }

    /// Create a registry with the built-in drivers registered.
    ///
    /// The generic fallback is registered last so its wildcard claim
    /// never shadows a dedicated driver.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(multical21::Multical21::new()));
        registry.register(Arc::new(qwater::QWater::new()));
        registry.register(Arc::new(generic::Generic::new()));
        registry
    }

    /// Register a driver. Insertion order is the wildcard tie-break.
    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        log::debug!("Registered driver: {}", driver.descriptor().name);
        self.drivers.push(driver);
    }

    /// Select the driver for a header.
    ///
    /// Exact version matches are preferred over wildcard matches. More
    /// than one exact match is reported as `AmbiguousDriver`; no match at
    /// all as `NoMatch`.
    pub fn find_driver(&self, header: &TelegramHeader) -> Result<Arc<dyn Driver>, WMBusError> {
        let mut exact: Vec<&Arc<dyn Driver>> = Vec::new();
        let mut wildcard: Option<&Arc<dyn Driver>> = None;

        for driver in &self.drivers {
            match driver.descriptor().matches(header) {
                Some(MatchQuality::Exact) => exact.push(driver),
                Some(MatchQuality::Wildcard) => {
                    wildcard.get_or_insert(driver);
                }
                None => {}
            }
        }

        match exact.len() {
            1 => Ok(Arc::clone(exact[0])),
            0 => wildcard.map(Arc::clone).ok_or_else(|| WMBusError::NoMatch {
                manufacturer: header.manufacturer(),
                device_type: header.device_type.as_byte(),
                version: header.version,
            }),
            _ => Err(WMBusError::AmbiguousDriver(
                exact
                    .iter()
                    .map(|d| d.descriptor().name.to_string())
                    .collect(),
            )),
        }
    }

    /// Look up a driver by its configured name.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers
            .iter()
            .find(|d| d.descriptor().name.eq_ignore_ascii_case(name))
            .map(Arc::clone)
    }

    /// Ordered list of all drivers whose claim matches the header,
    /// without decoding anything. Diagnostic mode for unconfigured
    /// meters.
    pub fn analyze(&self, header: &TelegramHeader) -> Vec<DriverMatch> {
        self.drivers
            .iter()
            .filter_map(|driver| {
                driver.descriptor().matches(header).map(|quality| DriverMatch {
                    name: driver.descriptor().name.to_string(),
                    quality,
                })
            })
            .collect()
    }

    /// Descriptors of every registered driver, for listings.
    pub fn descriptors(&self) -> Vec<&DriverDescriptor> {
        self.drivers.iter().map(|d| d.descriptor()).collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Build the textual status record drivers append to their output.
pub(crate) fn status_record(flags: Vec<&'static str>) -> DataRecord {
    let text = if flags.is_empty() {
        "OK".to_string()
    } else {
        flags.join(" ")
    };
    DataRecord::synthetic("Status", RecordValue::Text(text), "")
}
