//! Kamstrup Multical 21 Water Meter Driver
//!
//! The Multical 21 is a battery-powered ultrasonic water meter that
//! broadcasts total volume, current flow, water and ambient temperature.
//! Its status byte carries the meter's alarm bits (leak, burst, dry
//! running, reverse flow), which this driver decodes into a textual
//! status record alongside the standard fields.

use crate::drivers::{status_record, Driver, DriverDescriptor, VersionClaim};
use crate::payload::record::{decode_records, DataRecord};
use crate::wmbus::frame::{DeviceType, WMBusFrame};
use bitflags::bitflags;

bitflags! {
    /// Alarm bits of the Multical 21 status byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Multical21Status: u8 {
        const LEAK         = 0x01;
        const BURST        = 0x02;
        const DRY          = 0x04;
        const REVERSE_FLOW = 0x08;
    }
}

impl Multical21Status {
    /// Names of the raised alarm bits.
    pub fn active_flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.contains(Self::LEAK) {
            flags.push("LEAK");
        }
        if self.contains(Self::BURST) {
            flags.push("BURST");
        }
        if self.contains(Self::DRY) {
            flags.push("DRY");
        }
        if self.contains(Self::REVERSE_FLOW) {
            flags.push("REVERSE");
        }
        flags
    }
}

/// Driver for Kamstrup Multical 21 water meters (C1 mode broadcasts).
pub struct Multical21 {
    descriptor: DriverDescriptor,
}

impl Multical21 {
    pub fn new() -> Self {
        Self {
            descriptor: DriverDescriptor {
                name: "multical21",
                description: "Kamstrup Multical 21 water meter",
                manufacturers: &["KAM"],
                device_types: &[DeviceType::Water, DeviceType::ColdWater],
                versions: VersionClaim::Exact(&[0x1B]),
            },
        }
    }
}

impl Default for Multical21 {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for Multical21 {
    fn descriptor(&self) -> &DriverDescriptor {
        &self.descriptor
    }

    fn decode(&self, frame: &WMBusFrame, payload: &[u8]) -> Vec<DataRecord> {
        let mut records = decode_records(payload);

        let status = Multical21Status::from_bits_truncate(frame.status);
        records.push(status_record(status.active_flags()));

        records
    }
}
