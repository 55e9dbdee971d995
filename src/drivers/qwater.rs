//! Qundis Q water Meter Driver
//!
//! Covers the Qundis water meter family (Q water 5.5, Q water S, Q water
//! Plus). The model is derived from the version byte; the status byte
//! carries leak/reverse/burst/tamper alarms plus a no-usage indicator.

use crate::drivers::{status_record, Driver, DriverDescriptor, VersionClaim};
use crate::payload::record::{decode_records, DataRecord, RecordValue};
use crate::wmbus::frame::{DeviceType, WMBusFrame};
use bitflags::bitflags;

bitflags! {
    /// Alarm bits of the Qundis status byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct QWaterStatus: u8 {
        const LEAK     = 0x01;
        const REVERSE  = 0x02;
        const BURST    = 0x04;
        const TAMPER   = 0x08;
        const NO_USAGE = 0x10;
        const ERROR    = 0x20;
    }
}

impl QWaterStatus {
    /// Names of the raised alarm bits.
    pub fn active_flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.contains(Self::LEAK) {
            flags.push("LEAK");
        }
        if self.contains(Self::REVERSE) {
            flags.push("REVERSE");
        }
        if self.contains(Self::BURST) {
            flags.push("BURST");
        }
        if self.contains(Self::TAMPER) {
            flags.push("TAMPER");
        }
        if self.contains(Self::NO_USAGE) {
            flags.push("NO_USAGE");
        }
        if self.contains(Self::ERROR) {
            flags.push("ERROR");
        }
        flags
    }
}

/// Model name from the version byte.
fn model_name(version: u8) -> &'static str {
    match version {
        0x01 => "Q water 5.5",
        0x02 => "Q water S",
        0x03 => "Q water Plus",
        _ => "Qundis water meter",
    }
}

/// Driver for Qundis water meters.
pub struct QWater {
    descriptor: DriverDescriptor,
}

impl QWater {
    pub fn new() -> Self {
        Self {
            descriptor: DriverDescriptor {
                name: "qwater",
                description: "Qundis water meter driver",
                manufacturers: &["QDS"],
                device_types: &[
                    DeviceType::Water,
                    DeviceType::ColdWater,
                    DeviceType::HotWater,
                    DeviceType::WarmWater,
                ],
                versions: VersionClaim::Any,
            },
        }
    }
}

impl Default for QWater {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for QWater {
    fn descriptor(&self) -> &DriverDescriptor {
        &self.descriptor
    }

    fn decode(&self, frame: &WMBusFrame, payload: &[u8]) -> Vec<DataRecord> {
        let mut records = decode_records(payload);

        records.push(DataRecord::synthetic(
            "Model",
            RecordValue::Text(model_name(frame.version).to_string()),
            "",
        ));

        let status = QWaterStatus::from_bits_truncate(frame.status);
        records.push(status_record(status.active_flags()));

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::record::encode_record;
    use crate::wmbus::frame::encode_manufacturer;

    fn qds_frame(version: u8, status: u8, payload: &[u8]) -> WMBusFrame {
        let raw = WMBusFrame::build(
            0x44,
            encode_manufacturer("QDS").unwrap(),
            0x00496205,
            version,
            0x07,
            1,
            status,
            0x0000,
            payload,
        );
        WMBusFrame::parse(&raw).unwrap()
    }

    #[test]
    fn test_model_from_version() {
        assert_eq!(model_name(0x01), "Q water 5.5");
        assert_eq!(model_name(0x02), "Q water S");
        assert_eq!(model_name(0x42), "Qundis water meter");
    }

    #[test]
    fn test_decode_appends_model_and_status() {
        let payload = encode_record(0x0C, 0x13, 1937); // 8-digit BCD volume
        let frame = qds_frame(0x02, 0x18, &payload); // TAMPER | NO_USAGE

        let records = QWater::new().decode(&frame, &frame.payload);
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[1].value,
            RecordValue::Text("Q water S".to_string())
        );
        assert_eq!(
            records[2].value,
            RecordValue::Text("TAMPER NO_USAGE".to_string())
        );
    }
}
