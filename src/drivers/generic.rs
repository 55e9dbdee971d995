//! Generic Fallback Driver
//!
//! Decodes the standard record stream of any meter without a dedicated
//! driver. Registered last with a full wildcard claim so it never shadows
//! an exact match; what it cannot name at least arrives as raw flagged
//! records instead of being dropped.

use crate::drivers::{status_record, Driver, DriverDescriptor, VersionClaim};
use crate::payload::record::{decode_records, DataRecord};
use crate::wmbus::frame::WMBusFrame;

/// Standard EN 13757-3 status byte bits.
const STATUS_POWER_LOW: u8 = 0x04;
const STATUS_PERMANENT_ERROR: u8 = 0x08;
const STATUS_TEMPORARY_ERROR: u8 = 0x10;

/// Catch-all driver for meters with no dedicated decoder.
pub struct Generic {
    descriptor: DriverDescriptor,
}

impl Generic {
    pub fn new() -> Self {
        Self {
            descriptor: DriverDescriptor {
                name: "generic",
                description: "Generic driver for standard record streams",
                manufacturers: &[],
                device_types: &[],
                versions: VersionClaim::Any,
            },
        }
    }
}

impl Default for Generic {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for Generic {
    fn descriptor(&self) -> &DriverDescriptor {
        &self.descriptor
    }

    fn decode(&self, frame: &WMBusFrame, payload: &[u8]) -> Vec<DataRecord> {
        let mut records = decode_records(payload);

        let mut flags = Vec::new();
        if frame.status & STATUS_POWER_LOW != 0 {
            flags.push("POWER_LOW");
        }
        if frame.status & STATUS_PERMANENT_ERROR != 0 {
            flags.push("PERMANENT_ERROR");
        }
        if frame.status & STATUS_TEMPORARY_ERROR != 0 {
            flags.push("TEMPORARY_ERROR");
        }
        records.push(status_record(flags));

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::record::{encode_record, RecordValue};
    use crate::wmbus::frame::encode_manufacturer;

    #[test]
    fn test_decodes_any_meter() {
        let payload = encode_record(0x02, 0x2A, 230); // power
        let raw = WMBusFrame::build(
            0x44,
            encode_manufacturer("ZRI").unwrap(),
            0x11223344,
            0x09,
            0x02,
            7,
            STATUS_TEMPORARY_ERROR,
            0x0000,
            &payload,
        );
        let frame = WMBusFrame::parse(&raw).unwrap();

        let records = Generic::new().decode(&frame, &frame.payload);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].quantity, "Power");
        assert_eq!(
            records[1].value,
            RecordValue::Text("TEMPORARY_ERROR".to_string())
        );
    }
}
