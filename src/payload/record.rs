//! # Data Record Decoding
//!
//! Decodes the self-describing record stream of a (decrypted) wM-Bus
//! payload. Each record is tagged with a data information field (storage
//! number, function, data length/type, DIFE extensions) followed by a
//! value information field (physical quantity and power-of-ten scale,
//! VIFE extensions), then the value bytes.
//!
//! The decoding loop never aborts on an unrecognized record: anything it
//! cannot interpret is surfaced as a flagged record with its raw bytes so
//! one bad record cannot invalidate the rest of the payload.

use crate::constants::{
    DIFE_MASK_STORAGE, DIFE_MASK_TARIFF, DIF_IDLE_FILLER, DIF_MANUFACTURER_SPECIFIC,
    DIF_MASK_DATA, DIF_MASK_FUNCTION, DIF_MASK_STORAGE_LSB, DIF_MORE_RECORDS_FOLLOW,
    EXTENSION_BIT, VIF_MANUFACTURER_SPECIFIC, VIF_MASK_VALUE, VIF_PLAIN_TEXT,
};
use crate::payload::data_encoding::{
    decode_bcd_le, decode_date_g, decode_datetime_f, decode_int_le, decode_real_le, decode_string,
};
use crate::payload::vif::lookup_primary_vif;
use chrono::{NaiveDate, NaiveDateTime};
use nom::{
    bytes::complete::take,
    number::complete::u8 as nom_u8,
    IResult,
};
use serde::Serialize;

/// Decoded value of a data record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RecordValue {
    None,
    Numeric(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
    Bytes(Vec<u8>),
}

impl RecordValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            _ => None,
        }
    }
}

/// Record function from the DIF function bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecordFunction {
    Instantaneous,
    Maximum,
    Minimum,
    ValueDuringError,
}

impl RecordFunction {
    fn from_dif(dif: u8) -> Self {
        match (dif & DIF_MASK_FUNCTION) >> 4 {
            0 => Self::Instantaneous,
            1 => Self::Maximum,
            2 => Self::Minimum,
            _ => Self::ValueDuringError,
        }
    }
}

/// One decoded field of a reading.
#[derive(Debug, Clone, Serialize)]
pub struct DataRecord {
    /// Physical quantity ("Volume", "Energy", ...)
    pub quantity: String,
    /// Decoded, scale-applied value
    pub value: RecordValue,
    /// Canonical unit of the value
    pub unit: String,
    /// Storage number (0 = current value, higher = historic)
    pub storage_number: u32,
    /// Tariff sub-index
    pub tariff: u16,
    /// Function (instantaneous/max/min/during-error)
    pub function: RecordFunction,
    /// Raw DIF tag for diagnostics
    pub dif: u8,
    /// Raw primary VIF tag for diagnostics
    pub vif: u8,
    /// False when the record could not be interpreted and `value` holds
    /// raw material instead of a decoded quantity
    pub parsed: bool,
}

impl DataRecord {
    /// Synthesize a record that did not come from the wire (driver status
    /// fields, model names).
    pub fn synthetic(quantity: &str, value: RecordValue, unit: &str) -> Self {
        Self {
            quantity: quantity.to_string(),
            value,
            unit: unit.to_string(),
            storage_number: 0,
            tariff: 0,
            function: RecordFunction::Instantaneous,
            dif: 0,
            vif: 0,
            parsed: true,
        }
    }

    /// True for the current (storage 0, instantaneous) value of a quantity.
    pub fn is_current(&self, quantity: &str) -> bool {
        self.parsed
            && self.storage_number == 0
            && self.function == RecordFunction::Instantaneous
            && self.quantity == quantity
    }
}

/// Tag portion of one record: DIF + DIFE chain, VIF + VIFE chain.
#[derive(Debug)]
struct RecordTag {
    dif: u8,
    difes: Vec<u8>,
    vif: u8,
    vifes: Vec<u8>,
    plain_unit: Option<String>,
}

impl RecordTag {
    fn storage_number(&self) -> u32 {
        let mut storage = ((self.dif & DIF_MASK_STORAGE_LSB) >> 6) as u32;
        for (i, dife) in self.difes.iter().enumerate().take(7) {
            storage |= ((dife & DIFE_MASK_STORAGE) as u32) << (1 + 4 * i);
        }
        storage
    }

    fn tariff(&self) -> u16 {
        let mut tariff = 0u16;
        for (i, dife) in self.difes.iter().enumerate().take(7) {
            tariff |= (((dife & DIFE_MASK_TARIFF) >> 4) as u16) << (2 * i);
        }
        tariff
    }
}

/// Parse a DIFE/VIFE extension chain: bytes follow while the extension
/// bit of the previous byte is set.
fn parse_extensions(mut input: &[u8], mut previous: u8) -> IResult<&[u8], Vec<u8>> {
    let mut chain = Vec::new();

    while previous & EXTENSION_BIT != 0 {
        let (rest, byte) = nom_u8(input)?;
        input = rest;
        previous = byte;
        chain.push(byte);

        // A chain longer than 10 extensions is not a sane record
        if chain.len() > 10 {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::TooLarge,
            )));
        }
    }

    Ok((input, chain))
}

/// Parse the tag (DIF/DIFE/VIF/VIFE) of one record.
fn parse_tag(input: &[u8]) -> IResult<&[u8], RecordTag> {
    let (input, dif) = nom_u8(input)?;
    let (input, difes) = parse_extensions(input, dif)?;
    let (mut input, vif) = nom_u8(input)?;

    // VIF 0x7C: the unit is a length-prefixed plain-text string
    let mut plain_unit = None;
    if vif & VIF_MASK_VALUE == VIF_PLAIN_TEXT {
        let (rest, len) = nom_u8(input)?;
        let (rest, text) = take(len as usize)(rest)?;
        plain_unit = Some(decode_string(text));
        input = rest;
    }

    let (input, vifes) = parse_extensions(input, vif)?;

    Ok((
        input,
        RecordTag {
            dif,
            difes,
            vif,
            vifes,
            plain_unit,
        },
    ))
}

/// Data length in bytes for a DIF, or `None` for variable length (LVAR).
pub fn data_length_for_dif(dif: u8) -> Option<usize> {
    match dif & DIF_MASK_DATA {
        0x0 | 0x8 => Some(0),
        0x1 | 0x9 => Some(1),
        0x2 | 0xA => Some(2),
        0x3 | 0xB => Some(3),
        0x4 | 0xC => Some(4),
        0x5 => Some(4),
        0x6 | 0xE => Some(6),
        0x7 | 0xF => Some(8),
        _ => None, // 0xD: variable length
    }
}

/// Decode the raw value bytes according to the DIF data type.
///
/// Returns `None` when the bytes cannot be interpreted (bad BCD digit),
/// flagging the record instead of inventing a number.
fn decode_value(tag: &RecordTag, data: &[u8]) -> Option<RecordValue> {
    let vif = tag.vif & VIF_MASK_VALUE;

    // Date-typed VIFs override the plain integer interpretation
    if vif == 0x6C && data.len() == 2 {
        let date = decode_date_g(&[data[0], data[1]])?;
        return Some(RecordValue::Date(date));
    }
    if vif == 0x6D && data.len() == 4 {
        let ts = decode_datetime_f(&[data[0], data[1], data[2], data[3]])?;
        return Some(RecordValue::DateTime(ts));
    }

    match tag.dif & DIF_MASK_DATA {
        0x0 | 0x8 => Some(RecordValue::None),
        0x1..=0x4 | 0x6 | 0x7 => Some(RecordValue::Numeric(decode_int_le(data) as f64)),
        0x5 => Some(RecordValue::Numeric(
            decode_real_le(&[data[0], data[1], data[2], data[3]]) as f64,
        )),
        0x9..=0xC | 0xE => decode_bcd_le(data).map(|v| RecordValue::Numeric(v as f64)),
        0xD => Some(RecordValue::Text(decode_string(data))),
        _ => None,
    }
}

/// Build the flagged record used for everything the loop cannot decode.
fn unparsed_record(dif: u8, vif: u8, quantity: &str, bytes: &[u8]) -> DataRecord {
    DataRecord {
        quantity: quantity.to_string(),
        value: RecordValue::Bytes(bytes.to_vec()),
        unit: String::new(),
        storage_number: 0,
        tariff: 0,
        function: RecordFunction::Instantaneous,
        dif,
        vif,
        parsed: false,
    }
}

/// Decode a payload's record stream into data records.
///
/// Stops at end-of-payload or at a manufacturer-specific extension
/// marker; the marker's remaining bytes become one opaque flagged record.
pub fn decode_records(payload: &[u8]) -> Vec<DataRecord> {
    let mut records = Vec::new();
    let mut remaining = payload;

    loop {
        // Skip idle filler between records (and the 2F2F decryption
        // verification bytes, which reuse the filler value)
        while let [DIF_IDLE_FILLER, rest @ ..] = remaining {
            remaining = rest;
        }

        if remaining.is_empty() {
            break;
        }

        // Manufacturer-specific extension marker: everything after it is
        // vendor territory, handed to the driver as one opaque record
        if remaining[0] == DIF_MANUFACTURER_SPECIFIC || remaining[0] == DIF_MORE_RECORDS_FOLLOW {
            records.push(unparsed_record(
                remaining[0],
                0,
                "Manufacturer specific",
                &remaining[1..],
            ));
            break;
        }

        let (rest, tag) = match parse_tag(remaining) {
            Ok(parsed) => parsed,
            Err(_) => {
                records.push(unparsed_record(remaining[0], 0, "Unknown", remaining));
                break;
            }
        };

        let data_len = match data_length_for_dif(tag.dif) {
            Some(len) => len,
            None => {
                // LVAR: explicit length byte precedes the data
                match rest.first() {
                    Some(&len) if (len as usize) < rest.len() => len as usize,
                    _ => {
                        records.push(unparsed_record(tag.dif, tag.vif, "Unknown", remaining));
                        break;
                    }
                }
            }
        };

        let (data, rest) = {
            let rest = if data_length_for_dif(tag.dif).is_none() {
                &rest[1..] // consume the LVAR length byte
            } else {
                rest
            };
            if rest.len() < data_len {
                records.push(unparsed_record(tag.dif, tag.vif, "Truncated", rest));
                break;
            }
            rest.split_at(data_len)
        };
        remaining = rest;

        records.push(interpret_record(&tag, data));
    }

    records
}

/// Combine tag interpretation and value decoding into one record.
fn interpret_record(tag: &RecordTag, data: &[u8]) -> DataRecord {
    let vif = tag.vif & VIF_MASK_VALUE;

    let (quantity, unit, exponent, known_vif) = if let Some(unit) = &tag.plain_unit {
        ("Plain text".to_string(), unit.clone(), 1.0, true)
    } else if vif == VIF_MANUFACTURER_SPECIFIC {
        ("Manufacturer specific".to_string(), String::new(), 1.0, false)
    } else {
        match lookup_primary_vif(vif) {
            Some(info) => (
                info.quantity.to_string(),
                info.unit.to_string(),
                info.exponent,
                true,
            ),
            None => (format!("Unknown (VIF {vif:#04x})"), String::new(), 1.0, false),
        }
    };

    let value = match decode_value(tag, data) {
        Some(RecordValue::Numeric(v)) => RecordValue::Numeric(v * exponent),
        Some(other) => other,
        None => {
            return unparsed_record(tag.dif, tag.vif, &quantity, data);
        }
    };

    // A VIFE chain modifies the primary meaning (per-time, averaged,
    // compound units). Without interpreting it the value cannot be
    // reported as fully understood, so such records stay flagged.
    let parsed = known_vif && tag.vifes.is_empty();

    DataRecord {
        quantity,
        value,
        unit,
        storage_number: tag.storage_number(),
        tariff: tag.tariff(),
        function: RecordFunction::from_dif(tag.dif),
        dif: tag.dif,
        vif: tag.vif,
        parsed,
    }
}

/// Encode one numeric record for test payload construction.
///
/// The inverse of the decoding loop for the integer and BCD data types;
/// round-trip tests feed the result back through [`decode_records`].
pub fn encode_record(dif: u8, vif: u8, raw_value: i64) -> Vec<u8> {
    use crate::payload::data_encoding::{encode_bcd_le, encode_int_le};

    let mut out = vec![dif, vif];
    let len = data_length_for_dif(dif).expect("encode_record: fixed-length DIF required");
    match dif & DIF_MASK_DATA {
        0x9..=0xC | 0xE => out.extend_from_slice(&encode_bcd_le(raw_value as u64, len)),
        _ => out.extend_from_slice(&encode_int_le(raw_value, len)),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_numeric(value: &RecordValue, expected: f64) {
        let v = value.as_f64().expect("expected a numeric value");
        assert!(
            (v - expected).abs() < 1e-9,
            "value {v} differs from expected {expected}"
        );
    }

    #[test]
    fn test_single_volume_record() {
        // DIF 0x04 (32-bit int), VIF 0x13 (volume, 0.001 m3): 1234 -> 1.234 m3
        let payload = encode_record(0x04, 0x13, 1234);
        let records = decode_records(&payload);

        assert_eq!(records.len(), 1);
        assert!(records[0].is_current("Volume"));
        assert_eq!(records[0].unit, "m3");
        assert_numeric(&records[0].value, 1.234);
    }

    #[test]
    fn test_bcd_record() {
        // DIF 0x0C (8-digit BCD), VIF 0x13
        let payload = vec![0x0C, 0x13, 0x78, 0x56, 0x34, 0x12];
        let records = decode_records(&payload);

        assert_eq!(records.len(), 1);
        assert_numeric(&records[0].value, 12_345.678);
    }

    #[test]
    fn test_filler_skipped() {
        let mut payload = vec![0x2F, 0x2F];
        payload.extend(encode_record(0x02, 0x2A, 150)); // power, 16-bit
        payload.push(0x2F);

        let records = decode_records(&payload);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].quantity, "Power");
    }

    #[test]
    fn test_storage_number_from_dife() {
        // DIF 0x84 (32-bit int + extension), DIFE 0x01 -> storage 2
        let payload = vec![0x84, 0x01, 0x13, 0xD2, 0x04, 0x00, 0x00];
        let records = decode_records(&payload);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].storage_number, 2);
        assert!(!records[0].is_current("Volume"));
    }

    #[test]
    fn test_function_bits() {
        // DIF 0x14: 32-bit int, maximum value
        let payload = encode_record(0x14, 0x13, 99);
        let records = decode_records(&payload);
        assert_eq!(records[0].function, RecordFunction::Maximum);
    }

    #[test]
    fn test_manufacturer_block_is_opaque() {
        let mut payload = encode_record(0x04, 0x13, 1234);
        payload.extend_from_slice(&[0x0F, 0xDE, 0xAD, 0xBE, 0xEF]);

        let records = decode_records(&payload);
        assert_eq!(records.len(), 2);
        assert!(records[0].parsed);
        assert!(!records[1].parsed);
        assert_eq!(records[1].quantity, "Manufacturer specific");
        assert_eq!(records[1].value, RecordValue::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]));
    }

    #[test]
    fn test_bad_record_does_not_abort() {
        // First record has an invalid BCD nibble, second is fine
        let mut payload = vec![0x0A, 0x13, 0xFF, 0xFF];
        payload.extend(encode_record(0x02, 0x2A, 42));

        let records = decode_records(&payload);
        assert_eq!(records.len(), 2);
        assert!(!records[0].parsed);
        assert!(records[1].parsed);
        assert_eq!(records[1].quantity, "Power");
    }

    #[test]
    fn test_unknown_vif_flagged_not_fatal() {
        let mut payload = vec![0x02, 0x6F, 0x01, 0x00]; // reserved VIF
        payload.extend(encode_record(0x04, 0x13, 1000));

        let records = decode_records(&payload);
        assert_eq!(records.len(), 2);
        assert!(!records[0].parsed);
        assert!(records[1].parsed);
    }

    #[test]
    fn test_truncated_value_flagged() {
        let payload = vec![0x04, 0x13, 0xD2, 0x04]; // 2 of 4 value bytes
        let records = decode_records(&payload);

        assert_eq!(records.len(), 1);
        assert!(!records[0].parsed);
        assert_eq!(records[0].quantity, "Truncated");
    }

    #[test]
    fn test_date_record() {
        use crate::payload::data_encoding::encode_date_g;
        let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        let encoded = encode_date_g(date);
        let payload = vec![0x02, 0x6C, encoded[0], encoded[1]];

        let records = decode_records(&payload);
        assert_eq!(records[0].quantity, "Date");
        assert_eq!(records[0].value, RecordValue::Date(date));
    }

    #[test]
    fn test_roundtrip_multiple_records() {
        let mut payload = Vec::new();
        payload.extend(encode_record(0x04, 0x13, 12345)); // volume, 0.001 m3
        payload.extend(encode_record(0x02, 0x3B, 77)); // flow, 0.001 m3/h
        payload.extend(encode_record(0x02, 0x5B, 2155)); // flow temperature, 1 °C

        let records = decode_records(&payload);
        assert_eq!(records.len(), 3);
        assert_numeric(&records[0].value, 12.345);
        assert_numeric(&records[1].value, 0.077);
        assert_numeric(&records[2].value, 2155.0);
    }
}
