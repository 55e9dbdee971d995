//! # wM-Bus Data Encoding and Decoding
//!
//! This module provides functions for decoding the value types used in
//! wM-Bus data records: BCD, little-endian signed integers, 32-bit reals
//! and the Type G/F date formats. Multi-byte numeric fields are
//! little-endian on the wireless link layer.
//!
//! The encoding counterparts exist for the frame builder and for
//! round-trip tests; meters are never written to.

use chrono::{NaiveDate, NaiveDateTime};

/// Decodes a little-endian BCD value (least significant byte first).
///
/// Returns `None` when a nibble is not a decimal digit, which marks the
/// record as unparseable rather than producing a wrong number.
pub fn decode_bcd_le(input: &[u8]) -> Option<u64> {
    let mut value: u64 = 0;

    for &byte in input.iter().rev() {
        let high = (byte >> 4) & 0x0F;
        let low = byte & 0x0F;
        if high > 9 || low > 9 {
            return None;
        }
        value = value * 100 + (high as u64) * 10 + low as u64;
    }

    Some(value)
}

/// Encodes a value as little-endian BCD over `width` bytes.
///
/// Digits beyond the available width are truncated; used for building
/// test payloads and synthetic addresses.
pub fn encode_bcd_le(mut value: u64, width: usize) -> Vec<u8> {
    let mut out = vec![0u8; width];

    for byte in out.iter_mut() {
        let low = (value % 10) as u8;
        value /= 10;
        let high = (value % 10) as u8;
        value /= 10;
        *byte = (high << 4) | low;
    }

    out
}

/// Decodes a little-endian signed integer of 1..=8 bytes with sign
/// extension.
pub fn decode_int_le(input: &[u8]) -> i64 {
    let mut value: u64 = 0;
    for (i, &byte) in input.iter().enumerate() {
        value |= (byte as u64) << (8 * i);
    }

    let bits = 8 * input.len() as u32;
    if bits < 64 && value & (1 << (bits - 1)) != 0 {
        // Sign-extend
        value |= u64::MAX << bits;
    }

    value as i64
}

/// Encodes a signed integer over `width` little-endian bytes.
pub fn encode_int_le(value: i64, width: usize) -> Vec<u8> {
    value.to_le_bytes()[..width].to_vec()
}

/// Decodes a little-endian IEEE 754 single-precision real.
pub fn decode_real_le(input: &[u8; 4]) -> f32 {
    f32::from_le_bytes(*input)
}

/// Decodes a Type G date (2 bytes: day, month, compressed year).
///
/// A zero day or month is the "not available" sentinel and decodes to
/// `None`, as does any combination that is not a real calendar date.
pub fn decode_date_g(input: &[u8; 2]) -> Option<NaiveDate> {
    let day = (input[0] & 0x1F) as u32;
    let month = (input[1] & 0x0F) as u32;
    let year = (((input[0] & 0xE0) >> 5) | ((input[1] & 0xF0) >> 1)) as i32;

    NaiveDate::from_ymd_opt(2000 + year, month, day)
}

/// Encodes a Type G date.
pub fn encode_date_g(date: NaiveDate) -> [u8; 2] {
    use chrono::Datelike;
    let year = (date.year() - 2000) as u8;
    [
        (date.day() as u8 & 0x1F) | ((year & 0x07) << 5),
        (date.month() as u8 & 0x0F) | ((year & 0x78) << 1),
    ]
}

/// Decodes a Type F date and time (4 bytes: minute, hour, day, month with
/// the year split across the day and month bytes).
pub fn decode_datetime_f(input: &[u8; 4]) -> Option<NaiveDateTime> {
    // Bit 7 of the first byte flags an invalid timestamp
    if input[0] & 0x80 != 0 {
        return None;
    }

    let minute = (input[0] & 0x3F) as u32;
    let hour = (input[1] & 0x1F) as u32;
    let day = (input[2] & 0x1F) as u32;
    let month = (input[3] & 0x0F) as u32;
    let year = (((input[2] & 0xE0) >> 5) | ((input[3] & 0xF0) >> 1)) as i32;

    NaiveDate::from_ymd_opt(2000 + year, month, day)?.and_hms_opt(hour, minute, 0)
}

/// Decodes a length-prefixed string value (LVAR); characters are
/// transmitted in reverse order.
pub fn decode_string(input: &[u8]) -> String {
    input.iter().rev().map(|&b| b as char).collect()
}
