//! # Hex Encoding/Decoding Utilities
//!
//! Telegram bytes arrive at the CLI and in test fixtures as hex strings,
//! often copied from receiver logs with embedded whitespace. This module
//! wraps the `hex` crate with the lenient parsing and compact formatting
//! used throughout the telegram pipeline.

use crate::error::WMBusError;

/// Encode bytes to a lowercase hex string.
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decode a hex string to bytes.
///
/// Accepts upper- and lowercase characters; whitespace is stripped so
/// space-separated receiver dumps parse directly.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, WMBusError> {
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() || cleaned.len() % 2 != 0 {
        return Err(WMBusError::InvalidHexString);
    }

    hex::decode(&cleaned).map_err(|_| WMBusError::InvalidHexString)
}

/// Format bytes as "0a 44 93 15" for log output.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build telegram bytes from a hex string in test fixtures.
///
/// Panics on invalid hex; intended for test code only.
pub fn hex_to_bytes(hex_str: &str) -> Vec<u8> {
    decode_hex(hex_str).expect("Invalid hex in test data")
}
