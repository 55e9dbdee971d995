//! # wM-Bus Error Handling
//!
//! This module defines the WMBusError enum, which represents the different
//! error types that can occur while decoding wM-Bus telegrams.

use thiserror::Error;

/// Represents the different error types that can occur in the wM-Bus crate.
///
/// Structural and cryptographic failures abort the decode of the telegram
/// they occurred in; none of them is fatal to the process. Record-level
/// problems inside an otherwise valid payload are *not* errors — they are
/// surfaced as flagged records alongside the rest of the reading.
#[derive(Debug, Error)]
pub enum WMBusError {
    /// Indicates a structural parse failure (truncated header, length
    /// field not matching the buffer).
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Indicates a block checksum failure. Telegrams failing CRC are
    /// dropped by default; the payload cannot be trusted.
    #[error("CRC mismatch: expected {expected:#06X}, calculated {calculated:#06X}")]
    CrcMismatch { expected: u16, calculated: u16 },

    /// Indicates an encrypted telegram arrived for a meter without a key.
    #[error("Telegram uses encryption mode {mode} but no key is configured")]
    MissingKey { mode: u8 },

    /// Indicates the decrypted plaintext failed its sanity check. This is
    /// the likely-wrong-key signal, distinct from a CRC failure.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Indicates the security word names an encryption mode this crate
    /// does not implement.
    #[error("Unsupported encryption mode: {0}")]
    UnsupportedEncryptionMode(u8),

    /// Indicates an invalid AES key length was supplied.
    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Indicates no registered driver claims the telegram's header.
    #[error("No driver claims manufacturer {manufacturer}, device type {device_type:#04x}, version {version:#04x}")]
    NoMatch {
        manufacturer: String,
        device_type: u8,
        version: u8,
    },

    /// Indicates two or more drivers made identical exact claims for the
    /// same header. This is a configuration error and is never resolved
    /// silently.
    #[error("Ambiguous driver selection, exact claims from: {}", .0.join(", "))]
    AmbiguousDriver(Vec<String>),

    /// Indicates an explicitly configured driver name is not registered.
    #[error("Unknown driver: {0}")]
    UnknownDriver(String),

    /// Indicates a telegram was routed to a meter with a different
    /// configured address.
    #[error("Telegram from address {actual:#010x} does not match meter address {expected:#010x}")]
    AddressMismatch { expected: u32, actual: u32 },

    /// Indicates a telegram whose access number does not advance past the
    /// last accepted one. The stored reading is retained.
    #[error("Out-of-order telegram: access number {received} after {last}")]
    OutOfOrderTelegram { received: u8, last: u8 },

    /// Indicates an invalid hexadecimal string was provided.
    #[error("Invalid hexadecimal string")]
    InvalidHexString,

    /// Indicates an invalid manufacturer code.
    #[error("Invalid manufacturer")]
    InvalidManufacturer,
}
