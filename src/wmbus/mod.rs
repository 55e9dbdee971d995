//! # Wireless M-Bus (wM-Bus) Link Layer
//!
//! This module provides the link-layer stages of the telegram decoding
//! pipeline: structural frame parsing, EN 13757-4 CRC validation and
//! mode 0/5 payload decryption.

pub mod crc;
pub mod crypto;
pub mod frame;

// Re-export the necessary types and functions from the submodules
pub use crc::{check_telegram, crc16, verify_telegram};
pub use crypto::{decrypt_payload, AesKey, DecryptionContext, EncryptionMode};
pub use frame::{decode_manufacturer, encode_manufacturer, DeviceType, TelegramHeader, WMBusFrame};
