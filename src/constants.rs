//! wM-Bus Protocol Constants
//!
//! This module defines constants used in the wM-Bus telegram decoding
//! pipeline, based on the EN 13757 standard.

/// Minimum link-layer header: L, C, M(2), A(4), V, T
pub const WMBUS_MIN_HEADER_LENGTH: usize = 10;

/// Offset of the CI field in a normalized frame
pub const WMBUS_CI_OFFSET: usize = 10;

/// Control field for an unsolicited meter broadcast (SND-NR)
pub const WMBUS_CONTROL_SND_NR: u8 = 0x44;

// Control information (CI) codes
/// Application data without an application header
pub const CI_RESP_NO_HEADER: u8 = 0x78;
/// Application data with a short header (ACC, STATUS, security word)
pub const CI_RESP_SHORT_HEADER: u8 = 0x7A;
/// Application data with a long header (full secondary address)
pub const CI_RESP_LONG_HEADER: u8 = 0x72;

/// Byte count of the short application header (ACC + STATUS + security word)
pub const WMBUS_SHORT_HEADER_LENGTH: usize = 4;

/// DIF (Data Information Field) mask for data length/type
pub const DIF_MASK_DATA: u8 = 0x0F;

/// DIF mask for the function field (instantaneous/max/min/error)
pub const DIF_MASK_FUNCTION: u8 = 0x30;

/// DIF mask for the storage-number LSB
pub const DIF_MASK_STORAGE_LSB: u8 = 0x40;

/// DIF/DIFE/VIF extension bit
pub const EXTENSION_BIT: u8 = 0x80;

/// DIFE mask for storage number bits
pub const DIFE_MASK_STORAGE: u8 = 0x0F;

/// DIFE mask for tariff bits
pub const DIFE_MASK_TARIFF: u8 = 0x30;

/// DIF idle filler, skipped between records
pub const DIF_IDLE_FILLER: u8 = 0x2F;

/// DIF marking the start of a manufacturer-specific data block
pub const DIF_MANUFACTURER_SPECIFIC: u8 = 0x0F;

/// DIF marking a manufacturer block with more records following
pub const DIF_MORE_RECORDS_FOLLOW: u8 = 0x1F;

/// VIF value bits (without the extension bit)
pub const VIF_MASK_VALUE: u8 = 0x7F;

/// VIF announcing a plain-text unit definition
pub const VIF_PLAIN_TEXT: u8 = 0x7C;

/// VIF for manufacturer-specific value encoding
pub const VIF_MANUFACTURER_SPECIFIC: u8 = 0x7F;

/// Decrypted mode 5 payloads start with two of these verification bytes
pub const DECRYPTION_VERIFICATION_BYTE: u8 = 0x2F;
