//! # wM-Bus CRC Validation
//!
//! This module implements the CRC-16 variant specified in EN 13757-4 for
//! wireless M-Bus frames: polynomial 0x3D65, non-reflected, initial value
//! 0x0000, with the final remainder complemented. The variant must be
//! reproduced bit-for-bit to be wire-compatible.
//!
//! Two frame shapes are handled:
//!
//! 1. **Normalized frames** with a single trailing CRC over the whole
//!    frame body. Most receivers emit this shape (or strip the CRC
//!    entirely before handing bytes to the host).
//! 2. **Block-form Type A frames** straight off the air: a 10-byte link
//!    header block, then 16-byte data blocks, each block followed by its
//!    own 2-byte CRC, with a variable-size final block.
//!
//! Validation never fails with an error — it answers yes or no, and the
//! caller decides the drop policy. A corrupted frame cannot be trusted for
//! billing-relevant data, so dropping is the default.

use crate::constants::WMBUS_MIN_HEADER_LENGTH;
use crate::error::WMBusError;

/// wM-Bus CRC polynomial as specified in EN 13757-4
const CRC_POLY: u16 = 0x3D65;

/// Size of an intermediate data block in a block-form Type A frame
const BLOCK_SIZE: usize = 16;

/// Link header bytes covered by the first block CRC (L..device type)
const HEADER_BLOCK_SIZE: usize = WMBUS_MIN_HEADER_LENGTH;

/// Calculate the raw CRC-16 remainder without the final complement.
pub fn crc16_raw(data: &[u8]) -> u16 {
    let mut crc = 0u16;

    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ CRC_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}

/// Calculate the wire CRC-16 (complemented remainder per EN 13757-4).
pub fn crc16(data: &[u8]) -> u16 {
    !crc16_raw(data)
}

/// Append the trailing CRC to a normalized frame body.
///
/// Used by the frame builder and by tests to produce wire-valid frames.
pub fn append_crc(body: &[u8]) -> Vec<u8> {
    let mut frame = body.to_vec();
    frame.extend_from_slice(&crc16(body).to_le_bytes());
    frame
}

/// Validate the checksums embedded in a telegram.
///
/// Dispatches on the length arithmetic of the L-field:
/// - `L + 3` bytes: normalized frame with one trailing CRC.
/// - block-form length: per-block CRCs, all must pass.
/// - `L + 1` bytes: the receiver already stripped (and checked) the CRC;
///   there is nothing left to validate and the frame is accepted.
///
/// Any other length cannot be attributed to a CRC layout and fails.
pub fn verify_telegram(raw: &[u8]) -> bool {
    check_telegram(raw).is_ok()
}

/// Like [`verify_telegram`], but reports the mismatching values.
///
/// Used by the meter pipeline, whose callers want the expected and
/// calculated CRC in the rejection report.
pub fn check_telegram(raw: &[u8]) -> Result<(), WMBusError> {
    if raw.len() < WMBUS_MIN_HEADER_LENGTH {
        return Err(WMBusError::MalformedFrame(format!(
            "telegram too short: {} bytes",
            raw.len()
        )));
    }

    let l_field = raw[0] as usize;

    if raw.len() == l_field + 1 {
        return Ok(());
    }

    if raw.len() == l_field + 3 {
        let body = &raw[..l_field + 1];
        let crc_read = u16::from_le_bytes([raw[l_field + 1], raw[l_field + 2]]);
        let crc_calc = crc16(body);
        if crc_read != crc_calc {
            return Err(WMBusError::CrcMismatch {
                expected: crc_read,
                calculated: crc_calc,
            });
        }
        return Ok(());
    }

    if raw.len() == block_form_length(l_field) {
        return check_blocks(raw);
    }

    Err(WMBusError::MalformedFrame(format!(
        "no CRC layout matches length field {} with buffer size {}",
        l_field,
        raw.len()
    )))
}

/// Expected total length of a block-form Type A frame for a given L-field.
fn block_form_length(l_field: usize) -> usize {
    if l_field < HEADER_BLOCK_SIZE - 1 {
        return 0;
    }
    let data_len = l_field - (HEADER_BLOCK_SIZE - 1);
    let full_blocks = data_len / BLOCK_SIZE;
    let remainder = data_len % BLOCK_SIZE;

    let mut total = HEADER_BLOCK_SIZE + 2 + full_blocks * (BLOCK_SIZE + 2);
    if remainder > 0 {
        total += remainder + 2;
    }
    total
}

/// Validate every block CRC of a block-form Type A frame.
fn check_blocks(raw: &[u8]) -> Result<(), WMBusError> {
    for (block, crc_read) in iter_blocks(raw) {
        let crc_calc = crc16(block);
        if crc_read != crc_calc {
            log::debug!(
                "Block CRC mismatch: expected {crc_read:04X}, calculated {crc_calc:04X}"
            );
            return Err(WMBusError::CrcMismatch {
                expected: crc_read,
                calculated: crc_calc,
            });
        }
    }
    Ok(())
}

/// Structurally remove the embedded block CRCs without checking them.
///
/// Returns the normalized frame body (`L + 1` bytes) or `None` when the
/// buffer length does not match the block layout declared by the L-field.
/// CRC values are ignored here; validation is [`verify_telegram`]'s job.
pub fn strip_block_crcs(raw: &[u8]) -> Option<Vec<u8>> {
    if raw.len() < HEADER_BLOCK_SIZE || raw.len() != block_form_length(raw[0] as usize) {
        return None;
    }

    let mut body = Vec::with_capacity(raw[0] as usize + 1);
    for (block, _) in iter_blocks(raw) {
        body.extend_from_slice(block);
    }
    Some(body)
}

/// Iterate over (block bytes, stored CRC) pairs of a block-form frame.
///
/// The caller has already confirmed the buffer length matches
/// `block_form_length`, so the slicing below cannot run out of bounds.
fn iter_blocks(raw: &[u8]) -> impl Iterator<Item = (&[u8], u16)> {
    let mut pos = 0;
    let mut remaining = raw[0] as usize - (HEADER_BLOCK_SIZE - 1);
    let mut first = true;

    std::iter::from_fn(move || {
        let size = if first {
            first = false;
            HEADER_BLOCK_SIZE
        } else if remaining == 0 {
            return None;
        } else {
            let s = remaining.min(BLOCK_SIZE);
            remaining -= s;
            s
        };

        let block = &raw[pos..pos + size];
        let crc_read = u16::from_le_bytes([raw[pos + size], raw[pos + size + 1]]);
        pos += size + 2;
        Some((block, crc_read))
    })
}
