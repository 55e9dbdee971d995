//! # wM-Bus Link-Layer Decryption
//!
//! This module implements the link-layer encryption modes used by wM-Bus
//! meters. Mode 0 (plaintext) and mode 5 (AES-128 in CBC mode per
//! EN 13757-4 / OMS) are supported; any other mode announced by the
//! security word is reported as unsupported rather than passed through.
//!
//! The mode 5 initialization vector is fixed by the standard: the 8-byte
//! secondary address (manufacturer, device id, version, device type, all
//! as they appear on the wire) followed by the telegram's access number
//! repeated eight times. Keys are externally provisioned 16-byte values;
//! they are never derived from the telegram itself, never logged, and the
//! key buffer is zeroized on drop.
//!
//! Decrypted mode 5 payloads start with two 0x2F verification bytes.
//! Their absence is treated as a likely-wrong-key condition, reported as
//! a soft `DecryptionFailed` — deliberately distinct from a CRC failure,
//! since not every manufacturer includes the marker.

use crate::constants::DECRYPTION_VERIFICATION_BYTE;
use crate::error::WMBusError;
use crate::wmbus::frame::WMBusFrame;
use aes::cipher::{
    generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit,
};
use aes::Aes128;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES block size used by all supported modes
const BLOCK_SIZE: usize = 16;

/// AES-128 key for wM-Bus link-layer decryption.
///
/// Held as an opaque byte buffer and wiped from memory on drop. The
/// `Debug` implementation is redacted so the key cannot leak through
/// diagnostic output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AesKey {
    key: [u8; 16],
}

impl AesKey {
    /// Create an AES key from a 16-byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WMBusError> {
        if bytes.len() != 16 {
            return Err(WMBusError::InvalidKeyLength {
                expected: 16,
                actual: bytes.len(),
            });
        }

        let mut key = [0u8; 16];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Create an AES key from a hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, WMBusError> {
        let bytes = crate::util::hex::decode_hex(hex_str)?;
        Self::from_bytes(&bytes)
    }

    fn as_bytes(&self) -> &[u8; 16] {
        &self.key
    }
}

impl std::fmt::Debug for AesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AesKey(..)")
    }
}

/// Encryption mode announced by the security word of the application
/// header (bits 8..12 of the configuration field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionMode {
    /// Mode 0: payload is plaintext
    None,
    /// Mode 5: AES-128 CBC with the standard IV derivation
    Aes128Cbc,
    /// Any other announced mode
    Unsupported(u8),
}

impl EncryptionMode {
    /// Extract the encryption mode from the 16-bit security word.
    pub fn from_security_word(word: u16) -> Self {
        match ((word >> 8) & 0x1F) as u8 {
            0 => Self::None,
            5 => Self::Aes128Cbc,
            other => Self::Unsupported(other),
        }
    }

    /// The numeric mode as announced on the wire.
    pub fn mode_number(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Aes128Cbc => 5,
            Self::Unsupported(mode) => *mode,
        }
    }

    /// Security word announcing this mode (used by the frame builder).
    pub fn security_word(&self) -> u16 {
        (self.mode_number() as u16) << 8
    }
}

/// Per-telegram decryption context: mode, IV-derivation inputs and the
/// externally supplied key. Constructed from a parsed frame, used once,
/// discarded.
#[derive(Debug)]
pub struct DecryptionContext<'a> {
    mode: EncryptionMode,
    iv: [u8; 16],
    key: Option<&'a AesKey>,
}

impl<'a> DecryptionContext<'a> {
    /// Build the context for one telegram.
    pub fn new(frame: &WMBusFrame, key: Option<&'a AesKey>) -> Self {
        Self {
            mode: EncryptionMode::from_security_word(frame.security_word),
            iv: build_mode5_iv(frame),
            key,
        }
    }

    /// The encryption mode this telegram announced.
    pub fn mode(&self) -> EncryptionMode {
        self.mode
    }

    /// Decrypt the payload of the telegram this context was built from.
    ///
    /// Mode 0 returns the payload unchanged regardless of whether a key
    /// was supplied. Mode 5 requires a key and a block-aligned
    /// ciphertext, and checks the 0x2F2F plaintext marker.
    pub fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>, WMBusError> {
        match self.mode {
            EncryptionMode::None => Ok(payload.to_vec()),
            EncryptionMode::Aes128Cbc => {
                let key = self.key.ok_or(WMBusError::MissingKey { mode: 5 })?;
                let plaintext = aes_cbc_decrypt(key, payload, &self.iv)?;

                if plaintext.len() < 2
                    || plaintext[0] != DECRYPTION_VERIFICATION_BYTE
                    || plaintext[1] != DECRYPTION_VERIFICATION_BYTE
                {
                    return Err(WMBusError::DecryptionFailed(
                        "verification bytes 2F2F missing, key is likely wrong".to_string(),
                    ));
                }

                Ok(plaintext)
            }
            EncryptionMode::Unsupported(mode) => {
                Err(WMBusError::UnsupportedEncryptionMode(mode))
            }
        }
    }
}

/// Decrypt a frame's payload with an optional key.
///
/// Convenience entry point for the meter pipeline; builds the per-telegram
/// [`DecryptionContext`] and applies it.
pub fn decrypt_payload(frame: &WMBusFrame, key: Option<&AesKey>) -> Result<Vec<u8>, WMBusError> {
    DecryptionContext::new(frame, key).decrypt(&frame.payload)
}

/// Build the mode 5 initialization vector for a frame.
///
/// Layout per EN 13757-4: M(2, LE) + A(4, LE) + V + T, then the access
/// number repeated over the remaining eight bytes.
pub fn build_mode5_iv(frame: &WMBusFrame) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[0..2].copy_from_slice(&frame.manufacturer_id.to_le_bytes());
    iv[2..6].copy_from_slice(&frame.address.to_le_bytes());
    iv[6] = frame.version;
    iv[7] = frame.device_type.as_byte();
    iv[8..16].fill(frame.access_number);
    iv
}

/// AES-128 CBC decryption without padding removal.
///
/// Mode 5 payloads are padded with 0x2F idle filler which the record
/// parser skips, so the plaintext is returned block-aligned as-is.
fn aes_cbc_decrypt(key: &AesKey, ciphertext: &[u8], iv: &[u8; 16]) -> Result<Vec<u8>, WMBusError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(WMBusError::DecryptionFailed(format!(
            "ciphertext length {} is not a multiple of the AES block size",
            ciphertext.len()
        )));
    }

    let cipher = Aes128::new(GenericArray::from_slice(key.as_bytes()));
    let mut plaintext = Vec::with_capacity(ciphertext.len());
    let mut prev_block = *iv;

    for chunk in ciphertext.chunks_exact(BLOCK_SIZE) {
        let mut block = GenericArray::clone_from_slice(chunk);
        cipher.decrypt_block(&mut block);

        for (byte, prev) in block.iter_mut().zip(prev_block.iter()) {
            *byte ^= prev;
        }

        plaintext.extend_from_slice(&block);
        prev_block.copy_from_slice(chunk);
    }

    Ok(plaintext)
}

/// AES-128 CBC encryption counterpart.
///
/// Exists so decryption test vectors can be produced in-repo; prepends
/// the 0x2F2F verification bytes and pads the records with 0x2F idle
/// filler to the block boundary, matching what mode 5 meters transmit.
pub fn encrypt_payload(records: &[u8], key: &AesKey, iv: &[u8; 16]) -> Vec<u8> {
    let mut plaintext = Vec::with_capacity(records.len() + 2 + BLOCK_SIZE);
    plaintext.push(DECRYPTION_VERIFICATION_BYTE);
    plaintext.push(DECRYPTION_VERIFICATION_BYTE);
    plaintext.extend_from_slice(records);
    while plaintext.len() % BLOCK_SIZE != 0 {
        plaintext.push(DECRYPTION_VERIFICATION_BYTE);
    }

    let cipher = Aes128::new(GenericArray::from_slice(key.as_bytes()));
    let mut ciphertext = Vec::with_capacity(plaintext.len());
    let mut prev_block = *iv;

    for chunk in plaintext.chunks_exact(BLOCK_SIZE) {
        let mut block = GenericArray::clone_from_slice(chunk);
        for (byte, prev) in block.iter_mut().zip(prev_block.iter()) {
            *byte ^= prev;
        }
        cipher.encrypt_block(&mut block);

        ciphertext.extend_from_slice(&block);
        prev_block.copy_from_slice(&block);
    }

    ciphertext
}
