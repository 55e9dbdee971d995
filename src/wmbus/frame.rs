//! # wM-Bus Frame Parsing
//!
//! Structural splitting of a raw telegram into its link-layer header
//! fields and payload. Parsing here is a pure function of the input bytes:
//! no CRC validation and no decryption is attempted, those are separate
//! pipeline stages.
//!
//! A normalized frame is laid out as
//!
//! ```text
//! L | C | M (2, LE) | A (4, LE) | V | T | CI | [short header] | data ... | [CRC]
//! ```
//!
//! where the L-field counts every byte after itself except CRC bytes.
//! With CI 0x7A the four-byte short application header (access number,
//! status, security word) precedes the data records; the security word
//! carries the encryption mode evaluated by the decryptor.

use crate::constants::{
    CI_RESP_LONG_HEADER, CI_RESP_SHORT_HEADER, WMBUS_CI_OFFSET, WMBUS_MIN_HEADER_LENGTH,
    WMBUS_SHORT_HEADER_LENGTH,
};
use crate::error::WMBusError;
use crate::wmbus::crc;
use serde::Serialize;

/// Meter category from the device type field (EN 13757-3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceType {
    Other,
    Oil,
    Electricity,
    Gas,
    Heat,
    Steam,
    WarmWater,
    Water,
    HeatCostAllocator,
    CompressedAir,
    CoolingLoadMeter,
    HeatInlet,
    HeatCooling,
    BusSystemComponent,
    CalorificValue,
    HotWater,
    ColdWater,
    DualWater,
    Pressure,
    SmokeDetector,
    RoomSensor,
    GasDetector,
    Breaker,
    Valve,
    WasteMeter,
    Reserved(u8),
}

impl DeviceType {
    /// Map the raw device type byte onto the EN 13757-3 category.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Other,
            0x01 => Self::Oil,
            0x02 => Self::Electricity,
            0x03 => Self::Gas,
            0x04 => Self::Heat,
            0x05 => Self::Steam,
            0x06 => Self::WarmWater,
            0x07 => Self::Water,
            0x08 => Self::HeatCostAllocator,
            0x09 => Self::CompressedAir,
            0x0A | 0x0B => Self::CoolingLoadMeter,
            0x0C => Self::HeatInlet,
            0x0D => Self::HeatCooling,
            0x0E => Self::BusSystemComponent,
            0x10 => Self::CalorificValue,
            0x11 => Self::HotWater,
            0x12 => Self::ColdWater,
            0x13 => Self::DualWater,
            0x14 => Self::Pressure,
            0x16 => Self::SmokeDetector,
            0x17 => Self::RoomSensor,
            0x18 => Self::GasDetector,
            0x19 => Self::Breaker,
            0x1A => Self::Valve,
            0x1C => Self::WasteMeter,
            other => Self::Reserved(other),
        }
    }

    /// Raw device type byte as it appears on the wire.
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Other => 0x00,
            Self::Oil => 0x01,
            Self::Electricity => 0x02,
            Self::Gas => 0x03,
            Self::Heat => 0x04,
            Self::Steam => 0x05,
            Self::WarmWater => 0x06,
            Self::Water => 0x07,
            Self::HeatCostAllocator => 0x08,
            Self::CompressedAir => 0x09,
            Self::CoolingLoadMeter => 0x0A,
            Self::HeatInlet => 0x0C,
            Self::HeatCooling => 0x0D,
            Self::BusSystemComponent => 0x0E,
            Self::CalorificValue => 0x10,
            Self::HotWater => 0x11,
            Self::ColdWater => 0x12,
            Self::DualWater => 0x13,
            Self::Pressure => 0x14,
            Self::SmokeDetector => 0x16,
            Self::RoomSensor => 0x17,
            Self::GasDetector => 0x18,
            Self::Breaker => 0x19,
            Self::Valve => 0x1A,
            Self::WasteMeter => 0x1C,
            Self::Reserved(other) => *other,
        }
    }

    /// Human-readable category name for diagnostics.
    pub fn name(&self) -> String {
        match self {
            Self::Other => "other".to_string(),
            Self::Oil => "oil".to_string(),
            Self::Electricity => "electricity".to_string(),
            Self::Gas => "gas".to_string(),
            Self::Heat => "heat".to_string(),
            Self::Steam => "steam".to_string(),
            Self::WarmWater => "warm water".to_string(),
            Self::Water => "water".to_string(),
            Self::HeatCostAllocator => "heat cost allocator".to_string(),
            Self::CompressedAir => "compressed air".to_string(),
            Self::CoolingLoadMeter => "cooling load meter".to_string(),
            Self::HeatInlet => "heat inlet".to_string(),
            Self::HeatCooling => "heat/cooling".to_string(),
            Self::BusSystemComponent => "bus system component".to_string(),
            Self::CalorificValue => "calorific value".to_string(),
            Self::HotWater => "hot water".to_string(),
            Self::ColdWater => "cold water".to_string(),
            Self::DualWater => "dual water".to_string(),
            Self::Pressure => "pressure".to_string(),
            Self::SmokeDetector => "smoke detector".to_string(),
            Self::RoomSensor => "room sensor".to_string(),
            Self::GasDetector => "gas detector".to_string(),
            Self::Breaker => "breaker".to_string(),
            Self::Valve => "valve".to_string(),
            Self::WasteMeter => "waste meter".to_string(),
            Self::Reserved(byte) => format!("reserved ({byte:#04x})"),
        }
    }
}

/// The header fields a driver is matched against, plus addressing.
///
/// Not unique across telegrams from the same physical meter over time
/// (the access number increments), but stable per meter identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelegramHeader {
    pub manufacturer_id: u16,
    pub address: u32,
    pub version: u8,
    pub device_type: DeviceType,
}

impl TelegramHeader {
    /// Decoded 3-letter manufacturer code.
    pub fn manufacturer(&self) -> String {
        decode_manufacturer(self.manufacturer_id)
    }
}

/// Represents a parsed wireless M-Bus (wM-Bus) frame.
#[derive(Debug, Clone)]
pub struct WMBusFrame {
    /// Declared frame length (bytes after the L-field, excluding CRC)
    pub length: u8,
    /// Control field (0x44 for unsolicited meter broadcasts)
    pub control: u8,
    /// Packed 2-byte manufacturer code
    pub manufacturer_id: u16,
    /// Device identifier (often BCD-coded digits)
    pub address: u32,
    /// Meter firmware/generation version
    pub version: u8,
    /// Meter category
    pub device_type: DeviceType,
    /// Control information field
    pub control_info: u8,
    /// Access number from the application header (0 when absent)
    pub access_number: u8,
    /// Status byte from the application header (0 when absent)
    pub status: u8,
    /// Security word from the application header (0 when absent)
    pub security_word: u16,
    /// True when the CI announced an application header carrying the
    /// access number, status and security word
    pub has_app_header: bool,
    /// Data records area, possibly ciphertext
    pub payload: Vec<u8>,
    /// Trailing CRC as read from the wire, if it was present
    pub crc: Option<u16>,
}

impl WMBusFrame {
    /// Parses a wM-Bus frame from the provided byte slice.
    ///
    /// Accepts normalized frames with or without the trailing CRC as well
    /// as raw block-form Type A frames (whose embedded CRC bytes are
    /// skipped structurally, not checked). Fails with `MalformedFrame`
    /// when the buffer is shorter than the fixed header or the L-field
    /// disagrees with the buffer size.
    pub fn parse(raw: &[u8]) -> Result<WMBusFrame, WMBusError> {
        if raw.len() < WMBUS_MIN_HEADER_LENGTH {
            return Err(WMBusError::MalformedFrame(format!(
                "telegram too short: {} bytes",
                raw.len()
            )));
        }

        let l_field = raw[0] as usize;
        if l_field < WMBUS_MIN_HEADER_LENGTH - 1 {
            return Err(WMBusError::MalformedFrame(format!(
                "length field {l_field} shorter than the fixed header"
            )));
        }

        if raw.len() == l_field + 3 {
            let crc = u16::from_le_bytes([raw[l_field + 1], raw[l_field + 2]]);
            return Self::parse_body(&raw[..l_field + 1], Some(crc));
        }

        if raw.len() == l_field + 1 {
            return Self::parse_body(raw, None);
        }

        if let Some(body) = crc::strip_block_crcs(raw) {
            // Block-form CRCs are per block; verify_telegram checks them
            // against the original buffer, so none is carried here.
            return Self::parse_body(&body, None);
        }

        Err(WMBusError::MalformedFrame(format!(
            "length field {} does not match buffer size {}",
            l_field,
            raw.len()
        )))
    }

    /// Parse a normalized frame body (L-field through last data byte).
    fn parse_body(body: &[u8], crc: Option<u16>) -> Result<WMBusFrame, WMBusError> {
        let length = body[0];
        let control = body[1];
        let manufacturer_id = u16::from_le_bytes([body[2], body[3]]);
        let address = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
        let version = body[8];
        let device_type = DeviceType::from_byte(body[9]);

        let control_info = if body.len() > WMBUS_CI_OFFSET {
            body[WMBUS_CI_OFFSET]
        } else {
            0
        };

        let mut access_number = 0;
        let mut status = 0;
        let mut security_word = 0;
        let mut has_app_header = false;
        let mut payload_start = (WMBUS_CI_OFFSET + 1).min(body.len());

        match control_info {
            CI_RESP_SHORT_HEADER => {
                let header_end = payload_start + WMBUS_SHORT_HEADER_LENGTH;
                if body.len() < header_end {
                    return Err(WMBusError::MalformedFrame(
                        "truncated short application header".to_string(),
                    ));
                }
                access_number = body[payload_start];
                status = body[payload_start + 1];
                security_word =
                    u16::from_le_bytes([body[payload_start + 2], body[payload_start + 3]]);
                has_app_header = true;
                payload_start = header_end;
            }
            CI_RESP_LONG_HEADER => {
                // Long header repeats the secondary address (8 bytes)
                // before the ACC/STATUS/security word trio.
                let header_end = payload_start + 12;
                if body.len() < header_end {
                    return Err(WMBusError::MalformedFrame(
                        "truncated long application header".to_string(),
                    ));
                }
                access_number = body[payload_start + 8];
                status = body[payload_start + 9];
                security_word =
                    u16::from_le_bytes([body[payload_start + 10], body[payload_start + 11]]);
                has_app_header = true;
                payload_start = header_end;
            }
            _ => {}
        }

        Ok(WMBusFrame {
            length,
            control,
            manufacturer_id,
            address,
            version,
            device_type,
            control_info,
            access_number,
            status,
            security_word,
            has_app_header,
            payload: body[payload_start..].to_vec(),
            crc,
        })
    }

    /// Assemble a normalized frame with a short application header and a
    /// valid trailing CRC. Used by tests and diagnostic tooling.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        control: u8,
        manufacturer_id: u16,
        address: u32,
        version: u8,
        device_type: u8,
        access_number: u8,
        status: u8,
        security_word: u16,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut body = Vec::with_capacity(15 + payload.len());
        body.push(0); // L-field, fixed up below
        body.push(control);
        body.extend_from_slice(&manufacturer_id.to_le_bytes());
        body.extend_from_slice(&address.to_le_bytes());
        body.push(version);
        body.push(device_type);
        body.push(CI_RESP_SHORT_HEADER);
        body.push(access_number);
        body.push(status);
        body.extend_from_slice(&security_word.to_le_bytes());
        body.extend_from_slice(payload);
        body[0] = (body.len() - 1) as u8;

        crc::append_crc(&body)
    }

    /// The driver-matching subset of this frame's fields.
    pub fn header(&self) -> TelegramHeader {
        TelegramHeader {
            manufacturer_id: self.manufacturer_id,
            address: self.address,
            version: self.version,
            device_type: self.device_type,
        }
    }

    /// Decoded 3-letter manufacturer code.
    pub fn manufacturer(&self) -> String {
        decode_manufacturer(self.manufacturer_id)
    }
}

/// Decodes the packed 2-byte manufacturer ID into its 3-letter code.
///
/// Each letter occupies 5 bits, offset so that 1 maps to 'A'.
pub fn decode_manufacturer(id: u16) -> String {
    let mut code = String::with_capacity(3);
    code.push(char::from(b'A' - 1 + ((id >> 10) & 0x1F) as u8));
    code.push(char::from(b'A' - 1 + ((id >> 5) & 0x1F) as u8));
    code.push(char::from(b'A' - 1 + (id & 0x1F) as u8));
    code
}

/// Encodes a 3-letter manufacturer code into its packed 2-byte form.
pub fn encode_manufacturer(code: &str) -> Result<u16, WMBusError> {
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(WMBusError::InvalidManufacturer);
    }

    let bytes = code.as_bytes();
    let id = (((bytes[0] - b'A' + 1) as u16) << 10)
        | (((bytes[1] - b'A' + 1) as u16) << 5)
        | ((bytes[2] - b'A' + 1) as u16);

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manufacturer_roundtrip() {
        assert_eq!(decode_manufacturer(0x2C2D), "KAM");
        assert_eq!(encode_manufacturer("KAM").unwrap(), 0x2C2D);
        assert_eq!(decode_manufacturer(encode_manufacturer("QDS").unwrap()), "QDS");
    }

    #[test]
    fn test_encode_manufacturer_invalid() {
        assert!(encode_manufacturer("kam").is_err());
        assert!(encode_manufacturer("KAMX").is_err());
        assert!(encode_manufacturer("K1M").is_err());
    }

    #[test]
    fn test_parse_build_roundtrip() {
        let raw = WMBusFrame::build(
            0x44,
            encode_manufacturer("KAM").unwrap(),
            0x12345678,
            0x1B,
            0x07,
            42,
            0x00,
            0x0000,
            &[0x04, 0x13, 0xD2, 0x04, 0x00, 0x00],
        );

        let frame = WMBusFrame::parse(&raw).unwrap();
        assert_eq!(frame.control, 0x44);
        assert_eq!(frame.manufacturer(), "KAM");
        assert_eq!(frame.address, 0x12345678);
        assert_eq!(frame.version, 0x1B);
        assert_eq!(frame.device_type, DeviceType::Water);
        assert_eq!(frame.access_number, 42);
        assert!(frame.has_app_header);
        assert_eq!(frame.payload, [0x04, 0x13, 0xD2, 0x04, 0x00, 0x00]);
        assert!(frame.crc.is_some());
    }

    #[test]
    fn test_parse_too_short() {
        let raw = [0x05, 0x44, 0x2d, 0x2c];
        assert!(matches!(
            WMBusFrame::parse(&raw),
            Err(WMBusError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_parse_length_mismatch() {
        // L-field claims 40 bytes, buffer holds 12
        let raw = [0x28, 0x44, 0x2d, 0x2c, 0x78, 0x56, 0x34, 0x12, 0x1b, 0x07, 0x78, 0x00];
        assert!(matches!(
            WMBusFrame::parse(&raw),
            Err(WMBusError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_parse_without_crc() {
        // Same frame as the roundtrip test but with the CRC stripped
        let raw = WMBusFrame::build(
            0x44,
            encode_manufacturer("QDS").unwrap(),
            0x00112233,
            0x01,
            0x07,
            1,
            0x00,
            0x0000,
            &[],
        );
        let stripped = &raw[..raw.len() - 2];

        let frame = WMBusFrame::parse(stripped).unwrap();
        assert_eq!(frame.manufacturer(), "QDS");
        assert!(frame.crc.is_none());
    }

    #[test]
    fn test_device_type_names() {
        assert_eq!(DeviceType::from_byte(0x07), DeviceType::Water);
        assert_eq!(DeviceType::from_byte(0x12), DeviceType::ColdWater);
        assert_eq!(DeviceType::from_byte(0x42), DeviceType::Reserved(0x42));
        assert_eq!(DeviceType::Water.name(), "water");
    }
}
