//! # Value Information Field (VIF) Interpretation
//!
//! Maps primary VIF codes (EN 13757-3) onto a physical quantity, its
//! canonical unit and the power-of-ten scale that converts the raw record
//! value into that unit. The tables are range-based: the low bits of most
//! VIF codes select the decimal exponent.

/// Interpretation of a VIF code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VifInfo {
    pub unit: &'static str,
    pub exponent: f64,
    pub quantity: &'static str,
}

impl VifInfo {
    const fn new(unit: &'static str, exponent: f64, quantity: &'static str) -> Self {
        Self {
            unit,
            exponent,
            quantity,
        }
    }
}

/// Time unit selected by the low two bits of duration VIFs.
fn duration_unit(vif: u8) -> &'static str {
    match vif & 0x03 {
        0 => "s",
        1 => "min",
        2 => "h",
        _ => "days",
    }
}

fn pow10(exp: i32) -> f64 {
    10f64.powi(exp)
}

/// Look up a primary VIF code (extension bit already stripped).
///
/// Returns `None` for reserved codes and for the codes that carry no
/// tabulated interpretation (plain-text and manufacturer-specific VIFs
/// are handled by the record parser itself).
pub fn lookup_primary_vif(vif: u8) -> Option<VifInfo> {
    let vif = vif & 0x7F;
    let n = (vif & 0x07) as i32;
    let nn = (vif & 0x03) as i32;

    let info = match vif {
        0x00..=0x07 => VifInfo::new("Wh", pow10(n - 3), "Energy"),
        0x08..=0x0F => VifInfo::new("J", pow10(n), "Energy"),
        0x10..=0x17 => VifInfo::new("m3", pow10(n - 6), "Volume"),
        0x18..=0x1F => VifInfo::new("kg", pow10(n - 3), "Mass"),
        0x20..=0x23 => VifInfo::new(duration_unit(vif), 1.0, "On time"),
        0x24..=0x27 => VifInfo::new(duration_unit(vif), 1.0, "Operating time"),
        0x28..=0x2F => VifInfo::new("W", pow10(n - 3), "Power"),
        0x30..=0x37 => VifInfo::new("J/h", pow10(n), "Power"),
        0x38..=0x3F => VifInfo::new("m3/h", pow10(n - 6), "Volume flow"),
        0x40..=0x47 => VifInfo::new("m3/min", pow10(n - 7), "Volume flow"),
        0x48..=0x4F => VifInfo::new("m3/s", pow10(n - 9), "Volume flow"),
        0x50..=0x57 => VifInfo::new("kg/h", pow10(n - 3), "Mass flow"),
        0x58..=0x5B => VifInfo::new("°C", pow10(nn - 3), "Flow temperature"),
        0x5C..=0x5F => VifInfo::new("°C", pow10(nn - 3), "Return temperature"),
        0x60..=0x63 => VifInfo::new("K", pow10(nn - 3), "Temperature difference"),
        0x64..=0x67 => VifInfo::new("°C", pow10(nn - 3), "External temperature"),
        0x68..=0x6B => VifInfo::new("bar", pow10(nn - 3), "Pressure"),
        0x6C => VifInfo::new("", 1.0, "Date"),
        0x6D => VifInfo::new("", 1.0, "Date and time"),
        0x6E => VifInfo::new("HCA units", 1.0, "Heat cost allocation"),
        0x70..=0x73 => VifInfo::new(duration_unit(vif), 1.0, "Averaging duration"),
        0x74..=0x77 => VifInfo::new(duration_unit(vif), 1.0, "Actuality duration"),
        0x78 => VifInfo::new("", 1.0, "Fabrication number"),
        0x79 => VifInfo::new("", 1.0, "Identification"),
        0x7A => VifInfo::new("", 1.0, "Bus address"),
        _ => return None,
    };

    Some(info)
}
