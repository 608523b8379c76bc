//! QR payload formatting and symbol encoding
//!
//! [`format_payload`] maps user input plus a type tag to the exact string
//! stored in the symbol; [`QrEncoder`] renders that string to a PNG.

mod encoder;

pub use encoder::QrEncoder;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of content a client asks to encode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QrType {
    /// Literal text or URL, encoded unchanged
    #[default]
    General,
    /// Phone number turned into a WhatsApp click-to-chat link
    Whatsapp,
    /// Address turned into a `mailto:` URI
    Email,
    /// Coordinates turned into a `geo:` URI
    Location,
}

impl QrType {
    /// Resolve a client-supplied tag. Unrecognised tags fall back to `General`.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "whatsapp" => Self::Whatsapp,
            "email" => Self::Email,
            "location" => Self::Location,
            _ => Self::General,
        }
    }

    /// Canonical lowercase tag
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Whatsapp => "whatsapp",
            Self::Email => "email",
            Self::Location => "location",
        }
    }
}

impl fmt::Display for QrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the string that goes into the QR symbol. Pure and infallible.
pub fn format_payload(data: &str, qr_type: QrType) -> String {
    match qr_type {
        QrType::Whatsapp => {
            let digits: String = data.chars().filter(|c| c.is_ascii_digit()).collect();
            format!("wa.me/{digits}")
        }
        QrType::Email => format!("mailto:{data}"),
        QrType::Location => format!("geo:{data}"),
        QrType::General => data.to_string(),
    }
}

/// QR error correction level, lowest (`L`) to highest (`H`) redundancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EcLevel {
    /// ~7% recovery
    L,
    /// ~15% recovery
    M,
    /// ~25% recovery
    Q,
    /// ~30% recovery
    H,
}

impl From<EcLevel> for qrcode::EcLevel {
    fn from(level: EcLevel) -> Self {
        match level {
            EcLevel::L => qrcode::EcLevel::L,
            EcLevel::M => qrcode::EcLevel::M,
            EcLevel::Q => qrcode::EcLevel::Q,
            EcLevel::H => qrcode::EcLevel::H,
        }
    }
}

impl FromStr for EcLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "L" => Ok(Self::L),
            "M" => Ok(Self::M),
            "Q" => Ok(Self::Q),
            "H" => Ok(Self::H),
            _ => Err(format!(
                "Unknown error correction level '{value}', expected L, M, Q or H"
            )),
        }
    }
}

/// Fixed symbol parameters applied to every generated code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolConfig {
    /// Smallest version tried; larger versions are used when the payload needs them
    pub min_version: i16,
    /// Error correction level
    pub ec_level: EcLevel,
    /// Pixels per module
    pub module_size: u32,
    /// Quiet zone width in modules
    pub border: u32,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            min_version: 1,
            ec_level: EcLevel::L,
            module_size: 10,
            border: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_is_identity() {
        for input in ["https://example.com", "hello world", "ünïcødé ✓"] {
            assert_eq!(format_payload(input, QrType::General), input);
        }
    }

    #[test]
    fn test_whatsapp_keeps_digits_in_order() {
        assert_eq!(
            format_payload("+1 (555) 123-4567", QrType::Whatsapp),
            "wa.me/15551234567"
        );
    }

    #[test]
    fn test_whatsapp_without_digits() {
        assert_eq!(format_payload("call me", QrType::Whatsapp), "wa.me/");
        assert_eq!(format_payload("", QrType::Whatsapp), "wa.me/");
    }

    #[test]
    fn test_email_and_location_prefixes() {
        assert_eq!(format_payload("a@b.com", QrType::Email), "mailto:a@b.com");
        assert_eq!(
            format_payload("40.7,-74.0", QrType::Location),
            "geo:40.7,-74.0"
        );
        // No validation of the underlying value
        assert_eq!(format_payload("not an email", QrType::Email), "mailto:not an email");
    }

    #[test]
    fn test_unknown_tag_falls_back_to_general() {
        assert_eq!(QrType::parse("sms"), QrType::General);
        assert_eq!(QrType::parse("WhatsApp"), QrType::General);
        assert_eq!(QrType::parse(""), QrType::General);
        assert_eq!(QrType::parse("location"), QrType::Location);
    }

    #[test]
    fn test_ec_level_parse() {
        assert_eq!("l".parse::<EcLevel>(), Ok(EcLevel::L));
        assert_eq!("Q".parse::<EcLevel>(), Ok(EcLevel::Q));
        assert!("X".parse::<EcLevel>().is_err());
    }
}
