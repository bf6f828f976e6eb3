//! Register ordering conventions for multi-register values
//!
//! Word order (BE/LE) and the byte-within-word swap are independent; the
//! four combinations cover the layouts PLC vendors commonly use.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Register layout for 32/64-bit values
///
/// # Naming Convention
/// Uses ABCD notation where A is the most significant byte. For the 32-bit
/// value `0x12345678` spread over two registers:
/// - `Be`: `[0x1234, 0x5678]` (AB CD)
/// - `Le`: `[0x5678, 0x1234]` (CD AB)
/// - `BeSwap`: `[0x3412, 0x7856]` (BA DC)
/// - `LeSwap`: `[0x7856, 0x3412]` (DC BA)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endian {
    /// Most significant register first (Modbus default)
    #[default]
    Be,
    /// Least significant register first
    Le,
    /// Most significant register first, bytes swapped inside each register
    BeSwap,
    /// Least significant register first, bytes swapped inside each register
    LeSwap,
}

impl Endian {
    pub const ALL: [Endian; 4] = [Endian::Be, Endian::Le, Endian::BeSwap, Endian::LeSwap];

    /// Whether the least significant register comes first
    pub fn is_word_reversed(&self) -> bool {
        matches!(self, Self::Le | Self::LeSwap)
    }

    /// Whether bytes are swapped inside every register
    pub fn is_byte_swapped(&self) -> bool {
        matches!(self, Self::BeSwap | Self::LeSwap)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Be => "be",
            Self::Le => "le",
            Self::BeSwap => "be_swap",
            Self::LeSwap => "le_swap",
        }
    }
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an endianness name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown endianness: {0}")]
pub struct ParseEndianError(pub String);

impl FromStr for Endian {
    type Err = ParseEndianError;

    /// Accepts the snake_case names as well as ABCD notation
    ///
    /// - "be", "ABCD" → Be
    /// - "le", "CDAB" → Le
    /// - "be_swap", "BADC" → BeSwap
    /// - "le_swap", "DCBA" → LeSwap
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        match normalized.as_str() {
            "BE" | "ABCD" | "AB_CD" => Ok(Self::Be),
            "LE" | "CDAB" | "CD_AB" => Ok(Self::Le),
            "BE_SWAP" | "BADC" | "BA_DC" => Ok(Self::BeSwap),
            "LE_SWAP" | "DCBA" | "DC_BA" => Ok(Self::LeSwap),
            _ => Err(ParseEndianError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_valid() {
        assert_eq!("be".parse::<Endian>(), Ok(Endian::Be));
        assert_eq!("ABCD".parse::<Endian>(), Ok(Endian::Be));
        assert_eq!("LE".parse::<Endian>(), Ok(Endian::Le));
        assert_eq!("cd-ab".parse::<Endian>(), Ok(Endian::Le));
        assert_eq!("be_swap".parse::<Endian>(), Ok(Endian::BeSwap));
        assert_eq!("Le-Swap".parse::<Endian>(), Ok(Endian::LeSwap));
        assert_eq!("DCBA".parse::<Endian>(), Ok(Endian::LeSwap));
    }

    #[test]
    fn test_from_str_invalid() {
        assert!("middle".parse::<Endian>().is_err());
        assert!("".parse::<Endian>().is_err());
    }

    #[test]
    fn test_properties() {
        assert!(!Endian::Be.is_word_reversed());
        assert!(Endian::LeSwap.is_word_reversed());
        assert!(Endian::BeSwap.is_byte_swapped());
        assert!(!Endian::Le.is_byte_swapped());
        assert_eq!(Endian::default(), Endian::Be);
    }

    #[test]
    fn test_display_matches_parse() {
        for endian in Endian::ALL {
            assert_eq!(endian.to_string().parse::<Endian>(), Ok(endian));
        }
    }
}
