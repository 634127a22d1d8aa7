//! Core value types for regwatch-rs
//!
//! # Main Types
//!
//! - [`NumericBase`] - Display base for watched values (hex, binary, decimal)
//! - [`RegisterWidth`] - Width of a whole register word (8, 16 or 32 bits)
//! - [`ValueShape`] - Whether a value is a whole register or a bit-field
//!
//! The shape decides the formatting rules applied by [`crate::codec`]:
//! registers are zero-padded to their full width, fields use a tighter form
//! since their width is rarely a multiple of four.

use crate::error::{RegWatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric base used to render watched values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NumericBase {
    /// Hexadecimal, `0x` prefixed
    #[default]
    Hex,
    /// Binary, zero padded
    Bin,
    /// Unsigned decimal
    Dec,
}

impl NumericBase {
    /// All bases, in the order they are offered to the user
    pub const ALL: [NumericBase; 3] = [NumericBase::Hex, NumericBase::Bin, NumericBase::Dec];
}

impl fmt::Display for NumericBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericBase::Hex => write!(f, "hex"),
            NumericBase::Bin => write!(f, "bin"),
            NumericBase::Dec => write!(f, "decimal"),
        }
    }
}

impl FromStr for NumericBase {
    type Err = RegWatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hex" | "hexadecimal" | "x" => Ok(NumericBase::Hex),
            "bin" | "binary" | "b" => Ok(NumericBase::Bin),
            "dec" | "decimal" | "d" => Ok(NumericBase::Dec),
            other => Err(RegWatchError::Config(format!("unknown numeric base '{}'", other))),
        }
    }
}

/// Width of a whole register word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RegisterWidth {
    W8,
    W16,
    #[default]
    W32,
}

impl RegisterWidth {
    /// Number of bits in the word
    pub fn bits(self) -> u32 {
        match self {
            RegisterWidth::W8 => 8,
            RegisterWidth::W16 => 16,
            RegisterWidth::W32 => 32,
        }
    }

    /// Map a bit count to a register width
    pub fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(RegisterWidth::W8),
            16 => Ok(RegisterWidth::W16),
            32 => Ok(RegisterWidth::W32),
            other => Err(RegWatchError::Range(format!(
                "register width must be 8, 16 or 32 bits, got {}",
                other
            ))),
        }
    }
}

/// Shape of a watched value, which selects the formatting rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueShape {
    /// A whole register word
    Register(RegisterWidth),
    /// A bit-field of the given width
    Field { width: u32 },
}

impl ValueShape {
    /// Number of significant bits in the value
    pub fn bits(self) -> u32 {
        match self {
            ValueShape::Register(width) => width.bits(),
            ValueShape::Field { width } => width,
        }
    }

    pub fn is_field(self) -> bool {
        matches!(self, ValueShape::Field { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_from_str() {
        assert_eq!("HEX".parse::<NumericBase>().unwrap(), NumericBase::Hex);
        assert_eq!("binary".parse::<NumericBase>().unwrap(), NumericBase::Bin);
        assert_eq!("DECIMAL".parse::<NumericBase>().unwrap(), NumericBase::Dec);
        assert!("octal".parse::<NumericBase>().is_err());
    }

    #[test]
    fn test_base_display_round_trips() {
        for base in NumericBase::ALL {
            assert_eq!(base.to_string().parse::<NumericBase>().unwrap(), base);
        }
    }

    #[test]
    fn test_register_width() {
        assert_eq!(RegisterWidth::from_bits(16).unwrap(), RegisterWidth::W16);
        assert!(RegisterWidth::from_bits(12).is_err());
        assert_eq!(RegisterWidth::default().bits(), 32);
    }

    #[test]
    fn test_value_shape_bits() {
        assert_eq!(ValueShape::Register(RegisterWidth::W8).bits(), 8);
        assert_eq!(ValueShape::Field { width: 3 }.bits(), 3);
        assert!(ValueShape::Field { width: 3 }.is_field());
    }
}
