//! Bit-level value extraction, insertion and formatting
//!
//! Pure functions over raw register words. Nothing here performs I/O; the
//! only failures are the two range checks on field geometry and on values
//! written into a field.
//!
//! # Formatting rules
//!
//! | Shape    | Hex                    | Binary                               | Decimal |
//! |----------|------------------------|--------------------------------------|---------|
//! | Register | `0x` + `bits/4` digits | `bits` digits, `_` every 8 bits      | plain   |
//! | Field    | `0x` unpadded          | `0b` + `width` digits, ungrouped     | plain   |

use crate::error::{RegWatchError, Result};
use crate::types::{NumericBase, ValueShape};

/// Separator placed between 8-bit groups of a register's binary rendering
pub const BINARY_GROUP_SEPARATOR: char = '_';

/// Bits per binary group
const BINARY_GROUP_BITS: usize = 8;

/// Mask with the low `width` bits set (`width` up to 32)
#[inline]
fn low_mask(width: u32) -> u32 {
    ((1u64 << width) - 1) as u32
}

fn check_geometry(offset: u32, width: u32) -> Result<()> {
    if width == 0 {
        return Err(RegWatchError::Range("bit-field width must be at least 1".to_string()));
    }
    match offset.checked_add(width) {
        Some(end) if end <= 32 => Ok(()),
        _ => Err(RegWatchError::Range(format!(
            "bit-field at offset {} with width {} exceeds 32 bits",
            offset, width
        ))),
    }
}

/// Extract the unsigned sub-field `raw[offset .. offset + width]`
pub fn extract_field(raw: u32, offset: u32, width: u32) -> Result<u32> {
    check_geometry(offset, width)?;
    Ok((raw >> offset) & low_mask(width))
}

/// Replace the sub-field `raw[offset .. offset + width]` with `value`
pub fn insert_field(raw: u32, offset: u32, width: u32, value: u64) -> Result<u32> {
    check_geometry(offset, width)?;
    if value >= 1u64 << width {
        return Err(RegWatchError::Range(format!(
            "value {} does not fit in a {}-bit field",
            value, width
        )));
    }
    let mask = low_mask(width) << offset;
    Ok((raw & !mask) | ((value as u32) << offset))
}

/// Format a value in the requested base according to its shape
pub fn format_value(value: u32, shape: ValueShape, base: NumericBase) -> String {
    let bits = shape.bits().min(32);
    let value = value & low_mask(bits);
    match (shape, base) {
        (_, NumericBase::Dec) => value.to_string(),
        (ValueShape::Register(_), NumericBase::Hex) => {
            format!("0x{:0width$x}", value, width = (bits as usize).div_ceil(4))
        }
        (ValueShape::Register(_), NumericBase::Bin) => {
            group_binary(&format!("{:0width$b}", value, width = bits as usize))
        }
        (ValueShape::Field { .. }, NumericBase::Hex) => format!("0x{:x}", value),
        (ValueShape::Field { .. }, NumericBase::Bin) => {
            format!("0b{:0width$b}", value, width = bits as usize)
        }
    }
}

/// Split a binary digit string into 8-bit groups, most significant first
fn group_binary(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / BINARY_GROUP_BITS);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % BINARY_GROUP_BITS == 0 {
            out.push(BINARY_GROUP_SEPARATOR);
        }
        out.push(c);
    }
    out
}

/// Parse a string produced by [`format_value`] back into its value
pub fn parse_formatted(text: &str, base: NumericBase) -> Result<u32> {
    let text = text.trim();
    let (digits, radix) = match base {
        NumericBase::Hex => (strip_prefix_ci(text, "0x"), 16),
        NumericBase::Bin => (strip_prefix_ci(text, "0b"), 2),
        NumericBase::Dec => (text, 10),
    };
    let digits: String = digits.chars().filter(|&c| c != BINARY_GROUP_SEPARATOR).collect();
    u32::from_str_radix(&digits, radix)
        .map_err(|e| RegWatchError::InvalidValue(format!("'{}' is not a {} value: {}", text, base, e)))
}

/// Parse a user-supplied integer literal (`0x`, `0b` or decimal)
pub fn parse_integer(text: &str) -> Result<u64> {
    let text = text.trim();
    let (digits, radix) = if let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        (rest, 16)
    } else if let Some(rest) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        (rest, 2)
    } else {
        (text, 10)
    };
    let digits: String = digits.chars().filter(|&c| c != BINARY_GROUP_SEPARATOR).collect();
    u64::from_str_radix(&digits, radix)
        .map_err(|_| RegWatchError::InvalidValue(format!("'{}' is not an integer", text)))
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> &'a str {
    match text.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &text[prefix.len()..],
        _ => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RegisterWidth;
    use proptest::prelude::*;

    const REG32: ValueShape = ValueShape::Register(RegisterWidth::W32);

    #[test]
    fn test_extract_field() {
        assert_eq!(extract_field(0x0000_0001, 0, 2).unwrap(), 1);
        assert_eq!(extract_field(0xABCD_1234, 16, 16).unwrap(), 0xABCD);
        assert_eq!(extract_field(0xFFFF_FFFF, 0, 32).unwrap(), 0xFFFF_FFFF);
        assert_eq!(extract_field(0x8000_0000, 31, 1).unwrap(), 1);
    }

    #[test]
    fn test_extract_field_out_of_range() {
        assert!(matches!(extract_field(0, 30, 3), Err(RegWatchError::Range(_))));
        assert!(matches!(extract_field(0, 0, 0), Err(RegWatchError::Range(_))));
        assert!(matches!(extract_field(0, u32::MAX, 2), Err(RegWatchError::Range(_))));
    }

    #[test]
    fn test_insert_field() {
        assert_eq!(insert_field(0xFFFF_FFFF, 4, 4, 0).unwrap(), 0xFFFF_FF0F);
        assert_eq!(insert_field(0x0000_0000, 8, 3, 5).unwrap(), 0x0000_0500);
        assert_eq!(insert_field(0x1234_5678, 0, 32, 0xCAFE_F00D).unwrap(), 0xCAFE_F00D);
    }

    #[test]
    fn test_insert_field_value_too_large() {
        assert!(matches!(insert_field(0, 0, 2, 4), Err(RegWatchError::Range(_))));
        assert!(matches!(insert_field(0, 0, 32, 1 << 32), Err(RegWatchError::Range(_))));
    }

    #[test]
    fn test_format_register_hex() {
        assert_eq!(format_value(1, REG32, NumericBase::Hex), "0x00000001");
        assert_eq!(
            format_value(0xAB, ValueShape::Register(RegisterWidth::W8), NumericBase::Hex),
            "0xab"
        );
        assert_eq!(
            format_value(0x12, ValueShape::Register(RegisterWidth::W16), NumericBase::Hex),
            "0x0012"
        );
    }

    #[test]
    fn test_format_register_binary_grouped() {
        assert_eq!(
            format_value(0x8000_0001, REG32, NumericBase::Bin),
            "10000000_00000000_00000000_00000001"
        );
        assert_eq!(
            format_value(0x05, ValueShape::Register(RegisterWidth::W8), NumericBase::Bin),
            "00000101"
        );
    }

    #[test]
    fn test_format_field() {
        let shape = ValueShape::Field { width: 3 };
        assert_eq!(format_value(5, shape, NumericBase::Hex), "0x5");
        assert_eq!(format_value(5, shape, NumericBase::Bin), "0b101");
        assert_eq!(format_value(1, ValueShape::Field { width: 2 }, NumericBase::Bin), "0b01");
        assert_eq!(format_value(5, shape, NumericBase::Dec), "5");
    }

    #[test]
    fn test_format_decimal_unpadded() {
        assert_eq!(format_value(1, REG32, NumericBase::Dec), "1");
        assert_eq!(format_value(u32::MAX, REG32, NumericBase::Dec), "4294967295");
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("0x1F").unwrap(), 31);
        assert_eq!(parse_integer("0b1010_0000").unwrap(), 160);
        assert_eq!(parse_integer("42").unwrap(), 42);
        assert!(matches!(parse_integer("forty"), Err(RegWatchError::InvalidValue(_))));
    }

    fn any_shape() -> impl Strategy<Value = ValueShape> {
        prop_oneof![
            Just(ValueShape::Register(RegisterWidth::W8)),
            Just(ValueShape::Register(RegisterWidth::W16)),
            Just(ValueShape::Register(RegisterWidth::W32)),
            (1u32..=32).prop_map(|width| ValueShape::Field { width }),
        ]
    }

    proptest! {
        #[test]
        fn test_format_round_trip(
            shape in any_shape(),
            raw in any::<u32>(),
            base in prop::sample::select(NumericBase::ALL.to_vec()),
        ) {
            let value = raw & low_mask(shape.bits());
            let text = format_value(value, shape, base);
            prop_assert_eq!(parse_formatted(&text, base).unwrap(), value);
        }

        #[test]
        fn test_insert_then_extract(
            raw in any::<u32>(),
            offset in 0u32..32,
            width in 1u32..=32,
            seed in any::<u64>(),
        ) {
            prop_assume!(offset + width <= 32);
            let value = seed % (1u64 << width);
            let written = insert_field(raw, offset, width, value).unwrap();
            prop_assert_eq!(extract_field(written, offset, width).unwrap() as u64, value);
        }

        #[test]
        fn test_insert_preserves_other_bits(
            raw in any::<u32>(),
            offset in 0u32..32,
            width in 1u32..=32,
        ) {
            prop_assume!(offset + width <= 32);
            let written = insert_field(raw, offset, width, 0).unwrap();
            let mask = low_mask(width) << offset;
            prop_assert_eq!(written & !mask, raw & !mask);
        }
    }
}
