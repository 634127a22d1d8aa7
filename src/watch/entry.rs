//! Watch-list entries and their one-line persisted form
//!
//! ```text
//! GPIOA.MODER _ 0x40020000              register entry, no alias
//! GPIOA.MODER.MODE0 m0 0x40020000 0 2   field entry, alias `m0`
//! ```

use crate::catalog::Device;
use crate::codec::{self, parse_integer};
use crate::error::{RegWatchError, Result};
use crate::types::{NumericBase, RegisterWidth, ValueShape};
use std::fmt;

/// Placeholder written in place of an absent alias
pub const ALIAS_SENTINEL: &str = "_";

/// Whether an entry watches a whole register or one of its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Register,
    Field { bit_offset: u32, bit_width: u32 },
}

/// One watched register or bit-field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEntry {
    /// Dotted catalog path, `PERIPH.REG` or `PERIPH.REG.FIELD`
    pub name: String,
    alias: Option<String>,
    /// Absolute address of the containing register
    pub address: u32,
    pub kind: EntryKind,
}

/// Check that an alias can be stored as a single token
pub fn validate_alias(alias: &str) -> Result<()> {
    if alias.chars().any(char::is_whitespace) {
        return Err(RegWatchError::InvalidValue(format!(
            "alias '{}' must not contain whitespace",
            alias
        )));
    }
    Ok(())
}

/// Normalize user alias input: empty and the sentinel both mean "no alias"
pub fn normalize_alias(alias: Option<&str>) -> Option<String> {
    alias
        .map(str::trim)
        .filter(|a| !a.is_empty() && *a != ALIAS_SENTINEL)
        .map(str::to_string)
}

impl WatchEntry {
    /// Create a whole-register entry
    pub fn register(name: impl Into<String>, address: u32) -> Self {
        Self {
            name: name.into(),
            alias: None,
            address,
            kind: EntryKind::Register,
        }
    }

    /// Create a bit-field entry, checking the field geometry
    pub fn field(name: impl Into<String>, address: u32, bit_offset: u32, bit_width: u32) -> Result<Self> {
        codec::extract_field(0, bit_offset, bit_width)?;
        Ok(Self {
            name: name.into(),
            alias: None,
            address,
            kind: EntryKind::Field {
                bit_offset,
                bit_width,
            },
        })
    }

    /// Set the display alias
    pub fn with_alias(mut self, alias: Option<&str>) -> Self {
        self.alias = normalize_alias(alias);
        self
    }

    /// The explicit alias, if any
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Last segment of the dotted name
    pub fn leaf_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Name shown in the display: the alias, or the leaf of the catalog name
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or_else(|| self.leaf_name())
    }

    pub fn is_field(&self) -> bool {
        matches!(self.kind, EntryKind::Field { .. })
    }

    /// Shape used to format this entry's value
    pub fn shape(&self) -> ValueShape {
        match self.kind {
            EntryKind::Register => ValueShape::Register(RegisterWidth::W32),
            EntryKind::Field { bit_width, .. } => ValueShape::Field { width: bit_width },
        }
    }

    /// The entry's value within the raw register word
    pub fn value_from_word(&self, raw: u32) -> Result<u32> {
        match self.kind {
            EntryKind::Register => Ok(raw),
            EntryKind::Field {
                bit_offset,
                bit_width,
            } => codec::extract_field(raw, bit_offset, bit_width),
        }
    }

    /// Format the entry's value from the raw register word
    pub fn format_word(&self, raw: u32, base: NumericBase) -> Result<String> {
        let value = self.value_from_word(raw)?;
        Ok(codec::format_value(value, self.shape(), base))
    }

    /// Whether writing this entry needs the current register word
    pub fn needs_read_for_write(&self) -> bool {
        self.is_field()
    }

    /// Compute the register word to write so this entry reads back `value`
    pub fn word_for_write(&self, current: u32, value: u64) -> Result<u32> {
        match self.kind {
            EntryKind::Register => u32::try_from(value).map_err(|_| {
                RegWatchError::Range(format!(
                    "value {} does not fit in register {}",
                    value, self.name
                ))
            }),
            EntryKind::Field {
                bit_offset,
                bit_width,
            } => codec::insert_field(current, bit_offset, bit_width, value).map_err(|e| match e {
                RegWatchError::Range(msg) => RegWatchError::Range(format!("{}: {}", self.name, msg)),
                other => other,
            }),
        }
    }

    /// Canonical address literal, `0x%08x`
    pub fn address_literal(&self) -> String {
        format!("0x{:08x}", self.address)
    }

    /// Resolve a dotted catalog name into an entry
    pub fn resolve(dotted: &str, device: &Device) -> Result<Self> {
        let segments: Vec<&str> = dotted.split('.').collect();
        match segments.as_slice() {
            [p, r] => {
                let (_, _, address) = device.lookup_register(p, r)?;
                Ok(Self::register(dotted, address))
            }
            [p, r, f] => {
                let (_, field, address) = device.lookup_field(p, r, f)?;
                Self::field(dotted, address, field.bit_offset, field.bit_width)
            }
            _ => Err(RegWatchError::NotFound(format!(
                "{} (expected PERIPHERAL.REGISTER or PERIPHERAL.REGISTER.FIELD)",
                dotted
            ))),
        }
    }

    /// Parse one persisted line; `line_no` is 1-based and only used in errors
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let parse_address = |text: &str| -> Result<u32> {
            parse_integer(text)
                .ok()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| RegWatchError::format(line_no, format!("invalid address '{}'", text)))
        };
        let parse_bits = |what: &str, text: &str| -> Result<u32> {
            text.parse::<u32>()
                .map_err(|_| RegWatchError::format(line_no, format!("invalid {} '{}'", what, text)))
        };

        match tokens.as_slice() {
            [name, alias, address] => {
                Ok(Self::register(*name, parse_address(*address)?).with_alias(Some(*alias)))
            }
            [name, alias, address, offset, width] => {
                let offset = parse_bits("bit offset", *offset)?;
                let width = parse_bits("bit width", *width)?;
                Self::field(*name, parse_address(*address)?, offset, width)
                    .map(|e| e.with_alias(Some(*alias)))
                    .map_err(|e| RegWatchError::format(line_no, e.to_string()))
            }
            other => Err(RegWatchError::format(
                line_no,
                format!("expected 3 or 5 tokens, found {}", other.len()),
            )),
        }
    }

    /// Serialize to the persisted one-line form
    pub fn to_line(&self) -> String {
        let alias = self.alias.as_deref().unwrap_or(ALIAS_SENTINEL);
        match self.kind {
            EntryKind::Register => format!("{} {} {}", self.name, alias, self.address_literal()),
            EntryKind::Field {
                bit_offset,
                bit_width,
            } => format!(
                "{} {} {} {} {}",
                self.name,
                alias,
                self.address_literal(),
                bit_offset,
                bit_width
            ),
        }
    }
}

impl fmt::Display for WatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}
