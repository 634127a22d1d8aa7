//! Device catalog: peripherals, registers and bit-fields
//!
//! The catalog is the read-only description of a device's memory-mapped
//! registers. It is produced by an external device-description parser and
//! handed to regwatch as JSON or TOML; this module only models and queries it.
//!
//! ```text
//! GPIOA                 (peripheral, base 0x4002_0000)
//! +-- MODER             (register, offset 0x00)
//! |   +-- MODE0         (field, bits 0..2)
//! |   +-- MODE1         (field, bits 2..4)
//! +-- ODR               (register, offset 0x14)
//! GPIOB  derived_from GPIOA
//! ```
//!
//! A peripheral that names another in `derived_from` and declares no
//! registers of its own shares the registers of the peripheral it derives
//! from, at its own base address.

use crate::codec::{extract_field, parse_integer};
use crate::error::{RegWatchError, Result, ResultExt};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// A parsed device description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Device {
    /// Device name, e.g. `STM32F407`
    #[serde(default)]
    pub name: String,
    /// Peripherals in catalog order
    #[serde(default)]
    pub peripherals: Vec<Peripheral>,
}

/// A named hardware block with a base address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peripheral {
    pub name: String,
    #[serde(deserialize_with = "deserialize_address")]
    pub base_address: u32,
    #[serde(default)]
    pub description: String,
    /// Name of the peripheral whose registers this one shares
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<String>,
    #[serde(default)]
    pub registers: Vec<Register>,
}

/// An addressable word within a peripheral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    pub name: String,
    #[serde(deserialize_with = "deserialize_address")]
    pub address_offset: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// A named bit range within a register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub bit_offset: u32,
    pub bit_width: u32,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AddressRepr {
    Int(u64),
    Text(String),
}

/// Accept addresses either as integers or as `"0x…"` strings
fn deserialize_address<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match AddressRepr::deserialize(deserializer)? {
        AddressRepr::Int(v) => v,
        AddressRepr::Text(s) => parse_integer(&s).map_err(D::Error::custom)?,
    };
    u32::try_from(value)
        .map_err(|_| D::Error::custom(format!("address 0x{:x} exceeds 32 bits", value)))
}

fn fold_description(text: &mut String) {
    if text.contains(['\n', '\r']) {
        *text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    }
}

impl Device {
    /// Load a catalog from a `.json` or `.toml` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(RegWatchError::from)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let device = match extension.as_deref() {
            Some("json") => Self::from_json_str(&content)?,
            Some("toml") => Self::from_toml_str(&content)?,
            _ => {
                return Err(RegWatchError::Config(format!(
                    "unsupported catalog format for {} (expected .json or .toml)",
                    path.display()
                )))
            }
        };

        tracing::debug!(
            "Loaded catalog {} with {} peripheral(s)",
            path.display(),
            device.peripherals.len()
        );
        Ok(device)
    }

    /// Parse a catalog from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let mut device: Device = serde_json::from_str(content)
            .map_err(|e| RegWatchError::Serialization(format!("Failed to parse catalog: {}", e)))?;
        device.normalize();
        device.validate()?;
        Ok(device)
    }

    /// Parse a catalog from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut device: Device = toml::from_str(content)
            .map_err(|e| RegWatchError::Serialization(format!("Failed to parse catalog: {}", e)))?;
        device.normalize();
        device.validate()?;
        Ok(device)
    }

    /// Fold multi-line descriptions onto one line
    fn normalize(&mut self) {
        for p in &mut self.peripherals {
            fold_description(&mut p.description);
            for r in &mut p.registers {
                fold_description(&mut r.description);
                for f in &mut r.fields {
                    fold_description(&mut f.description);
                }
            }
        }
    }

    /// Check every field fits its 32-bit register
    pub fn validate(&self) -> Result<()> {
        for p in &self.peripherals {
            for r in &p.registers {
                for f in &r.fields {
                    extract_field(0, f.bit_offset, f.bit_width).map_err(|_| {
                        RegWatchError::Range(format!(
                            "field {}.{}.{} (offset {}, width {}) does not fit a 32-bit register",
                            p.name, r.name, f.name, f.bit_offset, f.bit_width
                        ))
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Find a peripheral by name
    pub fn peripheral(&self, name: &str) -> Option<&Peripheral> {
        self.peripherals.iter().find(|p| p.name == name)
    }

    /// The peripheral whose register block `peripheral` uses
    fn register_source<'a>(&'a self, peripheral: &'a Peripheral) -> &'a Peripheral {
        match peripheral.derived_from {
            Some(ref base) if peripheral.registers.is_empty() => {
                self.peripheral(base).unwrap_or(peripheral)
            }
            _ => peripheral,
        }
    }

    /// Registers of a peripheral, following `derived_from`
    pub fn registers_of<'a>(&'a self, peripheral: &'a Peripheral) -> &'a [Register] {
        &self.register_source(peripheral).registers
    }

    /// Description of a peripheral, falling back to the one it derives from
    pub fn description_of<'a>(&'a self, peripheral: &'a Peripheral) -> &'a str {
        if peripheral.description.is_empty() {
            &self.register_source(peripheral).description
        } else {
            &peripheral.description
        }
    }

    /// Absolute address of a register
    pub fn register_address(&self, peripheral: &Peripheral, register: &Register) -> Result<u32> {
        peripheral
            .base_address
            .checked_add(register.address_offset)
            .ok_or_else(|| {
                RegWatchError::Range(format!(
                    "{}.{} address overflows 32 bits",
                    peripheral.name, register.name
                ))
            })
    }

    /// Resolve `peripheral.register` to the register and its absolute address
    pub fn lookup_register(
        &self,
        peripheral: &str,
        register: &str,
    ) -> Result<(&Peripheral, &Register, u32)> {
        let p = self
            .peripheral(peripheral)
            .ok_or_else(|| RegWatchError::NotFound(format!("peripheral {}", peripheral)))?;
        let r = self
            .registers_of(p)
            .iter()
            .find(|r| r.name == register)
            .ok_or_else(|| {
                RegWatchError::NotFound(format!("register {}.{}", peripheral, register))
            })?;
        let address = self.register_address(p, r)?;
        Ok((p, r, address))
    }

    /// Resolve `peripheral.register.field`
    pub fn lookup_field(
        &self,
        peripheral: &str,
        register: &str,
        field: &str,
    ) -> Result<(&Register, &Field, u32)> {
        let (_, r, address) = self.lookup_register(peripheral, register)?;
        let f = r.fields.iter().find(|f| f.name == field).ok_or_else(|| {
            RegWatchError::NotFound(format!("field {}.{}.{}", peripheral, register, field))
        })?;
        Ok((r, f, address))
    }
}
