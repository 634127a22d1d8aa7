//! Test data builders for catalogs and on-disk workspaces

use regwatch_rs::catalog::{Device, Field, Peripheral, Register};
use regwatch_rs::watch::{WatchListStore, DEFAULT_WATCH_LIST};
use regwatch_rs::WatchSession;
use std::path::PathBuf;
use tempfile::TempDir;

/// Builder for catalogs; registers attach to the last peripheral added and
/// fields to the last register
pub struct DeviceBuilder {
    device: Device,
}

impl DeviceBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            device: Device {
                name: name.to_string(),
                peripherals: Vec::new(),
            },
        }
    }

    pub fn peripheral(mut self, name: &str, base_address: u32) -> Self {
        self.device.peripherals.push(Peripheral {
            name: name.to_string(),
            base_address,
            description: format!("{} peripheral", name),
            derived_from: None,
            registers: Vec::new(),
        });
        self
    }

    /// A peripheral sharing the registers of `from`
    pub fn derived(mut self, name: &str, base_address: u32, from: &str) -> Self {
        self.device.peripherals.push(Peripheral {
            name: name.to_string(),
            base_address,
            description: String::new(),
            derived_from: Some(from.to_string()),
            registers: Vec::new(),
        });
        self
    }

    pub fn register(mut self, name: &str, address_offset: u32) -> Self {
        let peripheral = self
            .device
            .peripherals
            .last_mut()
            .expect("register() needs a peripheral first");
        peripheral.registers.push(Register {
            name: name.to_string(),
            address_offset,
            description: String::new(),
            fields: Vec::new(),
        });
        self
    }

    pub fn field(mut self, name: &str, bit_offset: u32, bit_width: u32) -> Self {
        let register = self
            .device
            .peripherals
            .last_mut()
            .and_then(|p| p.registers.last_mut())
            .expect("field() needs a register first");
        register.fields.push(Field {
            name: name.to_string(),
            bit_offset,
            bit_width,
            description: String::new(),
        });
        self
    }

    pub fn build(self) -> Device {
        self.device
    }
}

/// GPIOA/GPIOB (derived) with MODER and ODR, plus a timer counter
pub fn gpio_device() -> Device {
    DeviceBuilder::new("STM32F4")
        .peripheral("GPIOA", 0x4002_0000)
        .register("MODER", 0x00)
        .field("MODE0", 0, 2)
        .field("MODE1", 2, 2)
        .register("ODR", 0x14)
        .field("OD0", 0, 1)
        .derived("GPIOB", 0x4002_0400, "GPIOA")
        .peripheral("TIM2", 0x4000_0000)
        .register("CNT", 0x24)
        .build()
}

/// Temporary directory holding a `chip.json` catalog and a watch-list
pub struct Workspace {
    dir: TempDir,
    pub catalog: PathBuf,
    pub watch_list: PathBuf,
}

impl Workspace {
    /// Write `device` as `chip.json`; no watch-list yet
    pub fn new(device: &Device) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let catalog = dir.path().join("chip.json");
        let json = serde_json::to_string_pretty(device).expect("serialize catalog");
        std::fs::write(&catalog, json).expect("write catalog");
        let watch_list = dir.path().join(DEFAULT_WATCH_LIST);
        Self {
            dir,
            catalog,
            watch_list,
        }
    }

    /// Like [`new`](Self::new), also writing the watch-list
    pub fn with_watch_list(device: &Device, content: &str) -> Self {
        let ws = Self::new(device);
        ws.write_watch_list(content);
        ws
    }

    pub fn write_watch_list(&self, content: &str) {
        std::fs::write(&self.watch_list, content).expect("write watch-list");
    }

    pub fn read_watch_list(&self) -> String {
        std::fs::read_to_string(&self.watch_list).expect("read watch-list")
    }

    pub fn store(&self) -> WatchListStore {
        WatchListStore::new(&self.watch_list)
    }

    pub fn session(&self) -> WatchSession {
        WatchSession::new(self.store())
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_builder() {
        let device = gpio_device();
        assert_eq!(device.peripherals.len(), 3);
        let gpioa = device.peripheral("GPIOA").unwrap();
        assert_eq!(gpioa.registers[0].fields.len(), 2);
        let gpiob = device.peripheral("GPIOB").unwrap();
        assert_eq!(device.registers_of(gpiob).len(), 2);
    }
}
