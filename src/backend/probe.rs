//! Probe-RS backend for register access over SWD/JTAG
//!
//! This module connects to a debug probe through probe-rs and exposes the
//! target's memory as [`TargetMemory`] words.
//!
//! # Supported Probes
//!
//! Any probe supported by probe-rs, including:
//! - ST-Link (V2, V2-1, V3)
//! - J-Link
//! - CMSIS-DAP compatible probes
//!
//! # Example
//!
//! ```ignore
//! use regwatch_rs::backend::ProbeMemory;
//! use regwatch_rs::config::ProbeConfig;
//!
//! let mut probe = ProbeMemory::new(ProbeConfig::default());
//! for info in ProbeMemory::list_probes() {
//!     println!("Found: {}", info);
//! }
//! probe.connect()?;
//! let moder = probe.read_word(0x4002_0000)?;
//! ```

use super::memory::TargetMemory;
use crate::config::{ConnectUnderReset, MemoryAccessMode, ProbeConfig, ProbeProtocol};
use crate::error::{RegWatchError, Result};
use probe_rs::{probe::list::Lister, Core, MemoryInterface, Permissions, Session};
use std::time::{Duration, Instant};

/// Information about a detected probe
#[derive(Debug, Clone)]
pub struct ProbeInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    /// Probe type/name
    pub probe_type: String,
}

impl std::fmt::Display for ProbeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref serial) = self.serial_number {
            write!(
                f,
                "{} ({:04x}:{:04x}) - {}",
                self.probe_type, self.vendor_id, self.product_id, serial
            )
        } else {
            write!(
                f,
                "{} ({:04x}:{:04x})",
                self.probe_type, self.vendor_id, self.product_id
            )
        }
    }
}

/// Statistics for word accesses
#[derive(Debug, Clone, Default)]
pub struct ProbeStats {
    pub successful_reads: u64,
    pub failed_reads: u64,
    pub writes: u64,
    /// Total read time in microseconds
    pub total_read_time_us: u64,
}

impl ProbeStats {
    /// Average read time in microseconds
    pub fn avg_read_time_us(&self) -> f64 {
        if self.successful_reads == 0 {
            0.0
        } else {
            self.total_read_time_us as f64 / self.successful_reads as f64
        }
    }

    /// Success rate as percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.successful_reads + self.failed_reads;
        if total == 0 {
            100.0
        } else {
            (self.successful_reads as f64 / total as f64) * 100.0
        }
    }
}

impl std::fmt::Display for ProbeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} reads ({:.1}% ok, avg {:.0}us), {} writes",
            self.successful_reads + self.failed_reads,
            self.success_rate(),
            self.avg_read_time_us(),
            self.writes
        )
    }
}

/// Live target memory through a probe-rs session
pub struct ProbeMemory {
    session: Option<Session>,
    config: ProbeConfig,
    stats: ProbeStats,
}

fn unavailable(address: u32, err: impl std::fmt::Display) -> RegWatchError {
    RegWatchError::TargetUnavailable {
        address,
        message: err.to_string(),
    }
}

impl ProbeMemory {
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            session: None,
            config,
            stats: ProbeStats::default(),
        }
    }

    /// List all available probes
    pub fn list_probes() -> Vec<ProbeInfo> {
        Lister::new()
            .list_all()
            .into_iter()
            .map(|probe| ProbeInfo {
                vendor_id: probe.vendor_id,
                product_id: probe.product_id,
                serial_number: probe.serial_number.clone(),
                probe_type: probe.probe_type().to_string(),
            })
            .collect()
    }

    /// Connect using the configured selector, or the first probe found
    pub fn connect(&mut self) -> Result<()> {
        self.disconnect();

        tracing::info!(
            "Connecting: target={}, speed={}kHz, protocol={}, connect_under_reset={}, halt_on_connect={}",
            self.config.target_chip,
            self.config.speed_khz,
            self.config.protocol,
            self.config.connect_under_reset,
            self.config.halt_on_connect
        );

        let probes = Lister::new().list_all();
        if probes.is_empty() {
            return Err(RegWatchError::Config("No probes found".to_string()));
        }
        tracing::debug!("Found {} probe(s)", probes.len());

        let mut probe = match self.config.probe_selector.as_deref() {
            Some(selector) => {
                let wanted = selector.to_lowercase();
                probes
                    .into_iter()
                    .find(|p| {
                        // VID:PID or (part of) the serial number
                        let vid_pid = format!("{:04x}:{:04x}", p.vendor_id, p.product_id);
                        vid_pid == wanted
                            || p.serial_number
                                .as_ref()
                                .is_some_and(|s| s.to_lowercase().contains(&wanted))
                    })
                    .ok_or_else(|| RegWatchError::Config(format!("Probe not found: {}", selector)))?
                    .open()?
            }
            None => probes
                .first()
                .ok_or_else(|| RegWatchError::Config("No probes available".to_string()))?
                .open()?,
        };

        if let Err(e) = probe.set_speed(self.config.speed_khz) {
            tracing::warn!("Failed to set probe speed: {}", e);
        }

        let protocol = match self.config.protocol {
            ProbeProtocol::Swd => probe_rs::probe::WireProtocol::Swd,
            ProbeProtocol::Jtag => probe_rs::probe::WireProtocol::Jtag,
        };
        probe.select_protocol(protocol)?;

        let target = probe_rs::config::Registry::from_builtin_families()
            .get_target_by_name(&self.config.target_chip)?;
        let permissions = Permissions::default();

        let mut session = match self.config.connect_under_reset {
            ConnectUnderReset::None => probe.attach(target, permissions)?,
            ConnectUnderReset::Hardware => {
                tracing::debug!("Attaching under hardware reset (NRST pin)");
                probe.attach_under_reset(target, permissions)?
            }
            ConnectUnderReset::Software => {
                let mut session = probe.attach(target, permissions)?;
                match session.core(0).and_then(|mut core| core.reset()) {
                    Ok(()) => tracing::info!("Software reset (SYSRESETREQ) successful"),
                    Err(e) => tracing::warn!("Software reset failed: {}", e),
                }
                session
            }
        };

        if self.config.halt_on_connect {
            match session.core(0) {
                Ok(mut core) => wait_for_halt(&mut core),
                Err(e) => tracing::warn!("Failed to access core 0 for halt: {}", e),
            }
        }

        self.session = Some(session);
        self.stats = ProbeStats::default();
        tracing::info!("Connected to target: {}", self.config.target_chip);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.session.take().is_some() {
            tracing::info!("Disconnected from probe: {}", self.stats);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn stats(&self) -> &ProbeStats {
        &self.stats
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Run `op` on core 0, halting around it in `Halted` access mode
    fn with_core<T>(
        &mut self,
        address: u32,
        op: impl FnOnce(&mut Core<'_>) -> std::result::Result<T, probe_rs::Error>,
    ) -> Result<T> {
        let mode = self.config.memory_access_mode;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| unavailable(address, "not connected to a probe"))?;
        let mut core = session.core(0).map_err(|e| unavailable(address, e))?;

        let was_running = match mode {
            MemoryAccessMode::Halted => {
                let running = core.status().map(|s| !s.is_halted()).unwrap_or(false);
                if running {
                    if let Err(e) = core.halt(Duration::from_millis(100)) {
                        tracing::warn!("Failed to halt core for access: {}", e);
                    }
                }
                running
            }
            MemoryAccessMode::Background => false,
        };

        let result = op(&mut core).map_err(|e| unavailable(address, e));

        if was_running {
            if let Err(e) = core.run() {
                tracing::warn!("Failed to resume core after access: {}", e);
            }
        }
        result
    }
}

fn wait_for_halt(core: &mut Core<'_>) {
    if let Err(e) = core.halt(Duration::from_millis(500)) {
        tracing::warn!("Failed to halt core: {}", e);
        return;
    }
    let timeout = Duration::from_secs(2);
    let start = Instant::now();
    loop {
        match core.status() {
            Ok(status) if status.is_halted() => {
                tracing::info!("Core halted");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to read core status: {}", e);
                return;
            }
        }
        if start.elapsed() > timeout {
            tracing::warn!("Timeout waiting for core to halt");
            return;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

impl TargetMemory for ProbeMemory {
    fn read_word(&mut self, address: u32) -> Result<u32> {
        let start = Instant::now();
        let result = self.with_core(address, |core| core.read_word_32(u64::from(address)));
        match result {
            Ok(_) => {
                self.stats.successful_reads += 1;
                self.stats.total_read_time_us += start.elapsed().as_micros() as u64;
            }
            Err(_) => self.stats.failed_reads += 1,
        }
        tracing::trace!("read 0x{:08x}: {:?}", address, result.as_ref().ok());
        result
    }

    fn write_word(&mut self, address: u32, value: u32) -> Result<()> {
        self.with_core(address, |core| core.write_word_32(u64::from(address), value))?;
        self.stats.writes += 1;
        tracing::debug!("wrote 0x{:08x} to 0x{:08x}", value, address);
        Ok(())
    }
}

impl Drop for ProbeMemory {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconnected_access_is_unavailable() {
        let mut probe = ProbeMemory::new(ProbeConfig::default());
        assert!(!probe.is_connected());
        let err = probe.read_word(0x4002_0000).unwrap_err();
        assert!(matches!(
            err,
            RegWatchError::TargetUnavailable { address: 0x4002_0000, .. }
        ));
        assert_eq!(probe.stats().failed_reads, 1);
        assert!(probe.write_word(0x4002_0000, 1).is_err());
    }

    #[test]
    fn test_probe_stats() {
        let mut stats = ProbeStats::default();
        assert_eq!(stats.avg_read_time_us(), 0.0);
        assert_eq!(stats.success_rate(), 100.0);

        stats.successful_reads = 9;
        stats.failed_reads = 1;
        assert_eq!(stats.success_rate(), 90.0);

        stats.total_read_time_us = 900;
        assert!((stats.avg_read_time_us() - 100.0).abs() < f64::EPSILON);

        stats.writes = 2;
        assert_eq!(stats.to_string(), "10 reads (90.0% ok, avg 100us), 2 writes");
    }

    #[test]
    fn test_probe_info_display() {
        let mut info = ProbeInfo {
            vendor_id: 0x0483,
            product_id: 0x374b,
            serial_number: None,
            probe_type: "ST-Link".to_string(),
        };
        assert_eq!(info.to_string(), "ST-Link (0483:374b)");
        info.serial_number = Some("066DFF".to_string());
        assert_eq!(info.to_string(), "ST-Link (0483:374b) - 066DFF");
    }

    #[test]
    #[ignore = "USB enumeration can hang on some systems (especially macOS)"]
    fn test_list_probes() {
        let _ = ProbeMemory::list_probes().len();
    }
}
