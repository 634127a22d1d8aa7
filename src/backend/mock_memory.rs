//! In-memory target for tests and `--mock` runs
//!
//! Words live in a sparse map; unmapped addresses read as zero. Individual
//! addresses can be marked as failing to exercise the unavailable-register
//! path, and every access is logged so tests can check how often a register
//! was touched.
//!
//! ```ignore
//! let mut memory = MockMemory::new().with_word(0x4002_0000, 0x0000_0001);
//! memory.fail_at(0x4002_0014);
//! assert_eq!(memory.read_word(0x4002_0000)?, 1);
//! ```

use super::memory::TargetMemory;
use crate::error::{RegWatchError, Result};
use std::collections::{HashMap, HashSet};

/// Sparse word-addressed memory
#[derive(Debug, Default, Clone)]
pub struct MockMemory {
    words: HashMap<u32, u32>,
    failing: HashSet<u32>,
    reads: Vec<u32>,
    writes: Vec<(u32, u32)>,
}

impl MockMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set_word`](Self::set_word)
    pub fn with_word(mut self, address: u32, value: u32) -> Self {
        self.set_word(address, value);
        self
    }

    pub fn set_word(&mut self, address: u32, value: u32) {
        self.words.insert(address, value);
    }

    /// Current word at `address` without logging a read
    pub fn word(&self, address: u32) -> u32 {
        self.words.get(&address).copied().unwrap_or(0)
    }

    /// Make every access to `address` fail
    pub fn fail_at(&mut self, address: u32) {
        self.failing.insert(address);
    }

    /// Undo [`fail_at`](Self::fail_at)
    pub fn heal(&mut self, address: u32) {
        self.failing.remove(&address);
    }

    /// Addresses read so far, in order
    pub fn reads(&self) -> &[u32] {
        &self.reads
    }

    /// Number of reads of `address`
    pub fn read_count(&self, address: u32) -> usize {
        self.reads.iter().filter(|&&a| a == address).count()
    }

    /// `(address, value)` pairs written so far, in order
    pub fn writes(&self) -> &[(u32, u32)] {
        &self.writes
    }

    fn check(&self, address: u32) -> Result<()> {
        if address % 4 != 0 {
            return Err(RegWatchError::TargetUnavailable {
                address,
                message: "unaligned word access".to_string(),
            });
        }
        if self.failing.contains(&address) {
            return Err(RegWatchError::TargetUnavailable {
                address,
                message: "simulated bus fault".to_string(),
            });
        }
        Ok(())
    }
}

impl TargetMemory for MockMemory {
    fn read_word(&mut self, address: u32) -> Result<u32> {
        self.reads.push(address);
        self.check(address)?;
        Ok(self.word(address))
    }

    fn write_word(&mut self, address: u32, value: u32) -> Result<()> {
        self.check(address)?;
        self.writes.push((address, value));
        self.words.insert(address, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_reads_zero() {
        let mut memory = MockMemory::new();
        assert_eq!(memory.read_word(0x2000_0000).unwrap(), 0);
        assert_eq!(memory.read_count(0x2000_0000), 1);
    }

    #[test]
    fn test_write_then_read() {
        let mut memory = MockMemory::new().with_word(0x4002_0000, 0xffff_0000);
        memory.write_word(0x4002_0000, 0x1234).unwrap();
        assert_eq!(memory.read_word(0x4002_0000).unwrap(), 0x1234);
        assert_eq!(memory.writes(), &[(0x4002_0000, 0x1234)]);
    }

    #[test]
    fn test_failure_injection() {
        let mut memory = MockMemory::new();
        memory.fail_at(0x4000_0024);
        let err = memory.read_word(0x4000_0024).unwrap_err();
        assert!(matches!(
            err,
            RegWatchError::TargetUnavailable { address: 0x4000_0024, .. }
        ));
        assert!(memory.write_word(0x4000_0024, 1).is_err());
        memory.heal(0x4000_0024);
        assert!(memory.read_word(0x4000_0024).is_ok());
    }

    #[test]
    fn test_unaligned_access_rejected() {
        let mut memory = MockMemory::new();
        assert!(memory.read_word(0x4000_0002).is_err());
        assert!(memory.writes().is_empty());
    }
}
