//! Word-level access to target memory
//!
//! Everything the watch session needs from a live target is reading and
//! writing aligned 32-bit words. Both the probe-rs backend and the in-memory
//! mock implement this trait, so the session can be driven without hardware.

use crate::error::Result;

/// Read/write aligned 32-bit words on the target
///
/// Implementations report every access failure as
/// [`RegWatchError::TargetUnavailable`](crate::error::RegWatchError::TargetUnavailable)
/// naming the address.
#[cfg_attr(test, mockall::automock)]
pub trait TargetMemory {
    /// Read the word at `address`
    fn read_word(&mut self, address: u32) -> Result<u32>;

    /// Write `value` to the word at `address`
    fn write_word(&mut self, address: u32, value: u32) -> Result<()>;
}

impl<T: TargetMemory + ?Sized> TargetMemory for Box<T> {
    fn read_word(&mut self, address: u32) -> Result<u32> {
        (**self).read_word(address)
    }

    fn write_word(&mut self, address: u32, value: u32) -> Result<()> {
        (**self).write_word(address, value)
    }
}
