//! Target memory backends
//!
//! The watch session reads and writes registers through the
//! [`TargetMemory`] trait:
//!
//! - [`ProbeMemory`]: a live target behind a probe-rs debug probe
//! - [`MockMemory`]: a sparse in-memory word map for tests and demos

pub mod memory;
pub mod mock_memory;
pub mod probe;

pub use memory::TargetMemory;
#[cfg(test)]
pub use memory::MockTargetMemory;
pub use mock_memory::MockMemory;
pub use probe::{ProbeInfo, ProbeMemory, ProbeStats};
