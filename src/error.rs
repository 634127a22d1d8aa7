//! Error handling for regwatch-rs
//!
//! This module defines the error taxonomy shared by the codec, the watch-list
//! store, the selection tree and the target memory backends, plus a Result
//! alias for use throughout the crate.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for regwatch-rs operations
#[derive(Error, Debug)]
pub enum RegWatchError {
    /// A persisted watch-list line could not be parsed
    #[error("Malformed watch-list line {line}: {message}")]
    Format { line: usize, message: String },

    /// A dotted name does not resolve in the device catalog
    #[error("Not found: {0}")]
    NotFound(String),

    /// An alias is already present in the watch-list
    #[error("Duplicate alias: {0}")]
    Duplicate(String),

    /// Bit-field offset/width or a written value is out of bounds
    #[error("Out of range: {0}")]
    Range(String),

    /// A numeric literal could not be parsed
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Live memory read or write failed
    #[error("Target unavailable at address 0x{address:08x}: {message}")]
    TargetUnavailable { address: u32, message: String },

    /// The watch-list file does not exist
    #[error("Watch-list {} not found; create it with `regwatch init <catalog>`", .0.display())]
    MissingFile(PathBuf),

    /// An edit was attempted on a node that does not support it
    #[error("Selection error: {0}")]
    Selection(String),

    /// Errors related to configuration or catalog loading
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to probe/SWD operations
    #[error("Probe error: {0}")]
    Probe(#[from] probe_rs::Error),

    /// Errors related to debug probe operations
    #[error("Debug probe error: {0}")]
    DebugProbe(#[from] probe_rs::probe::DebugProbeError),

    /// Errors related to target registry
    #[error("Registry error: {0}")]
    Registry(#[from] probe_rs::config::RegistryError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<RegWatchError>,
    },
}

impl RegWatchError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        RegWatchError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a format error for the given 1-based line number
    pub fn format(line: usize, message: impl Into<String>) -> Self {
        RegWatchError::Format {
            line,
            message: message.into(),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &RegWatchError {
        match self {
            RegWatchError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for regwatch-rs operations
pub type Result<T> = std::result::Result<T, RegWatchError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
