//! Change detection across refresh cycles
//!
//! The tracker compares each entry's newly formatted value against the string
//! rendered on the previous refresh. Comparison is purely textual, so a
//! switch of numeric base would look like a change on every entry; calling
//! [`ChangeTracker::note_base_changed`] opens a one-refresh suppression window
//! that hides those cosmetic differences.

use std::collections::{HashMap, HashSet};

/// Result of observing one entry's formatted value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Whether the value differs from the previous refresh
    pub changed: bool,
    /// The previously rendered value, if any
    pub previous: Option<String>,
}

/// Last-rendered value per alias plus the base-switch suppression window
#[derive(Debug, Default)]
pub struct ChangeTracker {
    last_formatted: HashMap<String, String>,
    suppress_next_diff: bool,
    /// Aliases already observed inside the current suppression window
    suppressed: HashSet<String>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `formatted` for `alias` and report whether it changed
    pub fn update(&mut self, alias: &str, formatted: &str) -> bool {
        self.observe(alias, formatted).changed
    }

    /// Like [`update`](Self::update), also returning the previous value
    pub fn observe(&mut self, alias: &str, formatted: &str) -> Observation {
        // Each alias gets exactly one suppressed comparison per window.
        let suppressed = self.suppress_next_diff && self.suppressed.insert(alias.to_string());

        let previous = self
            .last_formatted
            .insert(alias.to_string(), formatted.to_string());
        let changed = !suppressed && previous.as_deref().is_some_and(|p| p != formatted);

        Observation { changed, previous }
    }

    /// Suppress change reports on the next refresh (numeric base switched)
    pub fn note_base_changed(&mut self) {
        tracing::debug!("Base changed, suppressing next diff");
        self.suppress_next_diff = true;
        self.suppressed.clear();
    }

    /// Whether a suppression window is currently open
    pub fn is_suppressing(&self) -> bool {
        self.suppress_next_diff
    }

    /// Close the current refresh cycle, consuming any suppression window
    pub fn end_cycle(&mut self) {
        self.suppress_next_diff = false;
        self.suppressed.clear();
    }

    /// Forget an alias (entry removed from the watch-list)
    pub fn forget(&mut self, alias: &str) {
        self.last_formatted.remove(alias);
    }

    /// Last value rendered for an alias
    pub fn last(&self, alias: &str) -> Option<&str> {
        self.last_formatted.get(alias).map(String::as_str)
    }

    /// Number of aliases with history
    pub fn len(&self) -> usize {
        self.last_formatted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_formatted.is_empty()
    }
}
