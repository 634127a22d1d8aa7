//! Watch-list model and the per-refresh display pipeline
//!
//! - [`entry`]: one watched register or bit-field and its persisted line form
//! - [`store`]: the watch-list file
//! - [`tracker`]: change detection between refreshes
//! - [`layout`]: column-balanced text rendering

pub mod entry;
pub mod layout;
pub mod store;
pub mod tracker;

pub use entry::{EntryKind, WatchEntry, ALIAS_SENTINEL};
pub use layout::{ColumnPlan, LayoutEngine, LayoutItem, Palette};
pub use store::{WatchList, WatchListStore, DEFAULT_WATCH_LIST};
pub use tracker::{ChangeTracker, Observation};
