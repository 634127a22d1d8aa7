//! # regwatch-rs: live peripheral register watch-list
//!
//! Watch memory-mapped registers and bit-fields of an embedded target over
//! SWD/JTAG. A device catalog describes peripherals, registers and fields; a
//! plain-text watch-list names the entries to monitor; each refresh reads the
//! target, formats every value in the selected base, flags changes since the
//! previous refresh and lays the result out as a width-bounded text grid.
//!
//! ## Architecture
//!
//! - **Catalog** ([`catalog`]): read-only peripheral/register/field model
//! - **Watch-list** ([`watch`]): entries, persistence, change tracking, layout
//! - **Selection** ([`selection`]): tri-state tree for authoring the watch-list
//! - **Backend** ([`backend`]): target memory via probe-rs, or a mock
//! - **Session** ([`session`]): the command surface tying it all together
//!
//! ## Example
//!
//! ```ignore
//! use regwatch_rs::{backend::MockMemory, WatchListStore, WatchSession};
//!
//! let mut session = WatchSession::new(WatchListStore::new("registers.txt"));
//! let mut memory = MockMemory::new().with_word(0x4002_0000, 1);
//! for line in session.render(80, &mut memory)? {
//!     println!("{}", line);
//! }
//! ```

pub mod backend;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod selection;
pub mod session;
pub mod types;
pub mod watch;

// Re-export commonly used types
pub use backend::{MockMemory, ProbeMemory, TargetMemory};
pub use catalog::Device;
pub use config::AppConfig;
pub use error::{RegWatchError, Result};
pub use selection::{SelectionTree, ToggleOutcome};
pub use session::WatchSession;
pub use types::{NumericBase, RegisterWidth, ValueShape};
pub use watch::{ChangeTracker, LayoutEngine, WatchEntry, WatchList, WatchListStore};
