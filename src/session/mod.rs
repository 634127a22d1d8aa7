//! Watch session: the command surface and the refresh pipeline
//!
//! A [`WatchSession`] owns everything that persists between refreshes: the
//! numeric base, the change-log toggle, the [`ChangeTracker`] and the lazily
//! loaded catalog. The watch-list file itself is re-read on every refresh so
//! edits made by another `regwatch` invocation show up immediately.
//!
//! One refresh:
//!
//! ```text
//! watch-list ──► read each register word once ──► format per entry
//!            ──► ChangeTracker ──► LayoutEngine ──► display lines
//! ```
//!
//! A register that cannot be read is shown as [`UNAVAILABLE`] and its entries
//! lose their change history, so the first value read after the outage is a
//! fresh observation. The rest of the display still renders.

use crate::backend::TargetMemory;
use crate::catalog::Device;
use crate::error::{RegWatchError, Result};
use crate::selection::{SelectionTree, ToggleOutcome};
use crate::types::NumericBase;
use crate::watch::entry::{validate_alias, WatchEntry};
use crate::watch::layout::{LayoutEngine, LayoutItem, Palette};
use crate::watch::store::{WatchList, WatchListStore};
use crate::watch::tracker::ChangeTracker;
use std::collections::HashMap;
use std::path::PathBuf;

/// Placeholder shown for a register that could not be read
pub const UNAVAILABLE: &str = "<unavailable>";

/// State carried across refreshes of one watch-list
pub struct WatchSession {
    store: WatchListStore,
    base: NumericBase,
    show_changes: bool,
    tracker: ChangeTracker,
    palette: Palette,
    height_hint: Option<usize>,
    /// Catalog source used when `add_entry` has to create the watch-list
    default_source: Option<String>,
    catalog: Option<(PathBuf, Device)>,
}

impl WatchSession {
    pub fn new(store: WatchListStore) -> Self {
        Self {
            store,
            base: NumericBase::default(),
            show_changes: false,
            tracker: ChangeTracker::new(),
            palette: Palette::default(),
            height_hint: None,
            default_source: None,
            catalog: None,
        }
    }

    pub fn with_base(mut self, base: NumericBase) -> Self {
        self.base = base;
        self
    }

    pub fn with_show_changes(mut self, show: bool) -> Self {
        self.show_changes = show;
        self
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_height_hint(mut self, height: Option<usize>) -> Self {
        self.height_hint = height;
        self
    }

    /// Catalog named in a newly created watch-list
    pub fn with_default_source(mut self, source: impl Into<String>) -> Self {
        self.default_source = Some(source.into());
        self
    }

    pub fn store(&self) -> &WatchListStore {
        &self.store
    }

    pub fn base(&self) -> NumericBase {
        self.base
    }

    pub fn show_changes(&self) -> bool {
        self.show_changes
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Switch the numeric base; returns whether it actually changed
    pub fn set_base(&mut self, base: NumericBase) -> bool {
        if base == self.base {
            return false;
        }
        tracing::debug!("Numeric base {} -> {}", self.base, base);
        self.base = base;
        self.tracker.note_base_changed();
        true
    }

    /// Flip the change-log footer; returns the new state
    pub fn toggle_show_changes(&mut self) -> bool {
        self.show_changes = !self.show_changes;
        self.show_changes
    }

    /// The catalog named by `source`, loading it on first use or when it changes
    fn catalog(&mut self, source: &str) -> Result<&Device> {
        let path = self.store.resolve_source(source);
        let stale = self
            .catalog
            .as_ref()
            .map_or(true, |(loaded, _)| *loaded != path);
        if stale {
            let device = Device::load(&path)?;
            tracing::info!("Loaded catalog {} ({})", path.display(), device.name);
            self.catalog = Some((path, device));
        }
        match self.catalog {
            Some((_, ref device)) => Ok(device),
            None => Err(RegWatchError::Config(format!("catalog {} not loaded", source))),
        }
    }

    fn load_or_create(&self) -> Result<WatchList> {
        if self.store.exists() {
            return self.store.load();
        }
        match self.default_source {
            Some(ref source) => {
                tracing::info!("Creating {}", self.store.path().display());
                self.store.create(source)
            }
            None => Err(RegWatchError::MissingFile(self.store.path().to_path_buf())),
        }
    }

    /// Resolve `dotted` in the catalog and append it to the watch-list
    pub fn add_entry(&mut self, dotted: &str, alias: Option<&str>) -> Result<WatchEntry> {
        if let Some(alias) = alias {
            validate_alias(alias.trim())?;
        }
        let list = self.load_or_create()?;
        let entry = WatchEntry::resolve(dotted, self.catalog(&list.source)?)?.with_alias(alias);
        self.store.add(&entry)?;
        tracing::info!("Watching {} as {}", entry.name, entry.display_name());
        Ok(entry)
    }

    /// Drop entries named `key`; returns how many lines were removed
    pub fn remove_entry(&mut self, key: &str) -> Result<usize> {
        let before = self.store.load()?;
        let removed = self.store.remove(key)?;
        let after = self.store.load()?;
        for entry in before.entries() {
            if after.by_alias(entry.display_name()).is_none() {
                self.tracker.forget(entry.display_name());
            }
        }
        tracing::info!("Removed {} from the watch-list", key);
        Ok(removed)
    }

    /// Write `value` to the entry shown as `alias`; returns the word written
    ///
    /// Field entries read the register first and only replace their bits.
    pub fn set_value(
        &mut self,
        alias: &str,
        value: u64,
        memory: &mut dyn TargetMemory,
    ) -> Result<u32> {
        let list = self.store.load()?;
        let entry = list
            .find(alias)
            .ok_or_else(|| RegWatchError::NotFound(format!("watch entry {}", alias)))?;

        let current = if entry.needs_read_for_write() {
            memory.read_word(entry.address)?
        } else {
            0
        };
        let word = entry.word_for_write(current, value)?;
        memory.write_word(entry.address, word)?;

        tracing::info!(
            "Wrote 0x{:08x} to {} ({})",
            word,
            entry.name,
            entry.address_literal()
        );
        Ok(word)
    }

    /// Read, format and diff every entry without laying them out
    pub fn refresh(&mut self, memory: &mut dyn TargetMemory) -> Result<Vec<LayoutItem>> {
        let list = self.store.load()?;
        let items = self.collect_items(&list, memory);
        self.tracker.end_cycle();
        items
    }

    fn collect_items(
        &mut self,
        list: &WatchList,
        memory: &mut dyn TargetMemory,
    ) -> Result<Vec<LayoutItem>> {
        let mut words: HashMap<u32, Option<u32>> = HashMap::new();
        let mut items = Vec::with_capacity(list.len());

        for entry in list.entries() {
            let word = *words.entry(entry.address).or_insert_with(|| {
                match memory.read_word(entry.address) {
                    Ok(word) => Some(word),
                    Err(e) => {
                        tracing::warn!("{}: {}", entry.name, e);
                        None
                    }
                }
            });

            let label = entry.display_name();
            let item = match word {
                Some(raw) => {
                    let formatted = entry.format_word(raw, self.base)?;
                    let observation = self.tracker.observe(label, &formatted);
                    LayoutItem::new(label, formatted, observation.changed)
                        .with_previous(observation.previous)
                }
                None => {
                    self.tracker.forget(label);
                    LayoutItem::new(label, UNAVAILABLE, false)
                }
            };
            items.push(item);
        }

        tracing::trace!("Refreshed {} entries from {} reads", items.len(), words.len());
        Ok(items)
    }

    /// One refresh rendered to display lines of at most `width` columns
    pub fn render(&mut self, width: usize, memory: &mut dyn TargetMemory) -> Result<Vec<String>> {
        let items = self.refresh(memory)?;
        let engine = LayoutEngine::new()
            .with_palette(self.palette)
            .with_show_changes(self.show_changes)
            .with_height_hint(self.height_hint);
        Ok(engine.render(&items, width))
    }

    /// Selection tree over the catalog, seeded from the watch-list
    fn selection(&mut self) -> Result<(WatchList, SelectionTree)> {
        let list = self.store.load()?;
        let mut tree = SelectionTree::from_device(self.catalog(&list.source)?)?;
        tree.seed(&list);
        Ok((list, tree))
    }

    /// Catalog tree with selection marks, optionally for one peripheral
    pub fn render_catalog_tree(&mut self, peripheral: Option<&str>) -> Result<Vec<String>> {
        let (_, tree) = self.selection()?;
        tree.render(peripheral)
    }

    /// Toggle catalog nodes and save the resulting watch-list
    pub fn select(&mut self, names: &[&str]) -> Result<Vec<ToggleOutcome>> {
        let (list, mut tree) = self.selection()?;
        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            let id = tree.resolve(name)?;
            outcomes.push(tree.toggle(id)?);
        }
        self.store.save(&tree.to_watch_list(&list.source)?)?;
        Ok(outcomes)
    }

    /// Set (or clear, with an empty string) the alias of a watched node
    pub fn set_alias(&mut self, dotted: &str, alias: &str) -> Result<()> {
        let (list, mut tree) = self.selection()?;
        let id = tree.resolve(dotted)?;

        let selected = tree.get(id).is_some_and(|n| n.selected);
        if !selected {
            return Err(RegWatchError::Selection(format!(
                "{} is not in the watch-list",
                dotted
            )));
        }
        let alias = alias.trim();
        if let Some(other) = list.by_alias(alias) {
            if other.name != dotted {
                return Err(RegWatchError::Duplicate(alias.to_string()));
            }
        }

        tree.set_alias(id, alias)?;
        self.store.save(&tree.to_watch_list(&list.source)?)?;
        Ok(())
    }
}
