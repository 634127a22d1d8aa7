//! Watch-list persistence
//!
//! The watch-list is a plain text file. The first line names the catalog the
//! entries were resolved against; every following non-blank line is one
//! [`WatchEntry`]:
//!
//! ```text
//! chip.json
//! GPIOA.MODER _ 0x40020000
//! GPIOA.MODER.MODE0 m0 0x40020000 0 2
//! ```
//!
//! Structural edits rewrite the file wholesale, except a plain `add`, which
//! appends one line.

use super::entry::{WatchEntry, ALIAS_SENTINEL};
use crate::error::{RegWatchError, Result, ResultExt};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default watch-list filename
pub const DEFAULT_WATCH_LIST: &str = "registers.txt";

/// In-memory watch-list: catalog source plus ordered entries
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WatchList {
    /// Catalog source identifier (first line of the file)
    pub source: String,
    entries: Vec<WatchEntry>,
}

impl WatchList {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[WatchEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an entry by its display alias
    pub fn by_alias(&self, alias: &str) -> Option<&WatchEntry> {
        self.entries.iter().find(|e| e.display_name() == alias)
    }

    /// Find an entry by display alias, falling back to its catalog name
    pub fn find(&self, alias_or_name: &str) -> Option<&WatchEntry> {
        self.by_alias(alias_or_name)
            .or_else(|| self.entries.iter().find(|e| e.name == alias_or_name))
    }

    /// Append an entry; its display alias must be unique
    pub fn push(&mut self, entry: WatchEntry) -> Result<()> {
        if self.by_alias(entry.display_name()).is_some() {
            return Err(RegWatchError::Duplicate(entry.display_name().to_string()));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Append an entry, renaming it to its full dotted name on alias collision
    pub fn push_or_promote(&mut self, entry: WatchEntry) -> Result<()> {
        if self.by_alias(entry.display_name()).is_none() {
            return self.push(entry);
        }
        tracing::warn!(
            "Alias '{}' is used more than once; showing {} under its full name",
            entry.display_name(),
            entry.name
        );
        let full = entry.name.clone();
        self.push(entry.with_alias(Some(&full)))
    }

    /// Remove the entry with the given alias or catalog name
    pub fn remove(&mut self, alias_or_name: &str) -> Option<WatchEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.display_name() == alias_or_name)
            .or_else(|| self.entries.iter().position(|e| e.name == alias_or_name))?;
        Some(self.entries.remove(index))
    }

    /// Parse the persisted text form
    ///
    /// Later entries whose display alias collides with an earlier one get
    /// their full dotted name as alias so every entry stays addressable.
    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = content.lines().enumerate();
        let source = loop {
            match lines.next() {
                Some((_, line)) if line.trim().is_empty() => continue,
                Some((_, line)) => break line.trim().to_string(),
                None => return Err(RegWatchError::format(1, "missing catalog source line")),
            }
        };

        let mut list = WatchList::new(source);
        for (index, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            list.push_or_promote(WatchEntry::parse_line(line, index + 1)?)?;
        }
        Ok(list)
    }

    /// Serialize to the persisted text form
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(64 * (self.entries.len() + 1));
        out.push_str(&self.source);
        out.push('\n');
        for entry in &self.entries {
            out.push_str(&entry.to_line());
            out.push('\n');
        }
        out
    }
}

/// Does a persisted line refer to `key` by catalog name or explicit alias?
fn line_matches(tokens: &[&str], key: &str) -> bool {
    tokens.len() >= 2 && (tokens[0] == key || tokens[1] == key)
}

/// Does a persisted line display as `key` through the leaf-name fallback?
fn line_matches_leaf(tokens: &[&str], key: &str) -> bool {
    tokens.len() >= 2
        && tokens[1] == ALIAS_SENTINEL
        && tokens[0].rsplit('.').next() == Some(key)
}

/// File-backed watch-list
#[derive(Debug, Clone)]
pub struct WatchListStore {
    path: PathBuf,
}

impl Default for WatchListStore {
    fn default() -> Self {
        Self::new(DEFAULT_WATCH_LIST)
    }
}

impl WatchListStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Resolve the catalog source relative to the watch-list's directory
    pub fn resolve_source(&self, source: &str) -> PathBuf {
        let source = Path::new(source);
        if source.is_absolute() {
            return source.to_path_buf();
        }
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(source),
            _ => source.to_path_buf(),
        }
    }

    fn read(&self) -> Result<String> {
        if !self.exists() {
            return Err(RegWatchError::MissingFile(self.path.clone()));
        }
        std::fs::read_to_string(&self.path)
            .map_err(RegWatchError::from)
            .with_context(|| format!("Failed to read {}", self.path.display()))
    }

    fn write(&self, content: &str) -> Result<()> {
        std::fs::write(&self.path, content)
            .map_err(RegWatchError::from)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Load and parse the watch-list
    pub fn load(&self) -> Result<WatchList> {
        let list = WatchList::parse(&self.read()?)?;
        tracing::trace!("Loaded {} watch entries from {}", list.len(), self.path.display());
        Ok(list)
    }

    /// Rewrite the whole file from `list`
    pub fn save(&self, list: &WatchList) -> Result<()> {
        self.write(&list.to_text())?;
        tracing::info!("Saved {} watch entries to {}", list.len(), self.path.display());
        Ok(())
    }

    /// Start a fresh watch-list naming `source` as its catalog
    pub fn create(&self, source: &str) -> Result<WatchList> {
        let list = WatchList::new(source);
        self.save(&list)?;
        Ok(list)
    }

    /// Append one entry, rejecting alias collisions
    pub fn add(&self, entry: &WatchEntry) -> Result<()> {
        let content = self.read()?;
        let list = WatchList::parse(&content)?;
        if list.by_alias(entry.display_name()).is_some() {
            return Err(RegWatchError::Duplicate(entry.display_name().to_string()));
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(RegWatchError::from)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        if !content.ends_with('\n') {
            writeln!(file)?;
        }
        writeln!(file, "{}", entry.to_line())?;

        tracing::debug!("Added {} to {}", entry.name, self.path.display());
        Ok(())
    }

    /// Drop the line(s) naming `key` as catalog name or alias
    ///
    /// The first (catalog source) line is always preserved. If no line names
    /// `key` directly, an unaliased entry whose leaf name is `key` matches.
    /// Returns the number of lines removed.
    pub fn remove(&self, key: &str) -> Result<usize> {
        let content = self.read()?;
        let lines: Vec<&str> = content.lines().collect();
        let Some((first, rest)) = lines.split_first() else {
            return Err(RegWatchError::NotFound(format!("watch entry {}", key)));
        };

        let tokenized: Vec<Vec<&str>> = rest.iter().map(|l| l.split_whitespace().collect()).collect();
        let mut drop: Vec<bool> = tokenized.iter().map(|t| line_matches(t, key)).collect();
        if !drop.contains(&true) {
            drop = tokenized.iter().map(|t| line_matches_leaf(t, key)).collect();
        }
        let removed = drop.iter().filter(|&&d| d).count();
        if removed == 0 {
            return Err(RegWatchError::NotFound(format!("watch entry {}", key)));
        }

        let mut out = String::with_capacity(content.len());
        out.push_str(first);
        out.push('\n');
        for (line, dropped) in rest.iter().zip(drop) {
            if !dropped {
                out.push_str(line);
                out.push('\n');
            }
        }
        self.write(&out)?;

        tracing::debug!("Removed {} line(s) matching {} from {}", removed, key, self.path.display());
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "chip.json\n\
        GPIOA.MODER _ 0x40020000\n\
        \n\
        GPIOA.MODER.MODE0 m0 0x40020000 0 2\n\
        TIM2.CNT counter 0x40000024\n";

    fn store_with(content: &str) -> (tempfile::TempDir, WatchListStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_WATCH_LIST);
        std::fs::write(&path, content).unwrap();
        (dir, WatchListStore::new(path))
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let list = WatchList::parse(SAMPLE).unwrap();
        assert_eq!(list.source, "chip.json");
        assert_eq!(list.len(), 3);
        assert_eq!(list.entries()[1].display_name(), "m0");
    }

    #[test]
    fn test_parse_reports_line_number() {
        let err = WatchList::parse("chip.json\nA.B _ 0x0\nA.B.C oops\n").unwrap_err();
        assert!(matches!(err, RegWatchError::Format { line: 3, .. }));
    }

    #[test]
    fn test_parse_empty_file() {
        assert!(matches!(
            WatchList::parse("\n\n"),
            Err(RegWatchError::Format { line: 1, .. })
        ));
    }

    #[test]
    fn test_parse_promotes_colliding_aliases() {
        let list =
            WatchList::parse("chip.json\nGPIOA.MODER _ 0x40020000\nGPIOB.MODER _ 0x40020400\n")
                .unwrap();
        assert_eq!(list.entries()[0].display_name(), "MODER");
        assert_eq!(list.entries()[1].display_name(), "GPIOB.MODER");
    }

    #[test]
    fn test_text_round_trip() {
        let list = WatchList::parse(SAMPLE).unwrap();
        let reparsed = WatchList::parse(&list.to_text()).unwrap();
        assert_eq!(list, reparsed);
        assert!(!list.to_text().contains("\n\n"));
    }

    #[test]
    fn test_push_rejects_duplicate_alias() {
        let mut list = WatchList::parse(SAMPLE).unwrap();
        let err = list
            .push(WatchEntry::register("GPIOB.ODR", 0x4002_0414).with_alias(Some("m0")))
            .unwrap_err();
        assert!(matches!(err, RegWatchError::Duplicate(ref a) if a == "m0"));
    }

    #[test]
    fn test_list_find_and_remove() {
        let mut list = WatchList::parse(SAMPLE).unwrap();
        assert!(list.find("GPIOA.MODER.MODE0").is_some());
        assert!(list.find("counter").is_some());
        assert_eq!(list.remove("MODER").unwrap().name, "GPIOA.MODER");
        assert!(list.remove("MODER").is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = WatchListStore::new(dir.path().join("absent.txt"));
        assert!(matches!(store.load(), Err(RegWatchError::MissingFile(_))));
    }

    #[test]
    fn test_add_appends_line() {
        let (_dir, store) = store_with("chip.json\nGPIOA.MODER _ 0x40020000");
        store
            .add(&WatchEntry::register("GPIOA.ODR", 0x4002_0014))
            .unwrap();
        let text = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            text,
            "chip.json\nGPIOA.MODER _ 0x40020000\nGPIOA.ODR _ 0x40020014\n"
        );
    }

    #[test]
    fn test_add_duplicate_leaves_file_untouched() {
        let (_dir, store) = store_with(SAMPLE);
        let err = store
            .add(&WatchEntry::register("GPIOB.CNT", 0x4000_0424).with_alias(Some("counter")))
            .unwrap_err();
        assert!(matches!(err, RegWatchError::Duplicate(_)));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), SAMPLE);
    }

    #[test]
    fn test_remove_by_name_keeps_source_line() {
        let (_dir, store) = store_with(SAMPLE);
        assert_eq!(store.remove("GPIOA.MODER").unwrap(), 1);
        let list = store.load().unwrap();
        assert_eq!(list.source, "chip.json");
        let names: Vec<_> = list.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["GPIOA.MODER.MODE0", "TIM2.CNT"]);
    }

    #[test]
    fn test_remove_by_alias() {
        let (_dir, store) = store_with(SAMPLE);
        assert_eq!(store.remove("counter").unwrap(), 1);
        assert!(store.load().unwrap().find("TIM2.CNT").is_none());
    }

    #[test]
    fn test_remove_by_leaf_name() {
        let (_dir, store) = store_with(SAMPLE);
        assert_eq!(store.remove("MODER").unwrap(), 1);
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn test_remove_never_touches_source_line() {
        let (_dir, store) = store_with("chip.json\nchip.json _ 0x0\n");
        assert_eq!(store.remove("chip.json").unwrap(), 1);
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "chip.json\n");
    }

    #[test]
    fn test_remove_unknown_is_not_found() {
        let (_dir, store) = store_with(SAMPLE);
        assert!(matches!(store.remove("NOPE"), Err(RegWatchError::NotFound(_))));
    }

    #[test]
    fn test_resolve_source_relative_to_list() {
        let store = WatchListStore::new("/tmp/project/registers.txt");
        assert_eq!(
            store.resolve_source("chip.json"),
            PathBuf::from("/tmp/project/chip.json")
        );
        assert_eq!(
            WatchListStore::new("registers.txt").resolve_source("chip.json"),
            PathBuf::from("chip.json")
        );
    }
}
