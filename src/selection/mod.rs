//! Tri-state selection tree used to author the watch-list
//!
//! The tree mirrors the catalog, three levels deep:
//!
//! ```text
//! [~] GPIOA                 (peripheral: selected iff every register is)
//!     [x] MODER             (register)
//!         [x] MODE0         (field)
//!         [x] MODE1
//!     [ ] ODR
//! ```
//!
//! Nodes live in a flat `Vec` indexed by [`NodeId`] with intrusive
//! parent / first-child / next-sibling links, and are stored in depth-first
//! order so index order is display order.
//!
//! ## Toggle rules
//!
//! - Field: flips itself only.
//! - Register: flips itself and sets every field below it to the same value.
//! - Peripheral: flips itself and sets every register below it to the same
//!   value. Fields are left alone. Deselecting right after a bulk select
//!   restores the register states that were in place before it.
//!
//! After every register or peripheral toggle the owning peripheral's flag is
//! recomputed as the AND over its registers (true when it has none).

pub mod id;

pub use id::NodeId;

use crate::catalog::Device;
use crate::error::{RegWatchError, Result};
use crate::watch::entry::{normalize_alias, validate_alias, WatchEntry};
use crate::watch::store::WatchList;
use std::collections::HashMap;
use std::fmt;

/// Which catalog level a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Peripheral,
    Register,
    Field { bit_offset: u32, bit_width: u32 },
}

/// A single node in the selection tree.
#[derive(Debug, Clone)]
pub struct SelectionNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Full dotted path, e.g. `"GPIOA.MODER.MODE0"`.
    pub name: String,
    /// Leaf segment only, e.g. `"MODE0"`.
    pub short_name: String,
    /// Base address for peripherals, register address otherwise.
    pub address: u32,
    pub description: String,
    pub selected: bool,
    alias: Option<String>,
    /// Parent node (NodeId::INVALID for peripherals).
    pub parent: NodeId,
    pub first_child: NodeId,
    pub next_sibling: NodeId,
}

impl SelectionNode {
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    fn to_entry(&self) -> Result<WatchEntry> {
        let entry = match self.kind {
            NodeKind::Peripheral => {
                return Err(RegWatchError::Selection(format!(
                    "{} is a peripheral and cannot be watched directly",
                    self.name
                )))
            }
            NodeKind::Register => WatchEntry::register(self.name.clone(), self.address),
            NodeKind::Field {
                bit_offset,
                bit_width,
            } => WatchEntry::field(self.name.clone(), self.address, bit_offset, bit_width)?,
        };
        Ok(entry.with_alias(self.alias()))
    }
}

/// What a toggle did, for user feedback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub kind: NodeKind,
    /// Full name of the toggled node
    pub name: String,
    /// The toggled node's new state
    pub selected: bool,
    /// Owning peripheral
    pub peripheral: String,
    /// Whether the owning peripheral is now fully selected
    pub peripheral_selected: bool,
}

impl ToggleOutcome {
    /// True when the toggle left the owning peripheral partially selected
    pub fn is_partial(&self) -> bool {
        !self.peripheral_selected
    }
}

impl fmt::Display for ToggleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.selected { "enabled" } else { "disabled" };
        let report_peripheral = match self.kind {
            NodeKind::Peripheral => true,
            NodeKind::Register => self.selected && self.peripheral_selected,
            NodeKind::Field { .. } => false,
        };
        if report_peripheral {
            write!(f, "{} {}", self.peripheral, state)
        } else {
            write!(f, "{} {}", self.name, state)
        }
    }
}

/// Flat-storage selection tree built from a device catalog.
#[derive(Debug, Default)]
pub struct SelectionTree {
    nodes: Vec<SelectionNode>,
    name_index: HashMap<String, NodeId>,
    /// Seeded entries that no longer resolve in the catalog; kept on save
    orphans: Vec<WatchEntry>,
    /// Register states saved by the most recent bulk peripheral select
    restore: HashMap<NodeId, Vec<bool>>,
}

impl SelectionTree {
    /// Build an all-unselected tree mirroring `device`
    pub fn from_device(device: &Device) -> Result<Self> {
        device.validate()?;
        let mut tree = Self::default();
        for p in &device.peripherals {
            let pid = tree.add_node(
                NodeId::INVALID,
                NodeKind::Peripheral,
                &p.name,
                p.base_address,
                device.description_of(p),
            );
            for r in device.registers_of(p) {
                let address = device.register_address(p, r)?;
                let rid = tree.add_node(pid, NodeKind::Register, &r.name, address, &r.description);
                for field in &r.fields {
                    tree.add_node(
                        rid,
                        NodeKind::Field {
                            bit_offset: field.bit_offset,
                            bit_width: field.bit_width,
                        },
                        &field.name,
                        address,
                        &field.description,
                    );
                }
            }
        }
        tree.reconcile_all();
        tracing::debug!("Built selection tree with {} nodes", tree.nodes.len());
        Ok(tree)
    }

    fn add_node(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        short_name: &str,
        address: u32,
        description: &str,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let name = match self.get(parent) {
            Some(p) => format!("{}.{}", p.name, short_name),
            None => short_name.to_string(),
        };
        self.name_index.insert(name.clone(), id);
        self.nodes.push(SelectionNode {
            id,
            kind,
            name,
            short_name: short_name.to_string(),
            address,
            description: description.to_string(),
            selected: false,
            alias: None,
            parent,
            first_child: NodeId::INVALID,
            next_sibling: NodeId::INVALID,
        });

        if parent.is_valid() {
            let first = self.nodes[parent.index()].first_child;
            if !first.is_valid() {
                self.nodes[parent.index()].first_child = id;
            } else {
                let mut cur = first;
                loop {
                    let next = self.nodes[cur.index()].next_sibling;
                    if !next.is_valid() {
                        self.nodes[cur.index()].next_sibling = id;
                        break;
                    }
                    cur = next;
                }
            }
        }
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&SelectionNode> {
        if id.is_valid() {
            self.nodes.get(id.index())
        } else {
            None
        }
    }

    fn node(&self, id: NodeId) -> Result<&SelectionNode> {
        self.get(id)
            .ok_or_else(|| RegWatchError::Selection(format!("unknown node {}", id)))
    }

    /// Look up by full dotted path
    pub fn find(&self, dotted: &str) -> Option<NodeId> {
        self.name_index.get(dotted).copied()
    }

    /// Like [`find`](Self::find), failing with `NotFound`
    pub fn resolve(&self, dotted: &str) -> Result<NodeId> {
        self.find(dotted)
            .ok_or_else(|| RegWatchError::NotFound(dotted.to_string()))
    }

    /// Iterate over the children of a node
    pub fn children(&self, parent: NodeId) -> ChildIter<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(NodeId::INVALID);
        ChildIter {
            tree: self,
            current: first,
        }
    }

    fn child_ids(&self, parent: NodeId) -> Vec<NodeId> {
        self.children(parent).map(|n| n.id).collect()
    }

    /// Iterate over peripheral nodes in catalog order
    pub fn peripherals(&self) -> impl Iterator<Item = &SelectionNode> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Peripheral)
    }

    /// The peripheral a node belongs to (itself for peripherals)
    pub fn peripheral_of(&self, id: NodeId) -> Option<NodeId> {
        let mut cur = self.get(id)?;
        while cur.kind != NodeKind::Peripheral {
            cur = self.get(cur.parent)?;
        }
        Some(cur.id)
    }

    /// Entries seeded from the watch-list that are not in the catalog
    pub fn orphans(&self) -> &[WatchEntry] {
        &self.orphans
    }

    /// Mark every entry of `list` selected, restoring its alias
    pub fn seed(&mut self, list: &WatchList) {
        for entry in list.entries() {
            let target = self.find(&entry.name).filter(|&id| {
                matches!(
                    (self.nodes[id.index()].kind, entry.is_field()),
                    (NodeKind::Register, false) | (NodeKind::Field { .. }, true)
                )
            });
            match target {
                Some(id) => {
                    let node = &mut self.nodes[id.index()];
                    node.selected = true;
                    node.alias = entry.alias().map(str::to_string);
                }
                None => {
                    tracing::warn!("{} is not in the catalog; keeping it as-is", entry.name);
                    self.orphans.push(entry.clone());
                }
            }
        }
        self.restore.clear();
        self.reconcile_all();
    }

    /// Toggle a node, cascading as described in the module docs
    pub fn toggle(&mut self, id: NodeId) -> Result<ToggleOutcome> {
        let node = self.node(id)?;
        let kind = node.kind;
        let selected = !node.selected;

        match kind {
            NodeKind::Peripheral => {
                let registers = self.child_ids(id);
                if selected {
                    let saved = registers
                        .iter()
                        .map(|r| self.nodes[r.index()].selected)
                        .collect();
                    self.restore.insert(id, saved);
                    self.set_all(&registers, true);
                } else {
                    match self.restore.remove(&id) {
                        Some(saved) if saved.len() == registers.len() => {
                            for (r, was) in registers.iter().zip(saved) {
                                self.nodes[r.index()].selected = was;
                            }
                        }
                        _ => self.set_all(&registers, false),
                    }
                }
                self.nodes[id.index()].selected = selected;
            }
            NodeKind::Register => {
                self.nodes[id.index()].selected = selected;
                let fields = self.child_ids(id);
                self.set_all(&fields, selected);
            }
            NodeKind::Field { .. } => {
                self.nodes[id.index()].selected = selected;
            }
        }

        let peripheral = self
            .peripheral_of(id)
            .ok_or_else(|| RegWatchError::Selection(format!("{} has no peripheral", id)))?;
        if kind == NodeKind::Register {
            self.restore.remove(&peripheral);
        }
        let peripheral_selected = if matches!(kind, NodeKind::Field { .. }) {
            self.nodes[peripheral.index()].selected
        } else {
            self.reconcile_parent(peripheral)?
        };

        // An empty peripheral stays vacuously selected whatever was asked
        let selected = match kind {
            NodeKind::Peripheral => peripheral_selected,
            _ => selected,
        };
        let outcome = ToggleOutcome {
            kind,
            name: self.nodes[id.index()].name.clone(),
            selected,
            peripheral: self.nodes[peripheral.index()].name.clone(),
            peripheral_selected,
        };
        tracing::debug!("{}", outcome);
        Ok(outcome)
    }

    fn set_all(&mut self, ids: &[NodeId], selected: bool) {
        for id in ids {
            self.nodes[id.index()].selected = selected;
        }
    }

    /// Recompute a peripheral's flag from its registers and return it
    ///
    /// Accepts any node and reconciles the peripheral that owns it.
    pub fn reconcile_parent(&mut self, id: NodeId) -> Result<bool> {
        let peripheral = self
            .peripheral_of(id)
            .ok_or_else(|| RegWatchError::Selection(format!("unknown node {}", id)))?;
        let all = self.children(peripheral).all(|r| r.selected);
        self.nodes[peripheral.index()].selected = all;
        Ok(all)
    }

    fn reconcile_all(&mut self) {
        let peripherals: Vec<NodeId> = self.peripherals().map(|p| p.id).collect();
        for p in peripherals {
            let all = self.children(p).all(|r| r.selected);
            self.nodes[p.index()].selected = all;
        }
    }

    /// Set or clear (empty string) the alias of a register or field
    pub fn set_alias(&mut self, id: NodeId, alias: &str) -> Result<()> {
        let node = self.node(id)?;
        if node.kind == NodeKind::Peripheral {
            return Err(RegWatchError::Selection(format!(
                "{} is a peripheral; only registers and fields take an alias",
                node.name
            )));
        }
        let alias = alias.trim();
        validate_alias(alias)?;
        self.nodes[id.index()].alias = normalize_alias(Some(alias));
        Ok(())
    }

    /// Selected registers and fields as watch entries, in tree order
    pub fn selected_entries(&self) -> Result<Vec<WatchEntry>> {
        self.nodes
            .iter()
            .filter(|n| n.selected && n.kind != NodeKind::Peripheral)
            .map(SelectionNode::to_entry)
            .collect()
    }

    /// Build the watch-list to persist: selected entries, then orphans
    pub fn to_watch_list(&self, source: &str) -> Result<WatchList> {
        let mut list = WatchList::new(source);
        for entry in self.selected_entries()? {
            list.push_or_promote(entry)?;
        }
        for entry in &self.orphans {
            list.push_or_promote(entry.clone())?;
        }
        Ok(list)
    }

    fn mark(&self, node: &SelectionNode) -> &'static str {
        if node.selected {
            "[x]"
        } else if node.kind == NodeKind::Peripheral && self.children(node.id).any(|r| r.selected) {
            "[~]"
        } else {
            "[ ]"
        }
    }

    /// Text view of the tree, optionally limited to one peripheral
    pub fn render(&self, peripheral: Option<&str>) -> Result<Vec<String>> {
        let roots: Vec<&SelectionNode> = match peripheral {
            Some(name) => {
                let id = self
                    .find(name)
                    .filter(|&id| self.nodes[id.index()].kind == NodeKind::Peripheral)
                    .ok_or_else(|| RegWatchError::NotFound(format!("peripheral {}", name)))?;
                vec![&self.nodes[id.index()]]
            }
            None => self.peripherals().collect(),
        };

        let mut lines = Vec::new();
        for p in roots {
            lines.push(self.render_line(p, 0));
            for r in self.children(p.id) {
                lines.push(self.render_line(r, 1));
                for f in self.children(r.id) {
                    lines.push(self.render_line(f, 2));
                }
            }
        }
        Ok(lines)
    }

    fn render_line(&self, node: &SelectionNode, depth: usize) -> String {
        let alias = node
            .alias()
            .map(|a| format!(" ({})", a))
            .unwrap_or_default();
        let location = match node.kind {
            NodeKind::Field {
                bit_offset,
                bit_width,
            } => match bit_offset.checked_add(bit_width).and_then(|end| end.checked_sub(1)) {
                Some(msb) => format!("[{}:{}]", msb, bit_offset),
                None => format!("[?:{}]", bit_offset),
            },
            _ => format!("0x{:08x}", node.address),
        };
        let line = format!(
            "{}{} {}{}  {}  {}",
            "    ".repeat(depth),
            self.mark(node),
            node.short_name,
            alias,
            location,
            node.description
        );
        line.trim_end().to_string()
    }
}

/// Iterator over the children of a node.
pub struct ChildIter<'a> {
    tree: &'a SelectionTree,
    current: NodeId,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = &'a SelectionNode;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.current.is_valid() {
            return None;
        }
        let node = &self.tree.nodes[self.current.index()];
        self.current = node.next_sibling;
        Some(node)
    }
}
