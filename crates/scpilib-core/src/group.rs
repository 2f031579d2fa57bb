//! Command groups and repeated capabilities.
//!
//! A [`CommandsGroup`] is one node of the mnemonic tree (`CONFigure`,
//! `BLUetooth`, `MEASurement`, ...). A node may declare repeated
//! capabilities: named placeholders such as `<Instance>` that select one of
//! several identical sub-systems. Each declared capability has a current
//! default, initially the library default, which calls through the node use
//! when they do not pass an explicit value.
//!
//! Defaults are looked up on the node first, then up the parent chain. They
//! are stored in atomics read under a shared lock; only adding or cloning
//! nodes takes the tree's write lock.
//!
//! # Example
//!
//! ```
//! use scpilib_core::enums::EnumTable;
//! use scpilib_core::group::{CommandsGroup, RepCap};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum Instance {
//!     Inst1,
//!     Inst2,
//! }
//!
//! static INSTANCE: EnumTable<Instance> =
//!     EnumTable::new("Instance", &[(Instance::Inst1, "1"), (Instance::Inst2, "2")]);
//!
//! let root = CommandsGroup::root("CONFigure");
//! let blu = root
//!     .add_child("BLUetooth<Instance>", vec![RepCap::new("Instance", &INSTANCE, Instance::Inst1).unwrap()])
//!     .unwrap();
//!
//! assert_eq!(blu.resolve_template("CONF:BLU<Instance>:MEAS").unwrap(), "CONF:BLU1:MEAS");
//! blu.set_repcap_default(Instance::Inst2, &INSTANCE).unwrap();
//! assert_eq!(blu.get_repcap_cmd_value(None, &INSTANCE).unwrap(), "2");
//! assert_eq!(blu.get_repcap_cmd_value(Some(Instance::Inst1), &INSTANCE).unwrap(), "1");
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::enums::{EnumTable, EnumTokens};
use crate::error::{Error, Result};

/// Declaration of one repeated capability on a node.
#[derive(Clone, Copy)]
pub struct RepCap {
    placeholder: &'static str,
    table: &'static dyn EnumTokens,
    library_default: usize,
}

impl RepCap {
    /// Declare placeholder `<placeholder>` taking values from `table`, with
    /// `default` as the library default.
    pub fn new<E>(placeholder: &'static str, table: &'static EnumTable<E>, default: E) -> Result<Self>
    where
        E: Copy + PartialEq + Send + Sync,
    {
        let library_default = table.index_of(default).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "default for <{placeholder}> is not in table {}",
                table.name()
            ))
        })?;
        Ok(RepCap {
            placeholder,
            table,
            library_default,
        })
    }

    /// Placeholder name, without the angle brackets.
    pub fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    /// Wire token of the library default.
    pub fn library_default_token(&self) -> &'static str {
        self.table.token_by_index(self.library_default).unwrap_or_default()
    }
}

impl fmt::Debug for RepCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepCap")
            .field("placeholder", &self.placeholder)
            .field("table", &self.table.name())
            .field("library_default", &self.library_default_token())
            .finish()
    }
}

#[derive(Debug)]
struct RepCapSlot {
    decl: RepCap,
    current: AtomicUsize,
}

impl RepCapSlot {
    fn fresh(decl: RepCap) -> Self {
        RepCapSlot {
            current: AtomicUsize::new(decl.library_default),
            decl,
        }
    }

    fn copied(&self) -> Self {
        RepCapSlot {
            decl: self.decl,
            current: AtomicUsize::new(self.current.load(Ordering::Relaxed)),
        }
    }

    fn current_token(&self) -> &'static str {
        let index = self.current.load(Ordering::Relaxed);
        // Indexes only ever come from the slot's own table.
        self.decl.table.token_by_index(index).unwrap_or_default()
    }
}

#[derive(Debug)]
struct Node {
    name: String,
    parent: Option<usize>,
    repcaps: Vec<RepCapSlot>,
    children: Vec<usize>,
}

/// Every node of one command tree, addressed by index.
///
/// Nodes are never removed, so an index stays valid for the life of the
/// tree. Parents and children refer to each other by index, which lets any
/// handle keep its ancestors alive without a reference cycle.
#[derive(Debug)]
struct Tree {
    nodes: RwLock<Vec<Node>>,
}

impl Tree {
    fn read(&self) -> RwLockReadGuard<'_, Vec<Node>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Node>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Append a copy of the subtree at `index` under `parent`; returns the
/// index of the copied node.
fn copy_subtree(nodes: &mut Vec<Node>, index: usize, parent: Option<usize>) -> usize {
    let copy = nodes.len();
    let original = &nodes[index];
    let node = Node {
        name: original.name.clone(),
        parent,
        repcaps: original.repcaps.iter().map(RepCapSlot::copied).collect(),
        children: Vec::new(),
    };
    let children = original.children.clone();
    nodes.push(node);
    for child in children {
        let copied = copy_subtree(nodes, child, Some(copy));
        nodes[copy].children.push(copied);
    }
    copy
}

/// A node of the command tree.
///
/// Every handle co-owns the whole tree: a child kept after its root handle
/// is dropped still resolves its ancestors' repeated capabilities, and a
/// registered child can be looked up again with [`child`](Self::child)
/// after its own handle is gone.
///
/// `Clone` copies the node and its whole subtree. The copy starts with the
/// same repeated-capability defaults and is otherwise independent: it
/// shares the original's parent but changes to either side are not seen by
/// the other.
pub struct CommandsGroup {
    tree: Arc<Tree>,
    index: usize,
}

impl CommandsGroup {
    /// A root node without repeated capabilities.
    pub fn root(name: impl Into<String>) -> Self {
        Self::root_with_repcaps(name, Vec::new())
    }

    /// A root node declaring `repcaps`.
    pub fn root_with_repcaps(name: impl Into<String>, repcaps: Vec<RepCap>) -> Self {
        let root = Node {
            name: name.into(),
            parent: None,
            repcaps: repcaps.into_iter().map(RepCapSlot::fresh).collect(),
            children: Vec::new(),
        };
        CommandsGroup {
            tree: Arc::new(Tree {
                nodes: RwLock::new(vec![root]),
            }),
            index: 0,
        }
    }

    fn handle(&self, index: usize) -> CommandsGroup {
        CommandsGroup {
            tree: Arc::clone(&self.tree),
            index,
        }
    }

    /// Create and register a child node.
    ///
    /// A node may not declare the same placeholder twice.
    pub fn add_child(&self, name: impl Into<String>, repcaps: Vec<RepCap>) -> Result<CommandsGroup> {
        let name = name.into();
        for (i, rc) in repcaps.iter().enumerate() {
            if repcaps[..i].iter().any(|o| o.placeholder == rc.placeholder) {
                return Err(Error::InvalidParameter(format!(
                    "group {name} declares <{}> twice",
                    rc.placeholder
                )));
            }
        }
        let mut nodes = self.tree.write();
        let index = nodes.len();
        nodes.push(Node {
            name,
            parent: Some(self.index),
            repcaps: repcaps.into_iter().map(RepCapSlot::fresh).collect(),
            children: Vec::new(),
        });
        nodes[self.index].children.push(index);
        drop(nodes);
        Ok(self.handle(index))
    }

    /// A shared handle to the first child named `name`.
    pub fn child(&self, name: &str) -> Option<CommandsGroup> {
        let nodes = self.tree.read();
        nodes[self.index]
            .children
            .iter()
            .copied()
            .find(|&c| nodes[c].name == name)
            .map(|index| self.handle(index))
    }

    /// Number of registered children.
    pub fn child_count(&self) -> usize {
        self.tree.read()[self.index].children.len()
    }

    /// This node's mnemonic segment.
    pub fn name(&self) -> String {
        self.tree.read()[self.index].name.clone()
    }

    /// The parent node, if this is not a root.
    pub fn parent(&self) -> Option<CommandsGroup> {
        let parent = self.tree.read()[self.index].parent;
        parent.map(|index| self.handle(index))
    }

    /// Colon-joined mnemonic path from the root. Empty segments are skipped.
    pub fn path(&self) -> String {
        let nodes = self.tree.read();
        let mut names = Vec::new();
        let mut index = Some(self.index);
        while let Some(i) = index {
            let node = &nodes[i];
            if !node.name.is_empty() {
                names.push(node.name.as_str());
            }
            index = node.parent;
        }
        names.reverse();
        names.join(":")
    }

    /// Run `f` on the nearest slot matching `pred`, searching this node and
    /// then its ancestors.
    fn with_slot<R>(
        &self,
        pred: impl Fn(&RepCapSlot) -> bool,
        f: impl FnOnce(&RepCapSlot) -> R,
    ) -> Option<R> {
        let nodes = self.tree.read();
        let mut index = self.index;
        loop {
            let node = &nodes[index];
            if let Some(slot) = node.repcaps.iter().find(|s| pred(*s)) {
                return Some(f(slot));
            }
            index = node.parent?;
        }
    }

    fn with_table_slot<E, R>(
        &self,
        table: &EnumTable<E>,
        f: impl FnOnce(&RepCapSlot) -> R,
    ) -> Result<R> {
        self.with_slot(|s| s.decl.table.name() == table.name(), f)
            .ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "no repeated capability of type {} on {}",
                    table.name(),
                    self.path()
                ))
            })
    }

    /// Wire suffix for a repeated capability: `value` if given, otherwise
    /// the current default of the nearest node declaring it.
    pub fn get_repcap_cmd_value<E: Copy + PartialEq>(
        &self,
        value: Option<E>,
        table: &EnumTable<E>,
    ) -> Result<String> {
        match value {
            Some(v) => Ok(table.token(v)?.to_string()),
            None => self.with_table_slot(table, |s| s.current_token().to_string()),
        }
    }

    /// Change the current default. Visible to every later call through this
    /// node and the nodes below it.
    pub fn set_repcap_default<E: Copy + PartialEq>(&self, value: E, table: &EnumTable<E>) -> Result<()> {
        let index = table.index_of(value).ok_or_else(|| {
            Error::InvalidParameter(format!("enum table {} is missing a variant", table.name()))
        })?;
        self.with_table_slot(table, |s| s.current.store(index, Ordering::Relaxed))
    }

    /// The current default.
    pub fn get_repcap_default<E: Copy + PartialEq>(&self, table: &EnumTable<E>) -> Result<E> {
        let index = self.with_table_slot(table, |s| s.current.load(Ordering::Relaxed))?;
        table.value_at(index).ok_or_else(|| {
            Error::InvalidParameter(format!("repeated capability index {index} outside {}", table.name()))
        })
    }

    /// Return to the library default.
    pub fn reset_repcap_default<E>(&self, table: &EnumTable<E>) -> Result<()> {
        self.with_table_slot(table, |s| {
            s.current.store(s.decl.library_default, Ordering::Relaxed)
        })
    }

    /// Substitute every `<Name>` placeholder in `template` with the current
    /// default of the nearest node declaring it.
    pub fn resolve_template(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find('<') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after.find('>').ok_or_else(|| {
                Error::InvalidParameter(format!("unterminated placeholder in {template:?}"))
            })?;
            let placeholder = &after[..end];
            let token = self
                .with_slot(|s| s.decl.placeholder == placeholder, RepCapSlot::current_token)
                .ok_or_else(|| {
                    Error::InvalidParameter(format!(
                        "unknown placeholder <{placeholder}> in {template:?}"
                    ))
                })?;
            out.push_str(token);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl Clone for CommandsGroup {
    fn clone(&self) -> Self {
        let mut nodes = self.tree.write();
        let parent = nodes[self.index].parent;
        let index = copy_subtree(&mut nodes, self.index, parent);
        drop(nodes);
        self.handle(index)
    }
}

impl fmt::Debug for CommandsGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repcaps: Vec<_> = self.tree.read()[self.index]
            .repcaps
            .iter()
            .map(|s| (s.decl.placeholder, s.current_token()))
            .collect();
        f.debug_struct("CommandsGroup")
            .field("path", &self.path())
            .field("repcaps", &repcaps)
            .finish()
    }
}
