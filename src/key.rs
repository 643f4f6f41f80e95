//! Registry key nodes stored in the tree arena.

use crate::collection::{KeyCollection, ValueCollection};
use crate::event::Listeners;
use crate::hive::Hive;
use crate::value::RegistryValue;
use std::fmt;

/// Stable handle to a key in a [`RegistryTree`](crate::RegistryTree).
///
/// Ids are never reused, so a handle to a deleted key stays invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyId(usize);

impl KeyId {
    /// Wraps a raw arena index.
    pub fn from_raw(index: usize) -> Self {
        Self(index)
    }

    /// Raw arena index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A registry key.
///
/// Nodes are owned by the tree arena; relatives are referenced by id.
#[derive(Debug)]
pub struct KeyNode {
    pub(crate) id: KeyId,
    pub(crate) name: String,
    pub(crate) hive: Hive,
    pub(crate) parent: Option<KeyId>,
    pub(crate) subkeys: KeyCollection,
    pub(crate) values: ValueCollection,
    pub(crate) is_hive_root: bool,
    pub(crate) populated: bool,
    pub(crate) marked_for_deletion: bool,
    pub(crate) linked: bool,
    pub(crate) listeners: Listeners,
}

impl KeyNode {
    pub(crate) fn new(id: KeyId, name: impl Into<String>, hive: Hive, parent: Option<KeyId>) -> Self {
        Self {
            id,
            name: name.into(),
            hive,
            parent,
            subkeys: KeyCollection::new(),
            values: ValueCollection::new(id),
            is_hive_root: false,
            populated: false,
            marked_for_deletion: false,
            linked: false,
            listeners: Listeners::default(),
        }
    }

    pub(crate) fn hive_root(id: KeyId, hive: Hive) -> Self {
        Self {
            is_hive_root: true,
            ..Self::new(id, hive.name(), hive, None)
        }
    }

    /// Arena id.
    pub fn id(&self) -> KeyId {
        self.id
    }

    /// Key name. A hive root is named after its hive.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hive the key belongs to.
    pub fn hive(&self) -> Hive {
        self.hive
    }

    /// Parent key, `None` for hive roots.
    pub fn parent(&self) -> Option<KeyId> {
        self.parent
    }

    /// Child keys in insertion order.
    pub fn subkeys(&self) -> &KeyCollection {
        &self.subkeys
    }

    /// Values, including the default placeholder.
    pub fn values(&self) -> &ValueCollection {
        &self.values
    }

    /// Looks up a value by exact name.
    pub fn value(&self, name: &str) -> Option<&RegistryValue> {
        self.values.get(name)
    }

    /// True for the seven predefined roots.
    pub fn is_hive_root(&self) -> bool {
        self.is_hive_root
    }

    /// True once the key has been read from an external registry.
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// True if the key is exported as a deletion.
    pub fn is_marked_for_deletion(&self) -> bool {
        self.marked_for_deletion
    }

    /// True while the key mirrors an external registry.
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Number of listeners registered on this key.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
