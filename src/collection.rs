//! Ordered collections of child keys and values.

use crate::key::KeyId;
use crate::value::RegistryValue;

/// A key reference held by a [`KeyCollection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    /// Arena id of the key.
    pub id: KeyId,
    /// Key name at the time it was added or last renamed.
    pub name: String,
}

/// Ordered set of key ids with case-insensitive lookup by name.
#[derive(Debug, Clone, Default)]
pub struct KeyCollection {
    entries: Vec<KeyEntry>,
}

impl KeyCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a key. Returns false if the id is already present.
    pub fn add(&mut self, id: KeyId, name: impl Into<String>) -> bool {
        if self.contains(id) {
            return false;
        }
        self.entries.push(KeyEntry {
            id,
            name: name.into(),
        });
        true
    }

    /// Removes a key. Returns false if it was not present.
    pub fn remove(&mut self, id: KeyId) -> bool {
        match self.index_of(id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Returns true if the id is present.
    pub fn contains(&self, id: KeyId) -> bool {
        self.index_of(id).is_some()
    }

    /// Position of the id in insertion order.
    pub fn index_of(&self, id: KeyId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    /// Finds a key by name, ignoring ASCII case.
    pub fn find(&self, name: &str) -> Option<KeyId> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
            .map(|entry| entry.id)
    }

    /// Updates the stored name of a key.
    pub fn rename(&mut self, id: KeyId, name: impl Into<String>) -> bool {
        match self.entries.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => {
                entry.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = KeyId> + '_ {
        self.entries.iter().map(|entry| entry.id)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, KeyEntry> {
        self.entries.iter()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the collection holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<'a> IntoIterator for &'a KeyCollection {
    type Item = &'a KeyEntry;
    type IntoIter = std::slice::Iter<'a, KeyEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Ordered values of one key.
///
/// The collection always holds exactly one default (unnamed) entry. Until a
/// default value is set, that entry is an unset placeholder that is skipped
/// by [`ValueCollection::exportable`].
#[derive(Debug, Clone)]
pub struct ValueCollection {
    parent: KeyId,
    values: Vec<RegistryValue>,
}

impl ValueCollection {
    /// Creates a collection holding only the default placeholder.
    pub fn new(parent: KeyId) -> Self {
        Self {
            parent,
            values: vec![RegistryValue::placeholder(parent)],
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.values.iter().position(|value| value.name() == name)
    }

    /// Adds a value, replacing any value with the same name.
    ///
    /// The new value goes to the end. Returns the replaced value if it was set.
    pub fn insert(&mut self, mut value: RegistryValue) -> Option<RegistryValue> {
        value.set_parent(self.parent);
        let replaced = self
            .position(value.name())
            .map(|index| self.values.remove(index));
        self.values.push(value);
        replaced.filter(RegistryValue::is_set)
    }

    /// Looks up a value by exact name.
    pub fn get(&self, name: &str) -> Option<&RegistryValue> {
        self.values.iter().find(|value| value.name() == name)
    }

    /// Looks up a value by exact name for modification.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut RegistryValue> {
        self.values.iter_mut().find(|value| value.name() == name)
    }

    /// Returns true if a set value has this name.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).map_or(false, RegistryValue::is_set)
    }

    /// The default slot, set or not.
    pub fn default_value(&self) -> Option<&RegistryValue> {
        self.get("")
    }

    /// Removes a set value.
    ///
    /// Removing the default value puts the placeholder back in its slot.
    /// Returns `None` if no set value has this name.
    pub fn remove(&mut self, name: &str) -> Option<RegistryValue> {
        let index = self.position(name)?;
        if !self.values[index].is_set() {
            return None;
        }
        if name.is_empty() {
            let placeholder = RegistryValue::placeholder(self.parent);
            Some(std::mem::replace(&mut self.values[index], placeholder))
        } else {
            Some(self.values.remove(index))
        }
    }

    /// Renames a value in place.
    ///
    /// Returns false if `old` is missing or `new` is already taken.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        if old == new {
            return self.contains(old);
        }
        if self.contains(new) || !self.contains(old) {
            return false;
        }
        if let Some(index) = self.position(new) {
            // unset placeholder holding the target name
            self.values.remove(index);
        }
        let renamed = match self.get_mut(old) {
            Some(value) => {
                value.set_name(new);
                true
            }
            None => false,
        };
        self.ensure_default();
        renamed
    }

    /// Drops every value, leaving only the default placeholder.
    pub fn clear(&mut self) {
        self.values.clear();
        self.values.push(RegistryValue::placeholder(self.parent));
    }

    fn ensure_default(&mut self) {
        if self.position("").is_none() {
            self.values.insert(0, RegistryValue::placeholder(self.parent));
        }
    }

    /// All values including the placeholder, in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, RegistryValue> {
        self.values.iter()
    }

    /// Set values in insertion order.
    pub fn exportable(&self) -> impl Iterator<Item = &RegistryValue> + '_ {
        self.values.iter().filter(|value| value.is_set())
    }

    /// Number of set values.
    pub fn len(&self) -> usize {
        self.exportable().count()
    }

    /// Returns true if no value is set.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn set_parent(&mut self, parent: KeyId) {
        self.parent = parent;
        for value in &mut self.values {
            value.set_parent(parent);
        }
    }
}
