//! The key tree: an arena owning every registry key.
//!
//! Keys are addressed by [`KeyId`]. Every key below a hive root is attached to
//! exactly one parent; the seven hive roots exist from construction and can
//! be neither renamed, moved nor deleted. Mutations notify the listeners of
//! the affected key and then the tree-wide observers, synchronously.

use crate::access::RegistryAccess;
use crate::error::{RegistryError, Result};
use crate::event::{KeyEvent, Listener, ListenerId, Listeners};
use crate::hive::Hive;
use crate::key::{KeyId, KeyNode};
use crate::reaper::Reaper;
use crate::value::{RegistryValue, ValueData};
use crate::value_type::ValueType;
use tracing::{debug, instrument, warn};

/// Arena of registry keys with change notification.
///
/// # Examples
///
/// ```rust
/// use reg_file::{Hive, RegistryTree};
///
/// let mut tree = RegistryTree::new();
/// let key = tree.create_path(r"HKEY_CURRENT_USER\Software\Vendor").unwrap();
/// tree.add_value(key, "Count", 3u32).unwrap();
///
/// assert_eq!(tree.full_path(key).unwrap(), r"HKEY_CURRENT_USER\Software\Vendor");
/// assert_eq!(tree.key(key).unwrap().hive(), Hive::CurrentUser);
/// ```
#[derive(Debug)]
pub struct RegistryTree {
    nodes: Vec<Option<KeyNode>>,
    observers: Listeners,
    next_listener: u64,
    reaper: Reaper,
}

impl Default for RegistryTree {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RegistryError::invalid_operation("key name is empty"));
    }
    if name.contains('\\') {
        return Err(RegistryError::invalid_operation(format!(
            "key name '{}' contains a backslash",
            name
        )));
    }
    Ok(())
}

impl RegistryTree {
    /// Creates a tree holding only the hive roots.
    pub fn new() -> Self {
        let nodes = Hive::ALL
            .iter()
            .map(|hive| Some(KeyNode::hive_root(KeyId::from_raw(hive.ordinal()), *hive)))
            .collect();
        Self {
            nodes,
            observers: Listeners::default(),
            next_listener: 0,
            reaper: Reaper::default(),
        }
    }

    /// Root key of a hive.
    pub fn hive_root(&self, hive: Hive) -> KeyId {
        KeyId::from_raw(hive.ordinal())
    }

    /// Looks up a live key.
    pub fn key(&self, id: KeyId) -> Result<&KeyNode> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| RegistryError::not_found("key", &id.to_string()))
    }

    fn key_mut(&mut self, id: KeyId) -> Result<&mut KeyNode> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| RegistryError::not_found("key", &id.to_string()))
    }

    /// Returns true if the id refers to a live key.
    pub fn contains(&self, id: KeyId) -> bool {
        self.key(id).is_ok()
    }

    /// Number of live keys, hive roots included.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    /// Always false: the hive roots are permanent.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ancestry(&self, id: KeyId) -> Result<Vec<&str>> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.key(cur)?;
            names.push(node.name.as_str());
            current = node.parent;
        }
        names.reverse();
        Ok(names)
    }

    /// Hive name, ancestor names and own name joined by `\`.
    pub fn full_path(&self, id: KeyId) -> Result<String> {
        Ok(self.ancestry(id)?.join("\\"))
    }

    /// Ancestor names strictly between the hive root and the key.
    pub fn branch(&self, id: KeyId) -> Result<String> {
        let names = self.ancestry(id)?;
        if names.len() <= 2 {
            return Ok(String::new());
        }
        Ok(names[1..names.len() - 1].join("\\"))
    }

    /// Returns true if both keys have the same full path, ignoring case.
    pub fn same_key(&self, a: KeyId, b: KeyId) -> bool {
        match (self.full_path(a), self.full_path(b)) {
            (Ok(left), Ok(right)) => left.eq_ignore_ascii_case(&right),
            _ => false,
        }
    }

    /// The key and all its descendants in pre-order.
    pub fn walk(&self, id: KeyId) -> Result<Vec<KeyId>> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self.key(current)?;
            out.push(current);
            let children: Vec<KeyId> = node.subkeys.ids().collect();
            stack.extend(children.into_iter().rev());
        }
        Ok(out)
    }

    fn is_ancestor(&self, ancestor: KeyId, id: KeyId) -> Result<bool> {
        let mut current = self.key(id)?.parent;
        while let Some(cur) = current {
            if cur == ancestor {
                return Ok(true);
            }
            current = self.key(cur)?.parent;
        }
        Ok(false)
    }

    /// Finds a direct child by name, ignoring ASCII case.
    pub fn find_subkey(&self, parent: KeyId, name: &str) -> Option<KeyId> {
        self.key(parent).ok()?.subkeys.find(name)
    }

    /// Finds a key by full path. Hive abbreviations are accepted.
    pub fn find_path(&self, path: &str) -> Option<KeyId> {
        let (hive, names) = Hive::split_path(path).ok()?;
        let mut current = self.hive_root(hive);
        for name in names {
            current = self.find_subkey(current, name)?;
        }
        Some(current)
    }

    /// Opens the named child of `parent`, creating it if needed.
    ///
    /// A new key fires `SubkeyAdded` on the parent.
    pub fn create_subkey(&mut self, parent: KeyId, name: &str) -> Result<KeyId> {
        validate_name(name)?;
        let parent_node = self.key(parent)?;
        if let Some(existing) = parent_node.subkeys.find(name) {
            return Ok(existing);
        }
        let hive = parent_node.hive;

        let id = KeyId::from_raw(self.nodes.len());
        self.nodes
            .push(Some(KeyNode::new(id, name, hive, Some(parent))));
        self.key_mut(parent)?.subkeys.add(id, name);
        debug!(key = %id, name, "created key");

        self.emit(KeyEvent::SubkeyAdded {
            parent,
            subkey: id,
            name: name.to_string(),
        });
        Ok(id)
    }

    /// Opens or creates a direct child of a hive root.
    pub fn create_key(&mut self, hive: Hive, name: &str) -> Result<KeyId> {
        self.create_subkey(self.hive_root(hive), name)
    }

    /// Opens or creates the key at `path`, creating missing ancestors.
    pub fn create_path(&mut self, path: &str) -> Result<KeyId> {
        let (hive, names) = Hive::split_path(path)?;
        let mut current = self.hive_root(hive);
        for name in names {
            current = self.create_subkey(current, name)?;
        }
        Ok(current)
    }

    fn check_attach(&self, parent: KeyId, child: KeyId) -> Result<()> {
        let parent_node = self.key(parent)?;
        let child_node = self.key(child)?;

        if child_node.is_hive_root {
            return Err(RegistryError::invalid_operation(format!(
                "cannot move hive {}",
                child_node.name
            )));
        }
        if parent == child {
            return Err(RegistryError::invalid_operation(
                "cannot add a key as a child of itself",
            ));
        }
        if self.is_ancestor(child, parent)? {
            return Err(RegistryError::invalid_operation(
                "cannot add a key below one of its descendants",
            ));
        }
        if let Some(existing) = parent_node.subkeys.find(&child_node.name) {
            if existing != child {
                return Err(RegistryError::invalid_operation(format!(
                    "a subkey named '{}' already exists",
                    child_node.name
                )));
            }
        }
        Ok(())
    }

    /// Re-parents `child` under `parent`.
    ///
    /// The subtree takes the hive of its new parent. Re-adding a key under its
    /// current parent does nothing.
    pub fn add_key(&mut self, parent: KeyId, child: KeyId) -> Result<()> {
        self.check_attach(parent, child)?;
        let old_parent = self.key(child)?.parent;
        if old_parent == Some(parent) {
            return Ok(());
        }

        if let Some(old) = old_parent {
            self.key_mut(old)?.subkeys.remove(child);
        }
        let hive = self.key(parent)?.hive;
        let name = {
            let node = self.key_mut(child)?;
            node.parent = Some(parent);
            node.name.clone()
        };
        self.key_mut(parent)?.subkeys.add(child, name.as_str());
        for id in self.walk(child)? {
            self.key_mut(id)?.hive = hive;
        }

        self.emit(KeyEvent::SubkeyAdded {
            parent,
            subkey: child,
            name,
        });
        Ok(())
    }

    /// Moves a key under a new parent.
    ///
    /// All checks run before anything changes, so a rejected move leaves the
    /// tree untouched. `Moved` fires before the key is re-parented.
    pub fn move_key(&mut self, id: KeyId, new_parent: KeyId) -> Result<()> {
        self.check_attach(new_parent, id)?;
        let node = self.key(id)?;
        let old_parent = node.parent;
        let old_hive = node.hive;
        if old_parent == Some(new_parent) {
            return Ok(());
        }
        let new_hive = self.key(new_parent)?.hive;

        self.emit(KeyEvent::Moved {
            key: id,
            old_parent,
            new_parent,
            old_hive,
            new_hive,
        });
        self.add_key(new_parent, id)
    }

    /// Renames a key.
    pub fn rename(&mut self, id: KeyId, name: &str) -> Result<()> {
        validate_name(name)?;
        let node = self.key(id)?;
        if node.is_hive_root {
            return Err(RegistryError::invalid_operation(format!(
                "cannot rename hive {}",
                node.name
            )));
        }
        let old_name = node.name.clone();
        if old_name == name {
            return Ok(());
        }
        if let Some(parent) = node.parent {
            if let Some(existing) = self.key(parent)?.subkeys.find(name) {
                if existing != id {
                    return Err(RegistryError::invalid_operation(format!(
                        "a subkey named '{}' already exists",
                        name
                    )));
                }
            }
            self.key_mut(parent)?.subkeys.rename(id, name);
        }
        self.key_mut(id)?.name = name.to_string();

        self.emit(KeyEvent::Renamed {
            key: id,
            old_name,
            new_name: name.to_string(),
        });
        Ok(())
    }

    fn take_subtree(&mut self, id: KeyId) -> Result<Vec<KeyNode>> {
        let ids = self.walk(id)?;
        Ok(ids
            .into_iter()
            .rev()
            .filter_map(|id| self.nodes.get_mut(id.index()).and_then(Option::take))
            .collect())
    }

    fn detach(&mut self, id: KeyId) -> Result<()> {
        if let Some(parent) = self.key(id)?.parent {
            self.key_mut(parent)?.subkeys.remove(id);
        }
        Ok(())
    }

    /// Deletes a key and its subtree.
    ///
    /// `Deleted` fires first. The key is then detached and every id in the
    /// subtree becomes invalid; the nodes are torn down in the background.
    pub fn delete(&mut self, id: KeyId) -> Result<()> {
        let node = self.key(id)?;
        if node.is_hive_root {
            return Err(RegistryError::invalid_operation(format!(
                "cannot delete hive {}",
                node.name
            )));
        }
        let name = node.name.clone();

        self.emit(KeyEvent::Deleted {
            key: id,
            name: name.clone(),
        });
        self.detach(id)?;
        let batch = self.take_subtree(id)?;
        debug!(key = %id, name = name.as_str(), keys = batch.len(), "deleted key");
        self.reaper.submit(batch);
        Ok(())
    }

    /// Deletes `child` if it is a direct subkey of `parent`.
    pub fn delete_subkey(&mut self, parent: KeyId, child: KeyId) -> Result<bool> {
        if !self.key(parent)?.subkeys.contains(child) {
            return Ok(false);
        }
        self.delete(child)?;
        Ok(true)
    }

    /// Drops every subkey without notification.
    pub fn delete_all_subkeys(&mut self, id: KeyId) -> Result<()> {
        let children: Vec<KeyId> = self.key(id)?.subkeys.ids().collect();
        let mut batch = Vec::new();
        for child in children {
            batch.extend(self.take_subtree(child)?);
        }
        self.key_mut(id)?.subkeys.clear();
        self.reaper.submit(batch);
        Ok(())
    }

    /// Drops every value without notification.
    pub fn delete_all_values(&mut self, id: KeyId) -> Result<()> {
        self.key_mut(id)?.values.clear();
        Ok(())
    }

    pub(crate) fn insert_value(&mut self, id: KeyId, value: RegistryValue) -> Result<()> {
        let name = value.name().to_string();
        let value_type = value.value_type();
        self.key_mut(id)?.values.insert(value);
        self.emit(KeyEvent::ValueAdded {
            key: id,
            name,
            value_type,
        });
        Ok(())
    }

    /// Adds a value, replacing any value with the same name.
    ///
    /// ```rust
    /// # use reg_file::{RegistryTree, Hive};
    /// let mut tree = RegistryTree::new();
    /// let key = tree.create_key(Hive::CurrentUser, "Demo").unwrap();
    /// tree.add_value(key, "", "first").unwrap();
    /// tree.add_value(key, "", "second").unwrap();
    /// let default = tree.default_value(key).unwrap();
    /// assert_eq!(default.as_string().unwrap(), "second");
    /// ```
    pub fn add_value(&mut self, id: KeyId, name: &str, data: impl Into<ValueData>) -> Result<()> {
        self.key(id)?;
        let value = RegistryValue::new(id, name, data.into());
        self.insert_value(id, value)
    }

    /// Adds a value from raw bytes of an explicit type.
    ///
    /// # Errors
    ///
    /// `UnsupportedValueType` for types outside the five supported kinds.
    pub fn add_raw_value(
        &mut self,
        id: KeyId,
        name: &str,
        value_type: ValueType,
        raw: Vec<u8>,
    ) -> Result<()> {
        self.key(id)?;
        let value = RegistryValue::from_raw(id, name, value_type, raw)?;
        self.insert_value(id, value)
    }

    /// Replaces the data of an existing value. The type must not change.
    pub fn set_value_data(
        &mut self,
        id: KeyId,
        name: &str,
        data: impl Into<ValueData>,
    ) -> Result<()> {
        let data = data.into();
        self.key_mut(id)?
            .values
            .get_mut(name)
            .ok_or_else(|| RegistryError::not_found("value", name))?
            .set_data(&data)?;
        self.emit(KeyEvent::ValueDataChanged {
            key: id,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Renames a value.
    pub fn rename_value(&mut self, id: KeyId, old_name: &str, new_name: &str) -> Result<()> {
        let values = &mut self.key_mut(id)?.values;
        if !values.contains(old_name) {
            return Err(RegistryError::not_found("value", old_name));
        }
        if old_name == new_name {
            return Ok(());
        }
        if !values.rename(old_name, new_name) {
            return Err(RegistryError::invalid_operation(format!(
                "a value named '{}' already exists",
                new_name
            )));
        }
        self.emit(KeyEvent::ValueRenamed {
            key: id,
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        });
        Ok(())
    }

    /// Reinterprets a Binary value as another type, in place.
    pub fn convert_value(&mut self, id: KeyId, name: &str, target: ValueType) -> Result<()> {
        let slot = self
            .key_mut(id)?
            .values
            .get_mut(name)
            .filter(|value| value.is_set())
            .ok_or_else(|| RegistryError::not_found("value", name))?;
        let converted = match target {
            ValueType::String => slot.to_string_value()?,
            ValueType::Dword => slot.to_dword_value()?,
            ValueType::MultiString => slot.to_multi_string_value()?,
            other => return Err(RegistryError::UnsupportedValueType(other)),
        };
        *slot = converted;
        self.emit(KeyEvent::ValueDataChanged {
            key: id,
            name: name.to_string(),
        });
        Ok(())
    }

    /// A set value by exact name.
    pub fn value(&self, id: KeyId, name: &str) -> Option<&RegistryValue> {
        self.key(id)
            .ok()?
            .values
            .get(name)
            .filter(|value| value.is_set())
    }

    /// The default slot of a key, possibly the unset placeholder.
    pub fn default_value(&self, id: KeyId) -> Result<&RegistryValue> {
        self.key(id)?
            .values
            .default_value()
            .ok_or_else(|| RegistryError::not_found("value", "(default)"))
    }

    /// Removes a set value. The default placeholder cannot be removed.
    pub fn delete_value(&mut self, id: KeyId, name: &str) -> Result<bool> {
        if self.key_mut(id)?.values.remove(name).is_none() {
            return Ok(false);
        }
        self.emit(KeyEvent::ValueDeleted {
            key: id,
            name: name.to_string(),
        });
        Ok(true)
    }

    /// Flags a key to be written as `[-path]`.
    pub fn set_marked_for_deletion(&mut self, id: KeyId, marked: bool) -> Result<()> {
        self.key_mut(id)?.marked_for_deletion = marked;
        Ok(())
    }

    /// Flags a value to be written as `"name"=-`.
    pub fn set_value_marked_for_deletion(
        &mut self,
        id: KeyId,
        name: &str,
        marked: bool,
    ) -> Result<()> {
        self.key_mut(id)?
            .values
            .get_mut(name)
            .filter(|value| value.is_set())
            .ok_or_else(|| RegistryError::not_found("value", name))?
            .set_marked_for_deletion(marked);
        Ok(())
    }

    fn emit(&mut self, event: KeyEvent) {
        if let Some(Some(node)) = self.nodes.get_mut(event.key().index()) {
            node.listeners.emit(&event);
        }
        self.observers.emit(&event);
    }

    fn next_listener_id(&mut self) -> ListenerId {
        self.next_listener += 1;
        ListenerId(self.next_listener)
    }

    /// Registers a listener for events concerning one key.
    pub fn subscribe<F>(&mut self, id: KeyId, listener: F) -> Result<ListenerId>
    where
        F: FnMut(&KeyEvent) + Send + 'static,
    {
        self.key(id)?;
        let listener_id = self.next_listener_id();
        let boxed: Listener = Box::new(listener);
        self.key_mut(id)?.listeners.add(listener_id, boxed);
        Ok(listener_id)
    }

    /// Removes a key listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: KeyId, listener: ListenerId) -> bool {
        self.key_mut(id)
            .map(|node| node.listeners.remove(listener))
            .unwrap_or(false)
    }

    /// Registers a listener for every event in the tree.
    pub fn subscribe_all<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&KeyEvent) + Send + 'static,
    {
        let listener_id = self.next_listener_id();
        self.observers.add(listener_id, Box::new(listener));
        listener_id
    }

    /// Removes a tree-wide listener.
    pub fn unsubscribe_all(&mut self, listener: ListenerId) -> bool {
        self.observers.remove(listener)
    }

    /// Replaces the contents of a key with what the external registry holds.
    ///
    /// `levels` is how many levels of subkeys to read below this one: `0`
    /// reads only this key's children and values, a negative count does
    /// nothing. A denied access ends the pass for that key quietly; whatever
    /// was read before it stays, and the key still counts as populated.
    #[instrument(skip(self, access), fields(key = %id))]
    pub fn read_from_registry(
        &mut self,
        id: KeyId,
        levels: i32,
        access: &dyn RegistryAccess,
    ) -> Result<()> {
        if levels < 0 {
            return Ok(());
        }
        let path = self.full_path(id)?;
        self.delete_all_subkeys(id)?;
        self.delete_all_values(id)?;

        match self.read_level(id, &path, levels, access) {
            Ok(()) => {}
            Err(e) if e.is_access_denied() => {
                debug!(path = path.as_str(), error = %e, "access denied, keeping partial read");
            }
            Err(e) => return Err(e),
        }

        self.key_mut(id)?.populated = true;
        Ok(())
    }

    fn read_level(
        &mut self,
        id: KeyId,
        path: &str,
        levels: i32,
        access: &dyn RegistryAccess,
    ) -> Result<()> {
        for name in access.subkey_names(path)? {
            let child = self.create_subkey(id, &name)?;
            self.read_from_registry(child, levels - 1, access)?;
        }

        for name in access.value_names(path)? {
            let (value_type, raw) = access.get_value(path, &name)?;
            if !value_type.is_supported() {
                warn!(path, name = name.as_str(), value_type = %value_type, "skipping unsupported value");
                continue;
            }
            let value = RegistryValue::from_raw(id, name, value_type, raw)?;
            self.insert_value(id, value)?;
        }
        Ok(())
    }

    /// Writes a key and its subtree to the external registry.
    ///
    /// Keys marked for deletion are removed there; values marked for deletion
    /// are deleted. Deleting something already absent is not an error.
    #[instrument(skip(self, access), fields(key = %id))]
    pub fn import(&self, id: KeyId, access: &mut dyn RegistryAccess) -> Result<()> {
        let node = self.key(id)?;
        let path = self.full_path(id)?;

        if node.marked_for_deletion {
            return match access.delete_subtree(&path) {
                Err(RegistryError::NotFound(_)) | Ok(()) => Ok(()),
                Err(e) => Err(e),
            };
        }

        access.create_key(&path)?;
        for value in node.values.exportable() {
            if value.is_marked_for_deletion() {
                match access.delete_value(&path, value.name()) {
                    Err(RegistryError::NotFound(_)) | Ok(()) => {}
                    Err(e) => return Err(e),
                }
            } else {
                access.set_value(&path, value.name(), value.value_type(), value.raw())?;
            }
        }

        for child in node.subkeys.ids() {
            self.import(child, access)?;
        }
        Ok(())
    }

    /// Deletes a key from the external registry, then from the tree.
    pub fn remove_from_registry(&mut self, id: KeyId, access: &mut dyn RegistryAccess) -> Result<()> {
        let path = self.full_path(id)?;
        access.delete_subtree(&path)?;
        self.delete(id)
    }

    /// Links or unlinks a subtree to the external registry.
    ///
    /// Linking re-reads the whole subtree first.
    pub fn set_linked(&mut self, id: KeyId, linked: bool, access: &dyn RegistryAccess) -> Result<()> {
        if linked {
            self.read_from_registry(id, i32::MAX, access)?;
        }
        for key in self.walk(id)? {
            self.key_mut(key)?.linked = linked;
        }
        Ok(())
    }

    /// Creates the key at `path` and links it to the external registry.
    pub fn open_live(&mut self, path: &str, access: &dyn RegistryAccess) -> Result<KeyId> {
        let id = self.create_path(path)?;
        self.set_linked(id, true, access)?;
        Ok(id)
    }
}
