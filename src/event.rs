//! Change notifications raised by the key tree.
//!
//! Listeners are plain closures registered on a [`RegistryTree`](crate::RegistryTree),
//! either for one key or for the whole tree. They run synchronously on the
//! thread that performed the mutation, before the mutating call returns.

use crate::hive::Hive;
use crate::key::KeyId;
use crate::value_type::ValueType;

/// A change to a key or one of its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
    /// A key was attached under `parent`.
    SubkeyAdded {
        /// The new parent.
        parent: KeyId,
        /// The attached key.
        subkey: KeyId,
        /// Name of the attached key.
        name: String,
    },

    /// A value was added to `key`, possibly replacing one of the same name.
    ValueAdded {
        /// Owning key.
        key: KeyId,
        /// Value name.
        name: String,
        /// Type of the new value.
        value_type: ValueType,
    },

    /// A value was removed from `key`.
    ValueDeleted {
        /// Owning key.
        key: KeyId,
        /// Value name.
        name: String,
    },

    /// The data of a value changed.
    ValueDataChanged {
        /// Owning key.
        key: KeyId,
        /// Value name.
        name: String,
    },

    /// A value was renamed.
    ValueRenamed {
        /// Owning key.
        key: KeyId,
        /// Previous name.
        old_name: String,
        /// Current name.
        new_name: String,
    },

    /// A key is being deleted. Its id is invalid once delivery completes.
    Deleted {
        /// The deleted key.
        key: KeyId,
        /// Its name.
        name: String,
    },

    /// A key is about to move under a new parent.
    Moved {
        /// The moving key.
        key: KeyId,
        /// Current parent.
        old_parent: Option<KeyId>,
        /// Destination parent.
        new_parent: KeyId,
        /// Current hive.
        old_hive: Hive,
        /// Destination hive.
        new_hive: Hive,
    },

    /// A key was renamed.
    Renamed {
        /// The renamed key.
        key: KeyId,
        /// Previous name.
        old_name: String,
        /// Current name.
        new_name: String,
    },
}

impl KeyEvent {
    /// The key whose listeners receive this event.
    pub fn key(&self) -> KeyId {
        match self {
            KeyEvent::SubkeyAdded { parent, .. } => *parent,
            KeyEvent::ValueAdded { key, .. }
            | KeyEvent::ValueDeleted { key, .. }
            | KeyEvent::ValueDataChanged { key, .. }
            | KeyEvent::ValueRenamed { key, .. }
            | KeyEvent::Deleted { key, .. }
            | KeyEvent::Moved { key, .. }
            | KeyEvent::Renamed { key, .. } => *key,
        }
    }
}

/// Callback invoked for each event.
pub type Listener = Box<dyn FnMut(&KeyEvent) + Send>;

/// Handle returned on registration, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Registered listeners in registration order.
#[derive(Default)]
pub(crate) struct Listeners {
    entries: Vec<(ListenerId, Listener)>,
}

impl Listeners {
    pub(crate) fn add(&mut self, id: ListenerId, listener: Listener) {
        self.entries.push((id, listener));
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub(crate) fn emit(&mut self, event: &KeyEvent) {
        for (_, listener) in self.entries.iter_mut() {
            listener(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_emit_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::default();
        for tag in 0..3 {
            let seen = Arc::clone(&seen);
            listeners.add(
                ListenerId(tag),
                Box::new(move |_event| seen.lock().unwrap().push(tag)),
            );
        }

        assert!(listeners.remove(ListenerId(1)));
        assert!(!listeners.remove(ListenerId(1)));
        listeners.emit(&KeyEvent::Deleted {
            key: KeyId::from_raw(4),
            name: "Old".into(),
        });
        assert_eq!(*seen.lock().unwrap(), vec![0, 2]);
        assert_eq!(listeners.len(), 2);
    }

    #[test]
    fn test_event_key() {
        let event = KeyEvent::SubkeyAdded {
            parent: KeyId::from_raw(1),
            subkey: KeyId::from_raw(2),
            name: "Child".into(),
        };
        assert_eq!(event.key(), KeyId::from_raw(1));
    }
}
