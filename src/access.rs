//! Access to an external registry store.
//!
//! The tree reads from and writes to a live registry only through
//! [`RegistryAccess`]. Nodes are addressed by hive-qualified paths such as
//! `HKEY_CURRENT_USER\Software\Vendor`; hive abbreviations are accepted.
//! [`MemoryRegistry`] is a self-contained implementation used for tests and
//! for working with registry snapshots off Windows.

use crate::error::{RegistryError, Result};
use crate::hive::Hive;
use crate::value_type::ValueType;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Operations the key tree needs from an external registry.
pub trait RegistryAccess {
    /// Names of the direct subkeys of `path`.
    fn subkey_names(&self, path: &str) -> Result<Vec<String>>;

    /// Names of the values stored at `path`. The default value is `""`.
    fn value_names(&self, path: &str) -> Result<Vec<String>>;

    /// Type and raw bytes of one value.
    fn get_value(&self, path: &str, name: &str) -> Result<(ValueType, Vec<u8>)>;

    /// Writes a value, replacing any value of the same name.
    fn set_value(&mut self, path: &str, name: &str, value_type: ValueType, data: &[u8])
        -> Result<()>;

    /// Removes one value.
    fn delete_value(&mut self, path: &str, name: &str) -> Result<()>;

    /// Creates a key and any missing ancestors. Existing keys are left as is.
    fn create_key(&mut self, path: &str) -> Result<()>;

    /// Removes a key with everything below it.
    fn delete_subtree(&mut self, path: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
struct MemoryKey {
    path: String,
    values: Vec<(String, ValueType, Vec<u8>)>,
}

/// In-memory registry.
///
/// Paths compare case-insensitively. All hive roots exist from the start.
///
/// ```rust
/// # use reg_file::{MemoryRegistry, RegistryAccess, ValueType};
/// let mut registry = MemoryRegistry::new();
/// registry.create_key(r"HKCU\Software\Vendor").unwrap();
/// registry
///     .set_value(r"HKCU\Software\Vendor", "Count", ValueType::Dword, &[1, 0, 0, 0])
///     .unwrap();
/// assert_eq!(registry.subkey_names(r"HKEY_CURRENT_USER\Software").unwrap(), vec!["Vendor"]);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    keys: BTreeMap<String, MemoryKey>,
    denied: HashSet<String>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    /// Creates a registry holding only the hive roots.
    pub fn new() -> Self {
        let keys = Hive::ALL
            .iter()
            .map(|hive| {
                (
                    hive.name().to_ascii_lowercase(),
                    MemoryKey {
                        path: hive.name().to_string(),
                        values: Vec::new(),
                    },
                )
            })
            .collect();
        Self {
            keys,
            denied: HashSet::new(),
        }
    }

    /// Makes every operation on exactly `path` fail with `AccessDenied`.
    pub fn deny(&mut self, path: &str) -> Result<()> {
        let (lookup, _) = Self::normalize(path)?;
        self.denied.insert(lookup);
        Ok(())
    }

    /// Lifts a denial set by [`MemoryRegistry::deny`].
    pub fn allow(&mut self, path: &str) -> Result<()> {
        let (lookup, _) = Self::normalize(path)?;
        self.denied.remove(&lookup);
        Ok(())
    }

    /// Returns true if the key exists.
    pub fn key_exists(&self, path: &str) -> bool {
        Self::normalize(path)
            .map(|(lookup, _)| self.keys.contains_key(&lookup))
            .unwrap_or(false)
    }

    /// Number of keys, hive roots included.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    fn normalize(path: &str) -> Result<(String, String)> {
        let canonical = Hive::canonical_path(path)?;
        Ok((canonical.to_ascii_lowercase(), canonical))
    }

    fn check(&self, path: &str) -> Result<String> {
        let (lookup, canonical) = Self::normalize(path)?;
        if self.denied.contains(&lookup) {
            return Err(RegistryError::AccessDenied(canonical));
        }
        Ok(lookup)
    }

    fn existing(&self, path: &str) -> Result<&MemoryKey> {
        let lookup = self.check(path)?;
        self.keys
            .get(&lookup)
            .ok_or_else(|| RegistryError::not_found("key", path))
    }

    fn existing_mut(&mut self, path: &str) -> Result<&mut MemoryKey> {
        let lookup = self.check(path)?;
        self.keys
            .get_mut(&lookup)
            .ok_or_else(|| RegistryError::not_found("key", path))
    }
}

impl RegistryAccess for MemoryRegistry {
    fn subkey_names(&self, path: &str) -> Result<Vec<String>> {
        let lookup = self.check(path)?;
        if !self.keys.contains_key(&lookup) {
            return Err(RegistryError::not_found("key", path));
        }
        let prefix = format!("{}\\", lookup);
        let names = self
            .keys
            .range(prefix.clone()..)
            .take_while(|(child, _)| child.starts_with(&prefix))
            .filter(|(child, _)| !child[prefix.len()..].contains('\\'))
            .filter_map(|(_, key)| key.path.rsplit('\\').next().map(str::to_string))
            .collect();
        Ok(names)
    }

    fn value_names(&self, path: &str) -> Result<Vec<String>> {
        let key = self.existing(path)?;
        Ok(key.values.iter().map(|(name, _, _)| name.clone()).collect())
    }

    fn get_value(&self, path: &str, name: &str) -> Result<(ValueType, Vec<u8>)> {
        let key = self.existing(path)?;
        key.values
            .iter()
            .find(|(value_name, _, _)| value_name == name)
            .map(|(_, value_type, data)| (*value_type, data.clone()))
            .ok_or_else(|| RegistryError::not_found("value", name))
    }

    fn set_value(
        &mut self,
        path: &str,
        name: &str,
        value_type: ValueType,
        data: &[u8],
    ) -> Result<()> {
        let key = self.existing_mut(path)?;
        match key.values.iter_mut().find(|(value_name, _, _)| value_name == name) {
            Some(slot) => {
                slot.1 = value_type;
                slot.2 = data.to_vec();
            }
            None => key.values.push((name.to_string(), value_type, data.to_vec())),
        }
        debug!(path, name, "stored value");
        Ok(())
    }

    fn delete_value(&mut self, path: &str, name: &str) -> Result<()> {
        let key = self.existing_mut(path)?;
        let before = key.values.len();
        key.values.retain(|(value_name, _, _)| value_name != name);
        if key.values.len() == before {
            return Err(RegistryError::not_found("value", name));
        }
        Ok(())
    }

    fn create_key(&mut self, path: &str) -> Result<()> {
        self.check(path)?;
        let (hive, names) = Hive::split_path(path)?;
        let mut display = hive.name().to_string();
        for name in names {
            display.push('\\');
            display.push_str(name);
            let lookup = display.to_ascii_lowercase();
            if self.denied.contains(&lookup) {
                return Err(RegistryError::AccessDenied(display));
            }
            self.keys.entry(lookup).or_insert_with(|| MemoryKey {
                path: display.clone(),
                values: Vec::new(),
            });
        }
        Ok(())
    }

    fn delete_subtree(&mut self, path: &str) -> Result<()> {
        let lookup = self.check(path)?;
        let (_, names) = Hive::split_path(path)?;
        if names.is_empty() {
            return Err(RegistryError::invalid_operation(format!(
                "cannot delete hive {}",
                path
            )));
        }
        if self.keys.remove(&lookup).is_none() {
            return Err(RegistryError::not_found("key", path));
        }
        let prefix = format!("{}\\", lookup);
        self.keys.retain(|key, _| !key.starts_with(&prefix));
        debug!(path, "deleted subtree");
        Ok(())
    }
}
