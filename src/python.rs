//! Python bindings for the `.reg` codec using PyO3.
//!
//! This module exposes `RegFile`, `RegKey` and `RegValue`. Keys share their
//! file through a mutex, so edits made through a key are visible to the file
//! that produced it.

use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{KeyId, RegistryError, RegistryFile as RustRegistryFile, ValueData};

/// Convert Rust RegistryError to Python exception
fn registry_error_to_py(err: RegistryError) -> PyErr {
    match err {
        RegistryError::Io(e) => PyIOError::new_err(e.to_string()),
        RegistryError::InvalidFileFormat { line, message } => {
            PyValueError::new_err(format!("Invalid registry file at line {}: {}", line, message))
        }
        RegistryError::FormatMismatch { value_type, message } => PyValueError::new_err(format!(
            "Data does not match {}: {}",
            value_type.name(),
            message
        )),
        RegistryError::UnsupportedValueType(value_type) => {
            PyValueError::new_err(format!("Unsupported value type: {}", value_type.name()))
        }
        RegistryError::InvalidOperation(msg) => {
            PyValueError::new_err(format!("Invalid operation: {}", msg))
        }
        RegistryError::AccessDenied(msg) => PyValueError::new_err(format!("Access denied: {}", msg)),
        RegistryError::NotFound(msg) => PyValueError::new_err(format!("Not found: {}", msg)),
        RegistryError::InvalidHive(msg) => {
            PyValueError::new_err(format!("Invalid registry hive: {}", msg))
        }
    }
}

type SharedFile = Arc<Mutex<RustRegistryFile>>;

fn lock(file: &SharedFile) -> PyResult<MutexGuard<'_, RustRegistryFile>> {
    file.lock()
        .map_err(|_| PyRuntimeError::new_err("registry file lock poisoned"))
}

/// Python wrapper for a registry value.
///
/// Holds a copy of the value taken when it was read.
#[pyclass(name = "RegValue")]
#[derive(Clone)]
pub struct PyRegValue {
    name: String,
    type_name: String,
    data: String,
    export: String,
    raw: Vec<u8>,
}

#[pymethods]
impl PyRegValue {
    /// Get the value name (empty for the default value)
    fn name(&self) -> &str {
        &self.name
    }

    /// Get the `REG_*` type name
    fn value_type(&self) -> &str {
        &self.type_name
    }

    /// Get the human-readable data
    fn data(&self) -> &str {
        &self.data
    }

    /// Get the `.reg` line for this value
    fn export_line(&self) -> &str {
        &self.export
    }

    /// Get the raw value data as bytes
    fn raw_data<'py>(&self, py: Python<'py>) -> &'py PyBytes {
        PyBytes::new(py, &self.raw)
    }

    fn __repr__(&self) -> String {
        format!("RegValue(name='{}', type={})", self.name, self.type_name)
    }
}

/// Python wrapper for a registry key.
#[pyclass(name = "RegKey")]
pub struct PyRegKey {
    file: SharedFile,
    id: KeyId,
}

#[pymethods]
impl PyRegKey {
    /// Get the key name
    fn name(&self) -> PyResult<String> {
        let file = lock(&self.file)?;
        let node = file.tree().key(self.id).map_err(registry_error_to_py)?;
        Ok(node.name().to_string())
    }

    /// Get the full path
    fn path(&self) -> PyResult<String> {
        let file = lock(&self.file)?;
        file.tree().full_path(self.id).map_err(registry_error_to_py)
    }

    /// Get all subkeys
    fn subkeys(&self) -> PyResult<Vec<PyRegKey>> {
        let file = lock(&self.file)?;
        let node = file.tree().key(self.id).map_err(registry_error_to_py)?;
        Ok(node
            .subkeys()
            .ids()
            .map(|id| PyRegKey {
                file: Arc::clone(&self.file),
                id,
            })
            .collect())
    }

    /// Get all set values
    fn values(&self) -> PyResult<Vec<PyRegValue>> {
        let file = lock(&self.file)?;
        let node = file.tree().key(self.id).map_err(registry_error_to_py)?;
        Ok(node
            .values()
            .exportable()
            .map(|value| PyRegValue {
                name: value.name().to_string(),
                type_name: value.value_type().name(),
                data: value.value_string(),
                export: value.format_for_export(),
                raw: value.raw().to_vec(),
            })
            .collect())
    }

    /// Set a string value
    fn set_string(&self, name: &str, data: &str) -> PyResult<()> {
        self.add(name, ValueData::String(data.to_string()))
    }

    /// Set an expandable string value
    fn set_expand_string(&self, name: &str, data: &str) -> PyResult<()> {
        self.add(name, ValueData::ExpandString(data.to_string()))
    }

    /// Set a DWORD value
    fn set_dword(&self, name: &str, data: u32) -> PyResult<()> {
        self.add(name, ValueData::Dword(data))
    }

    /// Set a binary value
    fn set_binary(&self, name: &str, data: Vec<u8>) -> PyResult<()> {
        self.add(name, ValueData::Binary(data))
    }

    /// Set a multi-string value
    fn set_multi_string(&self, name: &str, data: Vec<String>) -> PyResult<()> {
        self.add(name, ValueData::MultiString(data))
    }

    /// Delete a value, returning whether it existed
    fn delete_value(&self, name: &str) -> PyResult<bool> {
        let mut file = lock(&self.file)?;
        file.tree_mut()
            .delete_value(self.id, name)
            .map_err(registry_error_to_py)
    }

    /// Rename the key
    fn rename(&self, name: &str) -> PyResult<()> {
        let mut file = lock(&self.file)?;
        file.tree_mut()
            .rename(self.id, name)
            .map_err(registry_error_to_py)
    }

    /// Mark or unmark the key for deletion on import
    fn mark_for_deletion(&self, marked: bool) -> PyResult<()> {
        let mut file = lock(&self.file)?;
        file.tree_mut()
            .set_marked_for_deletion(self.id, marked)
            .map_err(registry_error_to_py)
    }

    /// Delete the key and its subtree
    fn delete(&self) -> PyResult<()> {
        let mut file = lock(&self.file)?;
        file.tree_mut().delete(self.id).map_err(registry_error_to_py)
    }

    fn __repr__(&self) -> String {
        match self.path() {
            Ok(path) => format!("RegKey('{}')", path),
            Err(_) => format!("RegKey({}, deleted)", self.id),
        }
    }
}

impl PyRegKey {
    fn add(&self, name: &str, data: ValueData) -> PyResult<()> {
        let mut file = lock(&self.file)?;
        file.tree_mut()
            .add_value(self.id, name, data)
            .map_err(registry_error_to_py)
    }
}

/// Python wrapper for a `.reg` file.
#[pyclass(name = "RegFile")]
pub struct PyRegFile {
    inner: SharedFile,
}

impl PyRegFile {
    fn wrap(file: RustRegistryFile) -> Self {
        Self {
            inner: Arc::new(Mutex::new(file)),
        }
    }

    fn key(&self, id: KeyId) -> PyRegKey {
        PyRegKey {
            file: Arc::clone(&self.inner),
            id,
        }
    }
}

#[pymethods]
impl PyRegFile {
    /// Create an empty registry file
    #[new]
    fn new() -> Self {
        Self::wrap(RustRegistryFile::new())
    }

    /// Open and parse a `.reg` file
    #[staticmethod]
    fn open(py: Python, path: String) -> PyResult<Self> {
        let file = py
            .allow_threads(move || RustRegistryFile::open(path))
            .map_err(registry_error_to_py)?;
        Ok(Self::wrap(file))
    }

    /// Parse `.reg` text
    #[staticmethod]
    fn parse(text: &str) -> PyResult<Self> {
        RustRegistryFile::parse(text)
            .map(Self::wrap)
            .map_err(registry_error_to_py)
    }

    /// Get the registered keys in file order
    fn keys(&self) -> PyResult<Vec<PyRegKey>> {
        let file = lock(&self.inner)?;
        Ok(file.keys().ids().map(|id| self.key(id)).collect())
    }

    /// Find a registered key by path
    fn find_key(&self, path: &str) -> PyResult<Option<PyRegKey>> {
        let file = lock(&self.inner)?;
        Ok(file.find_key(path).map(|id| self.key(id)))
    }

    /// Create a key (and missing ancestors) and register it for writing
    fn create_key(&self, path: &str) -> PyResult<PyRegKey> {
        let mut file = lock(&self.inner)?;
        let id = file
            .tree_mut()
            .create_path(path)
            .map_err(registry_error_to_py)?;
        file.add_key(id, false).map_err(registry_error_to_py)?;
        Ok(self.key(id))
    }

    /// Serialize to `.reg` text
    fn to_reg_string(&self) -> PyResult<String> {
        Ok(lock(&self.inner)?.to_reg_string())
    }

    /// Save to the path the file was opened from
    fn save(&self) -> PyResult<()> {
        lock(&self.inner)?.save().map_err(registry_error_to_py)
    }

    /// Save to a new path
    fn save_as(&self, path: String) -> PyResult<()> {
        lock(&self.inner)?
            .save_as(path)
            .map_err(registry_error_to_py)
    }

    /// Get the detected text encoding
    fn encoding(&self) -> PyResult<String> {
        Ok(lock(&self.inner)?.encoding().name().to_string())
    }

    fn __repr__(&self) -> PyResult<String> {
        let file = lock(&self.inner)?;
        Ok(format!("RegFile(keys={})", file.keys().len()))
    }
}

/// Python module definition
#[pymodule]
fn reg_file(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyRegFile>()?;
    m.add_class::<PyRegKey>()?;
    m.add_class::<PyRegValue>()?;

    // Add version constant
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
