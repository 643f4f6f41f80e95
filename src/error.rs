//! Error types for `.reg` codec and registry tree operations.
//!
//! This module provides one error enum for every fallible operation in the
//! crate: file I/O, `.reg` syntax violations, value data that does not match
//! its declared type, structural misuse of the key tree, and failures raised
//! by an external registry collaborator.

use crate::value_type::ValueType;
use std::io;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Errors that can occur while parsing, serializing or editing registry data.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// I/O error occurred while reading or writing a `.reg` file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Missing or unrecognized header, or a malformed line where a key or
    /// value was expected.
    #[error("Invalid registry file at line {line}: {message}")]
    InvalidFileFormat {
        /// Physical line (1-based) where the offending logical line starts.
        /// Zero when the problem is not tied to a line.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// Value data does not match the shape its declared type requires.
    #[error("Data does not match {value_type:?}: {message}")]
    FormatMismatch {
        /// Type the data was read as.
        value_type: ValueType,
        /// Description of the mismatch.
        message: String,
    },

    /// Value type outside the five supported kinds.
    #[error("Unsupported value type: {}", .0.name())]
    UnsupportedValueType(ValueType),

    /// Structural misuse of the key tree or the file.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The external registry refused access to a node.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Key, value or live registry path not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unrecognized hive name at the start of a key path.
    #[error("Invalid registry hive: {0}")]
    InvalidHive(String),
}

impl RegistryError {
    /// Creates an invalid file error tied to a line.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use reg_file::error::RegistryError;
    /// let err = RegistryError::invalid_file(3, "value found before any key");
    /// assert!(err.to_string().contains("line 3"));
    /// ```
    pub fn invalid_file(line: usize, message: impl Into<String>) -> Self {
        Self::InvalidFileFormat {
            line,
            message: message.into(),
        }
    }

    /// Creates a format mismatch error for a value read as `value_type`.
    pub fn format_mismatch(value_type: ValueType, message: impl Into<String>) -> Self {
        Self::FormatMismatch {
            value_type,
            message: message.into(),
        }
    }

    /// Creates a not found error with context about what was being searched.
    ///
    /// # Arguments
    ///
    /// * `item_type` - Type of item (e.g., "key", "value")
    /// * `name` - Name of the item that wasn't found
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use reg_file::error::RegistryError;
    /// let err = RegistryError::not_found("value", "DisplayName");
    /// ```
    pub fn not_found(item_type: &str, name: &str) -> Self {
        Self::NotFound(format!("{} '{}'", item_type, name))
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Returns true if this error came from a denied registry access.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_file_display() {
        let err = RegistryError::invalid_file(7, "unterminated string");
        assert_eq!(
            err.to_string(),
            "Invalid registry file at line 7: unterminated string"
        );
    }

    #[test]
    fn test_unsupported_type_display() {
        let err = RegistryError::UnsupportedValueType(ValueType::Qword);
        assert_eq!(err.to_string(), "Unsupported value type: REG_QWORD");
    }

    #[test]
    fn test_access_denied_predicate() {
        assert!(RegistryError::AccessDenied("HKEY_USERS".into()).is_access_denied());
        assert!(!RegistryError::not_found("key", "Foo").is_access_denied());
    }
}
