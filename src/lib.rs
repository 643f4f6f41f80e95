//! # Windows Registry File Codec
//!
//! Reads and writes Windows Registry export files (`.reg`) and models the
//! registry as an editable tree of keys and values.
//!
//! ## Features
//!
//! - **Exact format**: Parses and writes the `regedit` export format, including
//!   UTF-16LE hex encodings and 77-column line continuations
//! - **Typed values**: String, expandable string, binary, DWORD and multi-string
//!   values with canonical byte storage
//! - **Key tree**: Arena-backed key hierarchy with rename, move and delete,
//!   and change notifications
//! - **Live registry seam**: Populate from and import into any store that
//!   implements [`RegistryAccess`]
//! - **Encoding detection**: UTF-16LE, UTF-8 and Windows-1252 files, written
//!   back in the encoding they were read in
//!
//! ## File Layout
//!
//! ```text
//! Windows Registry Editor Version 5.00
//!
//! [HKEY_CURRENT_USER\Software\Vendor]
//! @="default value"
//! "Name"="string"
//! "Count"=dword:0000002a
//! "Blob"=hex:de,ad,be,ef
//! "Path"=hex(2):25,00,41,00,50,00,50,00,44,00,41,00,54,00,41,00,25,00,00,00
//! "List"=hex(7):61,00,00,00,62,00,00,00,00,00
//! "Removed"=-
//!
//! [-HKEY_CURRENT_USER\Software\Obsolete]
//! ```
//!
//! ## Examples
//!
//! ### Basic Usage
//!
//! ```no_run
//! use reg_file::RegistryFile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = RegistryFile::open("export.reg")?;
//!
//! for entry in file.keys() {
//!     let path = file.tree().full_path(entry.id)?;
//!     println!("[{}]", path);
//!     for value in file.tree().key(entry.id)?.values().exportable() {
//!         println!("  {} = {}", value.name(), value.value_string());
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Building a File
//!
//! ```rust
//! use reg_file::{RegistryFile, ValueData};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut file = RegistryFile::new();
//! let key = file.tree_mut().create_path(r"HKEY_CURRENT_USER\Software\Vendor")?;
//! file.tree_mut().add_value(key, "Name", "Example")?;
//! file.tree_mut().add_value(key, "Count", 42u32)?;
//! file.tree_mut().add_value(key, "List", ValueData::MultiString(vec!["a".into(), "b".into()]))?;
//! file.add_key(key, false)?;
//!
//! let text = file.to_reg_string();
//! assert!(text.contains("\"Count\"=dword:0000002a\r\n"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Populating From a Registry
//!
//! ```rust
//! use reg_file::{MemoryRegistry, RegistryAccess, RegistryTree, ValueType};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut live = MemoryRegistry::new();
//! live.create_key(r"HKLM\Software\Vendor")?;
//! live.set_value(r"HKLM\Software\Vendor", "Count", ValueType::Dword, &[7, 0, 0, 0])?;
//!
//! let mut tree = RegistryTree::new();
//! let key = tree.open_live(r"HKLM\Software", &live)?;
//! let vendor = tree.find_subkey(key, "vendor").ok_or("missing key")?;
//! assert_eq!(tree.value(vendor, "Count").ok_or("missing value")?.as_dword()?, 7);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod collection;
pub mod encoding;
pub mod error;
pub mod event;
pub mod file;
pub mod hive;
pub mod key;
mod reaper;
pub mod tree;
pub mod utils;
pub mod value;
pub mod value_type;

// Python bindings (only compiled when python feature is enabled)
#[cfg(feature = "python")]
pub mod python;

// Re-export main types for convenience
pub use access::{MemoryRegistry, RegistryAccess};
pub use collection::{KeyCollection, KeyEntry, ValueCollection};
pub use encoding::TextEncoding;
pub use error::{RegistryError, Result};
pub use event::{KeyEvent, Listener, ListenerId};
pub use file::{FileVersion, KeySnapshot, RegistryFile, ValueSnapshot, HEADERS};
pub use hive::Hive;
pub use key::{KeyId, KeyNode};
pub use tree::RegistryTree;
pub use value::{RegistryValue, ValueData};
pub use value_type::ValueType;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
