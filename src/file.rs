//! `.reg` file parsing and serialization.
//!
//! A [`RegistryFile`] owns a [`RegistryTree`] and a flat, ordered list of the
//! keys it writes. Parsing builds keys with [`RegistryTree::create_path`], so
//! repeated sections of one path fold into a single key and intermediate keys
//! exist in the tree without being written.

use crate::collection::KeyCollection;
use crate::encoding::TextEncoding;
use crate::error::{RegistryError, Result};
use crate::key::KeyId;
use crate::tree::RegistryTree;
use crate::utils::{logical_lines, parse_hex_list, split_quoted, strip_comment};
use crate::value::{RegistryValue, ValueData};
use crate::value_type::ValueType;
use memmap2::Mmap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Headers accepted on the first non-blank line.
pub const HEADERS: [&str; 2] = ["Windows Registry Editor Version 5.00", "REGEDIT4"];

/// Line break used in written files.
const CRLF: &str = "\r\n";

/// Header found when a file was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileVersion {
    /// `Windows Registry Editor Version 5.00`
    #[default]
    Regedit5,
    /// `REGEDIT4`
    Regedit4,
}

impl FileVersion {
    /// Header line of this version.
    pub fn header(&self) -> &'static str {
        match self {
            FileVersion::Regedit5 => HEADERS[0],
            FileVersion::Regedit4 => HEADERS[1],
        }
    }

    /// Recognises a header line.
    pub fn from_header(line: &str) -> Option<Self> {
        match line {
            l if l == HEADERS[0] => Some(FileVersion::Regedit5),
            l if l == HEADERS[1] => Some(FileVersion::Regedit4),
            _ => None,
        }
    }
}

/// Serializable view of one value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ValueSnapshot {
    /// Value name, empty for the default value.
    pub name: String,
    /// `REG_*` type name.
    pub value_type: String,
    /// Human-readable data.
    pub data: String,
    /// Canonical bytes.
    pub raw: Vec<u8>,
    /// Written as `"name"=-`.
    pub marked_for_deletion: bool,
}

/// Serializable view of one registered key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct KeySnapshot {
    /// Full path.
    pub path: String,
    /// Written as `[-path]`.
    pub marked_for_deletion: bool,
    /// Set values in file order.
    pub values: Vec<ValueSnapshot>,
}

/// A Windows Registry `.reg` file.
///
/// # Examples
///
/// ```rust
/// use reg_file::RegistryFile;
///
/// let text = "Windows Registry Editor Version 5.00\r\n\r\n\
///             [HKEY_CURRENT_USER\\Foo]\r\n\
///             \"Bar\"=\"Baz\"\r\n\r\n";
/// let file = RegistryFile::parse(text).unwrap();
/// let key = file.find_key(r"HKCU\Foo").unwrap();
/// let value = file.tree().value(key, "Bar").unwrap();
/// assert_eq!(value.as_string().unwrap(), "Baz");
/// assert_eq!(file.to_reg_string(), text);
/// ```
#[derive(Debug, Default)]
pub struct RegistryFile {
    source_path: Option<PathBuf>,
    tree: RegistryTree,
    keys: KeyCollection,
    encoding: TextEncoding,
    version: FileVersion,
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

impl RegistryFile {
    /// Creates an empty file with no path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `.reg` text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut file = Self::new();
        file.parse_text(text)?;
        Ok(file)
    }

    /// Decodes and parses file contents, remembering the detected encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (text, encoding) = TextEncoding::decode(bytes);
        debug!(encoding = %encoding, size = bytes.len(), "Decoded registry file");
        let mut file = Self::parse(&text)?;
        file.encoding = encoding;
        Ok(file)
    }

    /// Opens and parses a `.reg` file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read and `InvalidFileFormat`
    /// if its contents are not a valid `.reg` file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Opening registry file");
        let file = File::open(&path)?;
        let size = file.metadata()?.len();

        let mut reg = if size == 0 {
            Self::from_bytes(&[])?
        } else {
            // SAFETY: the map is read-only and only lives for this call; the
            // contents are decoded into an owned string before it is dropped.
            let mmap = unsafe { Mmap::map(&file)? };
            debug!(size = mmap.len(), "Memory mapped registry file");
            Self::from_bytes(&mmap)?
        };
        reg.source_path = Some(path.as_ref().to_path_buf());

        info!(keys = reg.keys.len(), encoding = %reg.encoding, "Parsed registry file");
        Ok(reg)
    }

    /// Re-reads the file from its source path, replacing all content.
    #[instrument(skip(self))]
    pub fn read_from_file(&mut self) -> Result<()> {
        let path = self
            .source_path
            .clone()
            .ok_or_else(|| RegistryError::invalid_operation("file has no source path"))?;
        *self = Self::open(path)?;
        Ok(())
    }

    fn parse_text(&mut self, text: &str) -> Result<()> {
        let lines = logical_lines(text);
        let mut lines = lines.iter();

        let mut version = None;
        for (number, raw) in lines.by_ref() {
            let line = strip_comment(raw.trim_start_matches('\u{feff}')).trim();
            if line.is_empty() {
                continue;
            }
            version = Some(
                FileVersion::from_header(line)
                    .ok_or_else(|| RegistryError::invalid_file(*number, "content before header"))?,
            );
            break;
        }
        self.version =
            version.ok_or_else(|| RegistryError::invalid_file(0, "missing registry file header"))?;

        let mut current: Option<KeyId> = None;
        for (number, raw) in lines {
            let number = *number;
            let trimmed = raw.trim();

            if trimmed.starts_with('[') {
                if let Some(open) = current.take() {
                    self.commit(open)?;
                }
                current = Some(self.parse_section(trimmed, number)?);
                continue;
            }

            let line = strip_comment(trimmed).trim();
            if line.is_empty() {
                continue;
            }
            let key = current
                .ok_or_else(|| RegistryError::invalid_file(number, "value found before any key"))?;
            self.parse_value_line(key, line, number)?;
        }

        if let Some(open) = current {
            self.commit(open)?;
        }
        Ok(())
    }

    fn commit(&mut self, id: KeyId) -> Result<()> {
        let name = self.tree.key(id)?.name().to_string();
        self.keys.add(id, name);
        Ok(())
    }

    fn parse_section(&mut self, line: &str, number: usize) -> Result<KeyId> {
        // The path ends at the first `]` followed only by blanks or a comment;
        // earlier brackets and semicolons belong to key names.
        let close = line
            .match_indices(']')
            .map(|(index, _)| index)
            .find(|&index| {
                let tail = line[index + 1..].trim_start();
                tail.is_empty() || tail.starts_with(';')
            })
            .ok_or_else(|| {
                let message = if line.contains(']') {
                    "unexpected text after key path"
                } else {
                    "unterminated key path"
                };
                RegistryError::invalid_file(number, message)
            })?;

        // Key names may start or end with blanks, so only the hive side is trimmed.
        let section = &line[1..close];
        let (delete, path) = match section.strip_prefix('-') {
            Some(path) => (true, path.trim_start()),
            None => (false, section.trim_start()),
        };

        let id = self.tree.create_path(path).map_err(|e| match e {
            RegistryError::InvalidHive(hive) => {
                RegistryError::invalid_file(number, format!("unknown hive in '{}': {}", path, hive))
            }
            other => RegistryError::invalid_file(number, other.to_string()),
        })?;
        if delete {
            self.tree.set_marked_for_deletion(id, true)?;
        }
        debug!(line = number, path, delete, "Parsed key");
        Ok(id)
    }

    fn parse_value_line(&mut self, key: KeyId, line: &str, number: usize) -> Result<()> {
        let (name, rest) = if let Some(rest) = line.strip_prefix('@') {
            (String::new(), rest)
        } else if line.starts_with('"') {
            split_quoted(line)
                .ok_or_else(|| RegistryError::invalid_file(number, "unterminated value name"))?
        } else {
            return Err(RegistryError::invalid_file(
                number,
                format!("unrecognised line '{}'", line),
            ));
        };

        let data = rest
            .trim_start()
            .strip_prefix('=')
            .ok_or_else(|| RegistryError::invalid_file(number, "missing '=' after value name"))?
            .trim();

        let value = if data == "-" {
            let mut value = RegistryValue::new(key, name, ValueData::String(String::new()));
            value.set_marked_for_deletion(true);
            value
        } else if data.starts_with('"') {
            let (text, tail) = split_quoted(data)
                .ok_or_else(|| RegistryError::invalid_file(number, "unterminated string"))?;
            if !tail.trim().is_empty() {
                return Err(RegistryError::invalid_file(
                    number,
                    format!("unexpected text after string: '{}'", tail.trim()),
                ));
            }
            RegistryValue::new(key, name, ValueData::String(text))
        } else if let Some(digits) = strip_prefix_ignore_case(data, "dword:") {
            let digits = digits.trim();
            let valid = (1..=8).contains(&digits.len())
                && digits.chars().all(|c| c.is_ascii_hexdigit());
            let dword = u32::from_str_radix(digits, 16)
                .ok()
                .filter(|_| valid)
                .ok_or_else(|| {
                    RegistryError::invalid_file(number, format!("invalid dword '{}'", digits))
                })?;
            RegistryValue::new(key, name, ValueData::Dword(dword))
        } else if let Some(list) = strip_prefix_ignore_case(data, "hex:") {
            let bytes = parse_hex_list(list, number)?;
            RegistryValue::from_raw(key, name, ValueType::Binary, bytes)?
        } else if let Some(tail) = strip_prefix_ignore_case(data, "hex(") {
            let close = tail
                .find(')')
                .ok_or_else(|| RegistryError::invalid_file(number, "unterminated hex type"))?;
            let code = u32::from_str_radix(tail[..close].trim(), 16).map_err(|e| {
                RegistryError::invalid_file(number, format!("invalid hex type: {}", e))
            })?;
            let list = tail[close + 1..]
                .strip_prefix(':')
                .ok_or_else(|| RegistryError::invalid_file(number, "missing ':' after hex type"))?;

            let value_type = ValueType::from_u32(code);
            if !value_type.is_supported() {
                warn!(line = number, name = name.as_str(), value_type = %value_type, "Skipping unsupported value");
                return Ok(());
            }
            let bytes = parse_hex_list(list, number)?;
            RegistryValue::from_raw(key, name, value_type, bytes)?
        } else {
            warn!(line = number, name = name.as_str(), "Skipping value with unknown encoding");
            return Ok(());
        };

        self.tree.insert_value(key, value)
    }

    /// Serializes the registered keys as `.reg` text.
    ///
    /// The 5.00 header is always written. Keys deleted from the tree are
    /// skipped.
    pub fn to_reg_string(&self) -> String {
        let mut out = String::new();
        out.push_str(FileVersion::Regedit5.header());
        out.push_str(CRLF);
        out.push_str(CRLF);

        for id in self.keys.ids() {
            let (Ok(node), Ok(path)) = (self.tree.key(id), self.tree.full_path(id)) else {
                continue;
            };

            if node.is_marked_for_deletion() {
                out.push_str(&format!("[-{}]", path));
                out.push_str(CRLF);
                out.push_str(CRLF);
                continue;
            }

            out.push_str(&format!("[{}]", path));
            out.push_str(CRLF);
            for value in node.values().exportable() {
                out.push_str(&value.format_for_export());
                out.push_str(CRLF);
            }
            out.push_str(CRLF);
        }

        out
    }

    /// Writes the file in its encoding.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let bytes = self.encoding.encode(&self.to_reg_string());
        writer.write_all(&bytes)?;
        Ok(())
    }

    fn write_file(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        self.write_to(&mut file)?;
        file.flush()?;
        info!(path = %path.display(), keys = self.keys.len(), "Saved registry file");
        Ok(())
    }

    /// Saves to the source path.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` if the file has never been opened or saved.
    pub fn save(&self) -> Result<()> {
        let path = self
            .source_path
            .as_deref()
            .ok_or_else(|| RegistryError::invalid_operation("file has no source path"))?;
        self.write_file(path)
    }

    /// Saves to `path` and makes it the source path.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.write_file(path.as_ref())?;
        self.source_path = Some(path.as_ref().to_path_buf());
        Ok(())
    }

    /// Registers a key for writing, with all descendants in pre-order when
    /// `add_subkeys` is set.
    pub fn add_key(&mut self, id: KeyId, add_subkeys: bool) -> Result<()> {
        let ids = if add_subkeys {
            self.tree.walk(id)?
        } else {
            vec![id]
        };
        for key in ids {
            let name = self.tree.key(key)?.name().to_string();
            self.keys.add(key, name);
        }
        Ok(())
    }

    /// Unregisters a key, and its descendants when `remove_subkeys` is set.
    ///
    /// Returns whether the key itself was registered.
    pub fn remove_key(&mut self, id: KeyId, remove_subkeys: bool) -> Result<bool> {
        let removed = self.keys.remove(id);
        if remove_subkeys && self.tree.contains(id) {
            for key in self.tree.walk(id)?.into_iter().skip(1) {
                self.keys.remove(key);
            }
        }
        Ok(removed)
    }

    /// Registered keys in write order.
    pub fn keys(&self) -> &KeyCollection {
        &self.keys
    }

    /// Finds a registered key by full path.
    pub fn find_key(&self, path: &str) -> Option<KeyId> {
        self.tree
            .find_path(path)
            .filter(|id| self.keys.contains(*id))
    }

    /// The key tree.
    pub fn tree(&self) -> &RegistryTree {
        &self.tree
    }

    /// The key tree, for editing.
    pub fn tree_mut(&mut self) -> &mut RegistryTree {
        &mut self.tree
    }

    /// Path the file was read from or last saved to.
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Encoding used when saving.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Changes the encoding used when saving.
    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    /// Header the file was read with.
    pub fn version(&self) -> FileVersion {
        self.version
    }

    /// Plain view of the registered live keys and their set values.
    pub fn snapshot(&self) -> Vec<KeySnapshot> {
        self.keys
            .ids()
            .filter_map(|id| {
                let node = self.tree.key(id).ok()?;
                let path = self.tree.full_path(id).ok()?;
                let values = node
                    .values()
                    .exportable()
                    .map(|value| ValueSnapshot {
                        name: value.name().to_string(),
                        value_type: value.value_type().name(),
                        data: value.value_string(),
                        raw: value.raw().to_vec(),
                        marked_for_deletion: value.is_marked_for_deletion(),
                    })
                    .collect();
                Some(KeySnapshot {
                    path,
                    marked_for_deletion: node.is_marked_for_deletion(),
                    values,
                })
            })
            .collect()
    }
}
