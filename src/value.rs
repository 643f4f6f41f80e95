//! Registry values: typed data, canonical byte encoding and `.reg` export.

use crate::error::{RegistryError, Result};
use crate::key::KeyId;
use crate::utils::{
    bytes_to_units, encode_utf16, escape_reg_string, format_hex_list, read_utf16_exact,
    read_utf16_string, units_to_bytes,
};
use crate::value_type::ValueType;
use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Typed registry value data.
///
/// This is the form values are created and updated from. It converts to and
/// from the canonical byte buffer a [`RegistryValue`] stores.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueData {
    /// String value.
    String(String),

    /// String with `%VARIABLE%` references.
    ExpandString(String),

    /// Binary data.
    Binary(Vec<u8>),

    /// 32-bit integer.
    Dword(u32),

    /// Multiple strings.
    MultiString(Vec<String>),
}

impl ValueData {
    /// Returns the registry type of this data.
    pub fn value_type(&self) -> ValueType {
        match self {
            ValueData::String(_) => ValueType::String,
            ValueData::ExpandString(_) => ValueType::ExpandString,
            ValueData::Binary(_) => ValueType::Binary,
            ValueData::Dword(_) => ValueType::Dword,
            ValueData::MultiString(_) => ValueType::MultiString,
        }
    }

    /// Encodes the data into its canonical byte buffer.
    ///
    /// Strings become UTF-16LE with a terminating zero unit, and each `\n`
    /// is stored as a zero unit.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ValueData::String(s) | ValueData::ExpandString(s) => encode_string(s),
            ValueData::Binary(bytes) => bytes.clone(),
            ValueData::Dword(d) => {
                let mut buf = [0u8; 4];
                LittleEndian::write_u32(&mut buf, *d);
                buf.to_vec()
            }
            ValueData::MultiString(strings) => {
                let mut units = Vec::new();
                for s in strings {
                    units.extend(s.encode_utf16());
                    units.push(0);
                }
                units.push(0);
                units_to_bytes(&units)
            }
        }
    }

    /// Decodes a canonical byte buffer of the given type.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedValueType` for types outside the five supported
    /// kinds and `FormatMismatch` if the bytes do not fit the type.
    pub fn decode(value_type: ValueType, raw: &[u8]) -> Result<Self> {
        match value_type {
            ValueType::String => Ok(ValueData::String(decode_string(value_type, raw)?)),
            ValueType::ExpandString => {
                Ok(ValueData::ExpandString(decode_string(value_type, raw)?))
            }
            ValueType::Binary => Ok(ValueData::Binary(raw.to_vec())),
            ValueType::Dword => Ok(ValueData::Dword(decode_dword(raw)?)),
            ValueType::MultiString => Ok(ValueData::MultiString(decode_multi_string(raw)?)),
            other => Err(RegistryError::UnsupportedValueType(other)),
        }
    }
}

impl From<&str> for ValueData {
    fn from(s: &str) -> Self {
        ValueData::String(s.to_string())
    }
}

impl From<String> for ValueData {
    fn from(s: String) -> Self {
        ValueData::String(s)
    }
}

impl From<u32> for ValueData {
    fn from(d: u32) -> Self {
        ValueData::Dword(d)
    }
}

impl From<i32> for ValueData {
    fn from(d: i32) -> Self {
        ValueData::Dword(d as u32)
    }
}

impl From<Vec<u8>> for ValueData {
    fn from(bytes: Vec<u8>) -> Self {
        ValueData::Binary(bytes)
    }
}

impl From<&[u8]> for ValueData {
    fn from(bytes: &[u8]) -> Self {
        ValueData::Binary(bytes.to_vec())
    }
}

impl From<Vec<String>> for ValueData {
    fn from(strings: Vec<String>) -> Self {
        ValueData::MultiString(strings)
    }
}

fn encode_string(s: &str) -> Vec<u8> {
    let mut units: Vec<u16> = s
        .encode_utf16()
        .map(|unit| if unit == u16::from(b'\n') { 0 } else { unit })
        .collect();
    units.push(0);
    units_to_bytes(&units)
}

fn decode_string(value_type: ValueType, raw: &[u8]) -> Result<String> {
    if raw.len() % 2 != 0 {
        return Err(RegistryError::format_mismatch(
            value_type,
            format!("odd byte length {}", raw.len()),
        ));
    }
    let body = if raw.ends_with(&[0, 0]) {
        &raw[..raw.len() - 2]
    } else {
        raw
    };
    let text = read_utf16_string(body).unwrap_or_default();
    Ok(text.replace('\0', "\r\n"))
}

fn decode_dword(raw: &[u8]) -> Result<u32> {
    if raw.len() != 4 {
        return Err(RegistryError::format_mismatch(
            ValueType::Dword,
            format!("expected 4 bytes, found {}", raw.len()),
        ));
    }
    Ok(LittleEndian::read_u32(raw))
}

fn decode_multi_string(raw: &[u8]) -> Result<Vec<String>> {
    let text = decode_string(ValueType::MultiString, raw)?;
    let mut strings: Vec<String> = text
        .split('\n')
        .map(|part| part.strip_suffix('\r').unwrap_or(part).to_string())
        .collect();
    if strings.last().map_or(false, |last| last.is_empty()) {
        strings.pop();
    }
    Ok(strings)
}

/// True if the bytes are a terminated UTF-16LE string that can be written
/// between quotes and read back unchanged.
fn is_clean_string(raw: &[u8]) -> bool {
    let Some(units) = bytes_to_units(raw) else {
        return false;
    };
    match units.split_last() {
        Some((&0, body)) => {
            !body
                .iter()
                .any(|&u| u == 0 || u == u16::from(b'\r') || u == u16::from(b'\n'))
                && read_utf16_exact(&raw[..raw.len() - 2]).is_some()
        }
        _ => false,
    }
}

/// A named value stored in a registry key.
///
/// The value keeps its data as the canonical byte buffer of its type. Typed
/// accessors decode on demand and report malformed bytes as `FormatMismatch`.
#[derive(Debug, Clone)]
pub struct RegistryValue {
    name: String,
    value_type: ValueType,
    raw: Vec<u8>,
    parent: KeyId,
    marked_for_deletion: bool,
    placeholder: bool,
}

impl RegistryValue {
    /// Creates a value from typed data.
    pub fn new(parent: KeyId, name: impl Into<String>, data: ValueData) -> Self {
        Self {
            name: name.into(),
            value_type: data.value_type(),
            raw: data.encode(),
            parent,
            marked_for_deletion: false,
            placeholder: false,
        }
    }

    /// Creates a value from raw bytes, as read from a file or a live registry.
    ///
    /// The bytes are not validated.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedValueType` for types outside the five supported kinds.
    pub fn from_raw(
        parent: KeyId,
        name: impl Into<String>,
        value_type: ValueType,
        raw: Vec<u8>,
    ) -> Result<Self> {
        if !value_type.is_supported() {
            return Err(RegistryError::UnsupportedValueType(value_type));
        }
        Ok(Self {
            name: name.into(),
            value_type,
            raw,
            parent,
            marked_for_deletion: false,
            placeholder: false,
        })
    }

    /// The unset default slot of a key.
    pub(crate) fn placeholder(parent: KeyId) -> Self {
        Self {
            placeholder: true,
            ..Self::new(parent, "", ValueData::String(String::new()))
        }
    }

    /// Value name. Empty for the default value.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared value type.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Canonical byte buffer.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Key that owns this value.
    pub fn parent(&self) -> KeyId {
        self.parent
    }

    /// Returns true for the default (unnamed) value.
    pub fn is_default(&self) -> bool {
        self.name.is_empty()
    }

    /// Returns false only for the unset default placeholder.
    pub fn is_set(&self) -> bool {
        !self.placeholder
    }

    /// Returns true if the value is exported as a deletion.
    pub fn is_marked_for_deletion(&self) -> bool {
        self.marked_for_deletion
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_parent(&mut self, parent: KeyId) {
        self.parent = parent;
    }

    pub(crate) fn set_marked_for_deletion(&mut self, marked: bool) {
        self.marked_for_deletion = marked;
    }

    /// Replaces the data, keeping the declared type.
    pub(crate) fn set_data(&mut self, data: &ValueData) -> Result<()> {
        if data.value_type() != self.value_type {
            return Err(RegistryError::format_mismatch(
                self.value_type,
                format!("cannot store {} data", data.value_type().name()),
            ));
        }
        self.raw = data.encode();
        self.placeholder = false;
        Ok(())
    }

    fn expect_type(&self, allowed: &[ValueType]) -> Result<()> {
        if allowed.contains(&self.value_type) {
            Ok(())
        } else {
            Err(RegistryError::format_mismatch(
                self.value_type,
                format!("value '{}' is not {}", self.name, allowed[0].name()),
            ))
        }
    }

    /// Decodes the value into typed data.
    pub fn data(&self) -> Result<ValueData> {
        ValueData::decode(self.value_type, &self.raw)
    }

    /// Reads a String or ExpandString value.
    pub fn as_string(&self) -> Result<String> {
        self.expect_type(&[ValueType::String, ValueType::ExpandString])?;
        decode_string(self.value_type, &self.raw)
    }

    /// Reads a Dword value as unsigned.
    pub fn as_dword(&self) -> Result<u32> {
        self.expect_type(&[ValueType::Dword])?;
        decode_dword(&self.raw)
    }

    /// Reads a Dword value as signed.
    pub fn as_signed_dword(&self) -> Result<i32> {
        self.as_dword().map(|d| d as i32)
    }

    /// Reads a Binary value.
    pub fn as_binary(&self) -> Result<&[u8]> {
        self.expect_type(&[ValueType::Binary])?;
        Ok(&self.raw)
    }

    /// Reads a MultiString value.
    pub fn as_multi_string(&self) -> Result<Vec<String>> {
        self.expect_type(&[ValueType::MultiString])?;
        decode_multi_string(&self.raw)
    }

    /// Substitutes the first `%NAME%` reference using the process environment.
    pub fn unexpand(&self) -> Result<String> {
        self.unexpand_with(|name| std::env::var(name).ok())
    }

    /// Substitutes the first `%NAME%` reference using `lookup`.
    ///
    /// Every occurrence of that token is replaced by the variable's value.
    ///
    /// # Errors
    ///
    /// `FormatMismatch` if the value is not an ExpandString, holds no
    /// reference, or the variable is unknown.
    pub fn unexpand_with<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.expect_type(&[ValueType::ExpandString])?;
        let text = self.as_string()?;
        let mismatch = |message: &str| RegistryError::format_mismatch(self.value_type, message);

        let start = text
            .find('%')
            .ok_or_else(|| mismatch("no environment variable reference"))?;
        let len = text[start + 1..]
            .find('%')
            .ok_or_else(|| mismatch("unterminated environment variable reference"))?;
        let name = &text[start + 1..start + 1 + len];
        if name.is_empty() {
            return Err(mismatch("empty environment variable reference"));
        }

        let expanded = lookup(name).ok_or_else(|| {
            RegistryError::format_mismatch(
                self.value_type,
                format!("environment variable '{}' not found", name),
            )
        })?;
        Ok(text.replace(&format!("%{}%", name), &expanded))
    }

    /// Replaces environment variable values with `%NAME%` references using
    /// the process environment.
    pub fn expand(&self) -> Result<String> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        self.expand_with(&vars)
    }

    /// Replaces each occurrence of a variable's value with `%NAME%`.
    ///
    /// Longer values are substituted first. Empty values are ignored.
    ///
    /// # Errors
    ///
    /// `FormatMismatch` if the value is not an ExpandString or nothing was
    /// replaced.
    pub fn expand_with(&self, vars: &HashMap<String, String>) -> Result<String> {
        self.expect_type(&[ValueType::ExpandString])?;
        let mut text = self.as_string()?;

        let mut ordered: Vec<(&String, &String)> =
            vars.iter().filter(|(_, value)| !value.is_empty()).collect();
        ordered.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

        let mut replaced = false;
        for (name, value) in ordered {
            if text.contains(value.as_str()) {
                text = text.replace(value.as_str(), &format!("%{}%", name));
                replaced = true;
            }
        }

        if !replaced {
            return Err(RegistryError::format_mismatch(
                self.value_type,
                "no suitable environment variable found",
            ));
        }
        Ok(text)
    }

    /// Human-readable form of the data.
    ///
    /// Undecodable bytes fall back to the hex form.
    pub fn value_string(&self) -> String {
        let hex_pairs = |raw: &[u8]| {
            if raw.is_empty() {
                "(zero-length binary value)".to_string()
            } else {
                raw.iter()
                    .map(|b| hex::encode([*b]))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        };

        match self.data() {
            Ok(ValueData::String(s)) | Ok(ValueData::ExpandString(s)) => s,
            Ok(ValueData::Dword(d)) => format!("0x{:08x} ({})", d, d),
            Ok(ValueData::MultiString(strings)) => strings.join(" "),
            Ok(ValueData::Binary(bytes)) => hex_pairs(&bytes),
            Err(_) => hex_pairs(&self.raw),
        }
    }

    /// Formats the value as a line of a `.reg` file, without the line break.
    ///
    /// ```rust
    /// # use reg_file::{KeyId, RegistryValue, ValueData};
    /// let value = RegistryValue::new(KeyId::from_raw(1), "Count", ValueData::Dword(0x2a));
    /// assert_eq!(value.format_for_export(), "\"Count\"=dword:0000002a");
    /// ```
    pub fn format_for_export(&self) -> String {
        let prefix = if self.name.is_empty() {
            "@=".to_string()
        } else {
            format!("\"{}\"=", escape_reg_string(&self.name))
        };

        if self.marked_for_deletion {
            return format!("{}-", prefix);
        }

        let with_hex = |tag: String| {
            let head = format!("{}{}:", prefix, tag);
            let list = format_hex_list(head.chars().count(), &self.raw);
            head + &list
        };

        match self.value_type {
            ValueType::String if is_clean_string(&self.raw) => {
                let text = read_utf16_exact(&self.raw[..self.raw.len() - 2]).unwrap_or_default();
                format!("{}\"{}\"", prefix, escape_reg_string(&text))
            }
            ValueType::Dword if self.raw.len() == 4 => {
                format!("{}dword:{:08x}", prefix, LittleEndian::read_u32(&self.raw))
            }
            other => with_hex(other.hex_tag()),
        }
    }

    /// Reads a Binary value as a string (UTF-16LE, trailing NULs trimmed).
    pub fn to_string_value(&self) -> Result<RegistryValue> {
        let bytes = self.binary_source()?;
        let text = read_utf16_string(&bytes[..bytes.len() - bytes.len() % 2])
            .unwrap_or_default()
            .trim_end_matches('\0')
            .to_string();
        Ok(self.converted(ValueData::String(text)))
    }

    /// Reads a Binary value of exactly four bytes as a Dword.
    pub fn to_dword_value(&self) -> Result<RegistryValue> {
        let bytes = self.binary_source()?;
        let dword = decode_dword(bytes)?;
        Ok(self.converted(ValueData::Dword(dword)))
    }

    /// Reads a Binary value as strings split on zero units.
    pub fn to_multi_string_value(&self) -> Result<RegistryValue> {
        let bytes = self.binary_source()?;
        let units = bytes_to_units(&bytes[..bytes.len() - bytes.len() % 2]).unwrap_or_default();
        let strings: Vec<String> = units
            .split(|&u| u == 0)
            .filter(|part| !part.is_empty())
            .map(String::from_utf16_lossy)
            .collect();
        Ok(self.converted(ValueData::MultiString(strings)))
    }

    fn binary_source(&self) -> Result<&[u8]> {
        if self.value_type != ValueType::Binary {
            return Err(RegistryError::format_mismatch(
                self.value_type,
                format!("only binary values can be converted, '{}' is not", self.name),
            ));
        }
        Ok(&self.raw)
    }

    fn converted(&self, data: ValueData) -> RegistryValue {
        RegistryValue {
            marked_for_deletion: self.marked_for_deletion,
            ..RegistryValue::new(self.parent, self.name.clone(), data)
        }
    }
}

impl PartialEq for RegistryValue {
    fn eq(&self, other: &Self) -> bool {
        self.parent == other.parent
            && self.name == other.name
            && self.value_type == other.value_type
            && self.raw == other.raw
    }
}

impl Eq for RegistryValue {}

impl Hash for RegistryValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parent.hash(state);
        self.name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> KeyId {
        KeyId::from_raw(7)
    }

    #[test]
    fn test_string_newline_becomes_crlf() {
        let value = RegistryValue::new(key(), "s", ValueData::from("a\nb"));
        assert_eq!(value.raw(), &[0x61, 0, 0, 0, 0x62, 0, 0, 0]);
        assert_eq!(value.as_string().unwrap(), "a\r\nb");
    }

    #[test]
    fn test_string_odd_length_is_mismatch() {
        let value = RegistryValue::from_raw(key(), "s", ValueType::String, vec![0x41]).unwrap();
        assert!(matches!(value.as_string(), Err(RegistryError::FormatMismatch { .. })));
    }

    #[test]
    fn test_dword_bounds() {
        for len in [3usize, 5] {
            let value =
                RegistryValue::from_raw(key(), "d", ValueType::Dword, vec![1; len]).unwrap();
            assert!(matches!(value.as_dword(), Err(RegistryError::FormatMismatch { .. })));
        }
        let value = RegistryValue::new(key(), "d", ValueData::from(-1i32));
        assert_eq!(value.as_dword().unwrap(), u32::MAX);
        assert_eq!(value.as_signed_dword().unwrap(), -1);
    }

    #[test]
    fn test_multi_string_roundtrip() {
        let strings = vec!["a".to_string(), "b".to_string()];
        let value = RegistryValue::new(key(), "m", ValueData::from(strings.clone()));
        assert_eq!(value.raw(), &[0x61, 0, 0, 0, 0x62, 0, 0, 0, 0, 0]);
        assert_eq!(value.as_multi_string().unwrap(), strings);

        let empty = RegistryValue::new(key(), "m", ValueData::MultiString(vec![]));
        assert!(empty.as_multi_string().unwrap().is_empty());
        let one_empty = RegistryValue::new(key(), "m", ValueData::MultiString(vec![String::new()]));
        assert_eq!(one_empty.as_multi_string().unwrap(), vec![String::new()]);
    }

    #[test]
    fn test_unsupported_raw_type() {
        let err = RegistryValue::from_raw(key(), "q", ValueType::Qword, vec![0; 8]).unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedValueType(ValueType::Qword)));
    }

    #[test]
    fn test_value_string() {
        let bin = RegistryValue::new(key(), "b", ValueData::from(vec![0x0a, 0xff]));
        assert_eq!(bin.value_string(), "0a ff");
        let empty = RegistryValue::new(key(), "b", ValueData::Binary(vec![]));
        assert_eq!(empty.value_string(), "(zero-length binary value)");
        let dword = RegistryValue::new(key(), "d", ValueData::Dword(255));
        assert_eq!(dword.value_string(), "0x000000ff (255)");
        let multi = RegistryValue::new(
            key(),
            "m",
            ValueData::MultiString(vec!["x".into(), "y".into()]),
        );
        assert_eq!(multi.value_string(), "x y");
    }

    #[test]
    fn test_export_string_and_default() {
        let value = RegistryValue::new(key(), "Path", ValueData::from(r"C:\a;C:\b"));
        assert_eq!(value.format_for_export(), r#""Path"="C:\\a;C:\\b""#);
        let default = RegistryValue::new(key(), "", ValueData::from("x"));
        assert_eq!(default.format_for_export(), "@=\"x\"");
    }

    #[test]
    fn test_export_multiline_string_as_hex() {
        let value = RegistryValue::new(key(), "s", ValueData::from("a\nb"));
        assert_eq!(value.format_for_export(), "\"s\"=hex(1):61,00,00,00,62,00,00,00");
    }

    #[test]
    fn test_export_hex_kinds() {
        let expand = RegistryValue::new(key(), "e", ValueData::ExpandString("%A%".into()));
        assert_eq!(
            expand.format_for_export(),
            "\"e\"=hex(2):25,00,41,00,25,00,00,00"
        );
        let bin = RegistryValue::new(key(), "b", ValueData::Binary(vec![1, 2]));
        assert_eq!(bin.format_for_export(), "\"b\"=hex:01,02");
        let bad = RegistryValue::from_raw(key(), "d", ValueType::Dword, vec![1, 2, 3]).unwrap();
        assert_eq!(bad.format_for_export(), "\"d\"=hex(4):01,02,03");
    }

    #[test]
    fn test_export_marked_for_deletion() {
        let mut value = RegistryValue::new(key(), "gone", ValueData::from("x"));
        value.set_marked_for_deletion(true);
        assert_eq!(value.format_for_export(), "\"gone\"=-");
    }

    #[test]
    fn test_unexpand_with_substitutes_token() {
        let value = RegistryValue::new(
            key(),
            "e",
            ValueData::ExpandString(r"%ROOT%\bin;%ROOT%\lib".into()),
        );
        let substituted = value
            .unexpand_with(|name| (name == "ROOT").then(|| r"C:\App".to_string()))
            .unwrap();
        assert_eq!(substituted, r"C:\App\bin;C:\App\lib");
        assert!(value.unexpand_with(|_| None).is_err());
        assert!(value.expand_with(&HashMap::new()).is_err());
    }

    #[test]
    fn test_expand_with_prefers_longest() {
        let value = RegistryValue::new(
            key(),
            "e",
            ValueData::ExpandString(r"C:\Users\me\bin".into()),
        );
        let mut vars = HashMap::new();
        vars.insert("DRIVE".to_string(), "C:".to_string());
        vars.insert("HOME".to_string(), r"C:\Users\me".to_string());
        assert_eq!(value.expand_with(&vars).unwrap(), r"%HOME%\bin");

        let empty: HashMap<String, String> = HashMap::new();
        assert!(value.expand_with(&empty).is_err());
    }

    #[test]
    fn test_binary_conversions() {
        let bin = RegistryValue::new(key(), "b", ValueData::Binary(vec![0x2a, 0, 0, 0]));
        assert_eq!(bin.to_dword_value().unwrap().as_dword().unwrap(), 42);

        let text = RegistryValue::new(key(), "b", ValueData::Binary(vec![0x68, 0, 0x69, 0, 0, 0]));
        assert_eq!(text.to_string_value().unwrap().as_string().unwrap(), "hi");

        let multi = RegistryValue::new(
            key(),
            "b",
            ValueData::Binary(vec![0x61, 0, 0, 0, 0x62, 0, 0, 0, 0, 0]),
        );
        assert_eq!(
            multi.to_multi_string_value().unwrap().as_multi_string().unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );

        let not_binary = RegistryValue::new(key(), "s", ValueData::from("x"));
        assert!(not_binary.to_dword_value().is_err());
        let short = RegistryValue::new(key(), "b", ValueData::Binary(vec![1, 2]));
        assert!(short.to_dword_value().is_err());
    }

    #[test]
    fn test_equality_and_placeholder() {
        let a = RegistryValue::new(key(), "x", ValueData::Dword(1));
        let b = RegistryValue::new(key(), "x", ValueData::Dword(1));
        let c = RegistryValue::new(KeyId::from_raw(8), "x", ValueData::Dword(1));
        assert_eq!(a, b);
        assert_ne!(a, c);

        let placeholder = RegistryValue::placeholder(key());
        assert!(!placeholder.is_set());
        assert!(placeholder.is_default());
        assert_eq!(placeholder.raw(), &[0, 0]);
    }
}
