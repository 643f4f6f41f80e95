//! Text encodings of `.reg` files.
//!
//! regedit writes version 5 files as UTF-16LE with a byte order mark and
//! `REGEDIT4` files in the ANSI code page. Hand-written files are usually
//! UTF-8. The encoding found on read is kept so a save writes the same kind
//! of file back.

use crate::utils::encode_utf16;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use tracing::warn;

/// Byte encoding of a `.reg` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextEncoding {
    /// UTF-8 without a byte order mark.
    #[default]
    Utf8,
    /// UTF-8 with a byte order mark.
    Utf8Bom,
    /// UTF-16 little-endian with a byte order mark.
    Utf16Le,
    /// Windows-1252, the usual ANSI code page of `REGEDIT4` exports.
    Windows1252,
}

impl TextEncoding {
    /// Display name of the encoding.
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf8Bom => "UTF-8 (BOM)",
            TextEncoding::Utf16Le => "UTF-16LE",
            TextEncoding::Windows1252 => "windows-1252",
        }
    }

    /// Decodes file contents, detecting the encoding.
    ///
    /// A byte order mark wins. Without one, valid UTF-8 is read as UTF-8 and
    /// anything else as Windows-1252. A big-endian UTF-16 file is decoded but
    /// reported as [`TextEncoding::Utf16Le`], the form it is saved in.
    pub fn decode(bytes: &[u8]) -> (String, TextEncoding) {
        if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
            let body = &bytes[bom_len..];
            let (text, _had_errors) = encoding.decode_without_bom_handling(body);
            let detected = if encoding == UTF_8 {
                TextEncoding::Utf8Bom
            } else if encoding == UTF_16LE || encoding == UTF_16BE {
                TextEncoding::Utf16Le
            } else {
                TextEncoding::Utf8
            };
            return (text.into_owned(), detected);
        }

        match std::str::from_utf8(bytes) {
            Ok(text) => (text.to_string(), TextEncoding::Utf8),
            Err(_) => {
                let (text, _had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
                (text.into_owned(), TextEncoding::Windows1252)
            }
        }
    }

    /// Encodes text for writing, adding a byte order mark where the encoding
    /// has one.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Utf8Bom => {
                let mut out = Vec::with_capacity(text.len() + 3);
                out.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
                out.extend_from_slice(text.as_bytes());
                out
            }
            TextEncoding::Utf16Le => {
                let mut out = Vec::with_capacity(text.len() * 2 + 2);
                out.extend_from_slice(&[0xFF, 0xFE]);
                out.extend(encode_utf16(text));
                out
            }
            TextEncoding::Windows1252 => {
                let (bytes, _, had_unmappable) = WINDOWS_1252.encode(text);
                if had_unmappable {
                    warn!("characters outside windows-1252 were replaced");
                }
                bytes.into_owned()
            }
        }
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_utf16le() {
        let bytes = TextEncoding::Utf16Le.encode("REGEDIT4");
        assert_eq!(&bytes[..4], &[0xFF, 0xFE, b'R', 0]);
        assert_eq!(
            TextEncoding::decode(&bytes),
            ("REGEDIT4".to_string(), TextEncoding::Utf16Le)
        );
    }

    #[test]
    fn test_detect_utf8_bom_and_plain() {
        let bytes = TextEncoding::Utf8Bom.encode("é");
        assert_eq!(TextEncoding::decode(&bytes), ("é".to_string(), TextEncoding::Utf8Bom));
        assert_eq!(TextEncoding::decode("é".as_bytes()).1, TextEncoding::Utf8);
    }

    #[test]
    fn test_fallback_windows1252() {
        let (text, encoding) = TextEncoding::decode(&[b'c', b'a', b'f', 0xE9]);
        assert_eq!(text, "café");
        assert_eq!(encoding, TextEncoding::Windows1252);
        assert_eq!(TextEncoding::Windows1252.encode("café"), vec![b'c', b'a', b'f', 0xE9]);
    }
}
