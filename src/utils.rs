//! Utility functions for UTF-16 conversion and `.reg` text handling.

use crate::error::{RegistryError, Result};
use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::UTF_16LE;

/// Widest a hex list line may grow before it is continued.
pub const MAX_LINE_WIDTH: usize = 77;

/// Line continuation written between wrapped hex list lines.
pub const LINE_CONTINUATION: &str = "\\\r\n  ";

/// Width of the indent that starts every continued line.
const CONTINUATION_INDENT: usize = 2;

/// Encodes a string as UTF-16LE bytes, without a terminator.
pub fn encode_utf16(s: &str) -> Vec<u8> {
    let units: Vec<u16> = s.encode_utf16().collect();
    units_to_bytes(&units)
}

/// Packs UTF-16 code units into little-endian bytes.
pub fn units_to_bytes(units: &[u16]) -> Vec<u8> {
    let mut bytes = vec![0u8; units.len() * 2];
    LittleEndian::write_u16_into(units, &mut bytes);
    bytes
}

/// Unpacks little-endian bytes into UTF-16 code units.
///
/// Returns `None` if the byte count is odd.
pub fn bytes_to_units(data: &[u8]) -> Option<Vec<u16>> {
    if data.len() % 2 != 0 {
        return None;
    }
    let mut units = vec![0u16; data.len() / 2];
    LittleEndian::read_u16_into(data, &mut units);
    Some(units)
}

/// Reads a UTF-16LE string, replacing unpaired surrogates.
///
/// Returns `None` if the byte count is odd. Nothing is trimmed.
pub fn read_utf16_string(data: &[u8]) -> Option<String> {
    if data.len() % 2 != 0 {
        return None;
    }
    let (decoded, _had_errors) = UTF_16LE.decode_without_bom_handling(data);
    Some(decoded.into_owned())
}

/// Reads a UTF-16LE string, failing on any malformed sequence.
pub fn read_utf16_exact(data: &[u8]) -> Option<String> {
    UTF_16LE
        .decode_without_bom_handling_and_without_replacement(data)
        .map(|decoded| decoded.into_owned())
}

/// Formats bytes as a comma separated hex list, wrapped the way regedit does.
///
/// `prefix_width` is the number of characters already on the first line
/// (for example `"Name"=hex:`). Every byte but the last is written as `hh,`.
/// A token that would push a non-empty line past [`MAX_LINE_WIDTH`] starts a
/// continued line instead.
///
/// ```rust
/// # use reg_file::utils::format_hex_list;
/// assert_eq!(format_hex_list(10, &[0x01, 0xab]), "01,ab");
/// assert_eq!(format_hex_list(76, &[0x01, 0x02]), "01,\\\r\n  02");
/// ```
pub fn format_hex_list(prefix_width: usize, data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3 + 8);
    let mut width = prefix_width;
    let mut on_line = 0usize;

    for (i, byte) in data.iter().enumerate() {
        let token_width = if i + 1 == data.len() { 2 } else { 3 };
        if on_line > 0 && width + token_width > MAX_LINE_WIDTH {
            out.push_str(LINE_CONTINUATION);
            width = CONTINUATION_INDENT;
            on_line = 0;
        }
        out.push_str(&hex::encode([*byte]));
        if token_width == 3 {
            out.push(',');
        }
        width += token_width;
        on_line += 1;
    }

    out
}

/// Parses a comma separated hex list such as `01,ab, ff`.
///
/// Whitespace is ignored, single digit tokens are accepted and one trailing
/// comma is tolerated. `line` is used for error reporting.
pub fn parse_hex_list(text: &str, line: usize) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Ok(Vec::new());
    }

    let tokens: Vec<&str> = compact.split(',').collect();
    let mut bytes = Vec::with_capacity(tokens.len());

    for (i, token) in tokens.iter().enumerate() {
        if token.is_empty() {
            if i + 1 == tokens.len() {
                break;
            }
            return Err(RegistryError::invalid_file(line, "empty byte in hex list"));
        }
        let padded = match token.len() {
            1 => format!("0{}", token),
            2 => token.to_string(),
            _ => {
                return Err(RegistryError::invalid_file(
                    line,
                    format!("invalid byte '{}' in hex list", token),
                ))
            }
        };
        let decoded = hex::decode(&padded).map_err(|e| {
            RegistryError::invalid_file(line, format!("invalid byte '{}' in hex list: {}", token, e))
        })?;
        bytes.extend_from_slice(&decoded);
    }

    Ok(bytes)
}

/// Escapes backslashes and double quotes for a quoted `.reg` string.
pub fn escape_reg_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Splits a leading quoted string off `s`.
///
/// `s` must start with `"`. Returns the unescaped contents and the text after
/// the closing quote, or `None` if the string is not terminated.
pub fn split_quoted(s: &str) -> Option<(String, &str)> {
    let body = s.strip_prefix('"')?;
    let mut out = String::new();
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next()?;
                out.push(escaped);
            }
            '"' => return Some((out, &body[i + 1..])),
            _ => out.push(c),
        }
    }

    None
}

/// Removes a `;` comment from a logical line.
///
/// A `;` inside a quoted string is data and is kept.
pub fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if in_quotes {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quotes = false;
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == ';' {
            return &line[..i];
        }
    }

    line
}

/// Splits text into physical lines on CRLF, LF or a lone CR.
pub fn physical_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    if start < bytes.len() {
        lines.push(&text[start..]);
    }

    lines
}

/// Joins continued lines into logical lines.
///
/// A physical line ending in `\` is joined with the next one, dropping the
/// backslash and the line break. Each logical line carries the 1-based number
/// of the physical line it starts on.
///
/// Joining runs before comments are stripped, so a comment line ending in `\`
/// swallows the line after it, as regedit does.
pub fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (index, raw) in physical_lines(text).into_iter().enumerate() {
        let (number, mut current) = match pending.take() {
            Some(open) => open,
            None => (index + 1, String::new()),
        };

        match raw.strip_suffix('\\') {
            Some(head) => {
                current.push_str(head);
                pending = Some((number, current));
            }
            None => {
                current.push_str(raw);
                out.push((number, current));
            }
        }
    }

    if let Some(open) = pending {
        out.push(open);
    }

    out
}
