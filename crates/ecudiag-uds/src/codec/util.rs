//! Byte-level helpers for frames and diagnostic payloads

use std::fmt::Write as _;

/// Position of the first occurrence of `needle` in `haystack`
///
/// An empty needle never matches.
pub fn index_of(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

pub fn starts_with(data: &[u8], prefix: &[u8]) -> bool {
    data.starts_with(prefix)
}

pub fn ends_with(data: &[u8], suffix: &[u8]) -> bool {
    data.ends_with(suffix)
}

pub fn u32_to_be_bytes(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

/// Big-endian `u32` from exactly four bytes
pub fn u32_from_be_bytes(bytes: &[u8]) -> Option<u32> {
    let array: [u8; 4] = bytes.try_into().ok()?;
    Some(u32::from_be_bytes(array))
}

/// Number of (possibly overlapping) occurrences of `marker` in `data`
pub fn count_occurrences(data: &[u8], marker: &[u8]) -> usize {
    if marker.is_empty() || data.len() < marker.len() {
        return 0;
    }
    data.windows(marker.len())
        .filter(|window| *window == marker)
        .count()
}

/// Whether more than one frame starting with `marker` was read at once
pub fn is_concatenated(data: &[u8], marker: &[u8]) -> bool {
    count_occurrences(data, marker) > 1
}

/// Slice starting at the last occurrence of `marker`
pub fn extract_last_frame<'a>(data: &'a [u8], marker: &[u8]) -> Option<&'a [u8]> {
    if marker.is_empty() || data.len() < marker.len() {
        return None;
    }
    data.windows(marker.len())
        .rposition(|window| window == marker)
        .map(|start| &data[start..])
}

/// Parse hex text such as `"10 03"`, `"1003"` or `"0x10 0x03"`
pub fn hex_to_bytes(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let clean: String = text
        .split_whitespace()
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token)
        })
        .collect();
    hex::decode(clean)
}

/// Lowercase hex, one space between bytes
pub fn bytes_to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Offset-prefixed hex dump, `bytes_per_line` bytes per line
pub fn hex_dump(data: &[u8], bytes_per_line: usize) -> Vec<String> {
    let width = bytes_per_line.max(1);
    data.chunks(width)
        .enumerate()
        .map(|(i, chunk)| format!("0x{:04x}: {}", i * width, bytes_to_hex(chunk)))
        .collect()
}

/// Printable ASCII kept as is, everything else as `\xNN`
pub fn bytes_to_ascii_escaped(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &byte in data {
        if (0x20..=0x7E).contains(&byte) {
            out.push(byte as char);
        } else {
            let _ = write!(out, "\\x{:02x}", byte);
        }
    }
    out
}
