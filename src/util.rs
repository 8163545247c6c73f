//! Utility functions shared across trajectory modules.
//!
//! Most of this module is lenient wire decoding: the remote service is backed
//! by a spreadsheet, so the same column can arrive as a string, a number, a
//! boolean or `null` depending on how a cell was typed.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::{Result, TrajectoryError};

/// Maximum config file size that will be read into memory (1 MB).
pub const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

/// Read a file into a string, refusing files larger than `max_size` bytes.
pub fn read_to_string_with_limit(path: &Path, max_size: u64) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| TrajectoryError::storage(path, e))?;

    let size = metadata.len();
    if size > max_size {
        return Err(TrajectoryError::config(format!(
            "File {} is too large ({} bytes, max {} bytes)",
            path.display(),
            size,
            max_size
        )));
    }

    fs::read_to_string(path).map_err(|e| TrajectoryError::storage(path, e))
}

/// Truncate a string to at most `max_chars` characters (not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// A cell value decoded without caring about its JSON type.
///
/// `null` and absent values become the empty string; numbers keep their
/// integer spelling when they have no fractional part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WireText(pub String);

impl WireText {
    /// Trimmed, lowercased view used for enumeration matching.
    pub fn normalized(&self) -> String {
        self.0.trim().to_lowercase()
    }
}

impl<'de> Deserialize<'de> for WireText {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Loose {
            Text(String),
            Int(i64),
            Float(f64),
            Flag(bool),
        }

        let text = match Option::<Loose>::deserialize(deserializer)? {
            None => String::new(),
            Some(Loose::Text(s)) => s,
            Some(Loose::Int(n)) => n.to_string(),
            Some(Loose::Float(f)) if f.fract() == 0.0 && f.is_finite() => {
                format!("{}", f as i64)
            }
            Some(Loose::Float(f)) => f.to_string(),
            Some(Loose::Flag(b)) => b.to_string(),
        };
        Ok(WireText(text))
    }
}

/// Deserialize any scalar as a trimmed string.
pub fn text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(WireText::deserialize(deserializer)?.0.trim().to_string())
}

/// Deserialize an optional free-text value; blank becomes `None`.
pub fn optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = text(deserializer)?;
    Ok((!value.is_empty()).then_some(value))
}

/// Deserialize a grade level (`3`, `"3"`, `"3.0"`); anything else is `None`.
pub fn grade<'de, D>(deserializer: D) -> std::result::Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(parse_grade(&WireText::deserialize(deserializer)?.0))
}

/// Parse a grade level leniently.
pub fn parse_grade(raw: &str) -> Option<u8> {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<u8>() {
        return Some(n);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && f.fract() == 0.0 && (0.0..=255.0).contains(f))
        .map(|f| f as u8)
}

/// Deserialize a spreadsheet boolean (`true`, `"TRUE"`, `"si"`, `1`, ...).
pub fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(parse_flag(&WireText::deserialize(deserializer)?.normalized()))
}

/// Parse a normalized boolean cell.
pub fn parse_flag(normalized: &str) -> bool {
    matches!(
        normalized,
        "true" | "1" | "si" | "sí" | "yes" | "x" | "verdadero"
    )
}
