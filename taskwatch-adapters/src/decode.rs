//! Decoding of textual column data into typed values.
//!
//! Executors fetch every column as text and decode it according to the SQL
//! type the driver reported for the column.

use std::borrow::Cow;

use taskwatch_types::{parse_timestamp, Value};

/// Convert a raw text cell from a fixed-size fetch buffer.
///
/// A cell that fills the whole buffer (`raw.len() >= max_len`) is reported
/// as possibly truncated. A multi-byte character cut off at the end of such
/// a cell is dropped instead of being replaced with U+FFFD.
pub fn cell_text(raw: &[u8], max_len: usize) -> (Cow<'_, str>, bool) {
    let truncated = raw.len() >= max_len;
    if truncated {
        if let Err(e) = std::str::from_utf8(raw) {
            // error_len() is None only for an incomplete trailing sequence
            if e.error_len().is_none() {
                return (String::from_utf8_lossy(&raw[..e.valid_up_to()]), true);
            }
        }
    }
    (String::from_utf8_lossy(raw), truncated)
}

/// Coarse SQL type of a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Bool,
    Timestamp,
    Text,
}

impl ColumnKind {
    /// Decode a raw text cell. `None` is SQL NULL.
    ///
    /// Cells that do not parse under the declared kind are kept as text
    /// rather than dropped.
    pub fn decode(&self, raw: Option<&str>) -> Value {
        let Some(raw) = raw else {
            return Value::Null;
        };

        let decoded = match self {
            ColumnKind::Integer => raw.trim().parse::<i64>().ok().map(Value::Int),
            ColumnKind::Float => raw.trim().parse::<f64>().ok().map(Value::Float),
            ColumnKind::Bool => match raw.trim() {
                "1" | "true" | "TRUE" => Some(Value::Bool(true)),
                "0" | "false" | "FALSE" => Some(Value::Bool(false)),
                _ => None,
            },
            ColumnKind::Timestamp => parse_timestamp(raw).map(Value::Timestamp),
            ColumnKind::Text => None,
        };

        decoded.unwrap_or_else(|| Value::Text(raw.to_string()))
    }
}
