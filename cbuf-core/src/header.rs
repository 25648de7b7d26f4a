//! Column Metadata: Names, Unit Labels, and Aggregation Policy
//!
//! Every column carries a short name, a unit label, and the policy that
//! governs how repeated writes to the same cell combine. Names and units
//! are stored inline in fixed-capacity `heapless` strings so a header array
//! never reallocates after construction.
//!
//! Free-form input is sanitized rather than rejected: a name keeps only
//! ASCII alphanumerics (anything else becomes `_`), a unit additionally
//! keeps `/` and `*`. Both are truncated to their bounded length. This is
//! the one place the buffer silently corrects input; everything else that
//! is malformed is a hard error.

use core::str::FromStr;

use alloc::format;

use crate::errors::BufferError;

/// Maximum stored length of a column name, in characters
pub const COLUMN_NAME_LEN: usize = 15;

/// Maximum stored length of a unit label, in characters
pub const UNIT_LABEL_LEN: usize = 7;

/// Unit label applied when none is given
pub const DEFAULT_UNIT: &str = "count";

/// How repeated writes to the same cell combine
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Values accumulate; the cell holds a running total
    Sum,
    /// The cell keeps the smallest value ever set
    Min,
    /// The cell keeps the largest value ever set
    Max,
    /// No combining semantics; last write wins
    None,
}

impl Aggregation {
    /// Keyword form used in the text formats
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::None => "none",
        }
    }
}

impl FromStr for Aggregation {
    type Err = BufferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(Aggregation::Sum),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "none" => Ok(Aggregation::None),
            _ => Err(BufferError::UnknownAggregation),
        }
    }
}

/// Per-column metadata
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    name: heapless::String<COLUMN_NAME_LEN>,
    unit: heapless::String<UNIT_LABEL_LEN>,
    aggregation: Aggregation,
}

impl ColumnHeader {
    /// Builds a header from free-form input, sanitizing name and unit
    ///
    /// An empty unit falls back to [`DEFAULT_UNIT`].
    pub fn new(name: &str, unit: &str, aggregation: Aggregation) -> Self {
        let unit = if unit.is_empty() { DEFAULT_UNIT } else { unit };
        Self {
            name: sanitize_name(name),
            unit: sanitize_unit(unit),
            aggregation,
        }
    }

    /// Default header for the given 1-based column index
    pub(crate) fn column(index: u32) -> Self {
        Self::new(&format!("Column_{index}"), DEFAULT_UNIT, Aggregation::Sum)
    }

    /// Sanitized column name
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Sanitized unit label
    pub fn unit(&self) -> &str {
        self.unit.as_str()
    }

    /// Aggregation policy
    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }
}

fn sanitize_name(raw: &str) -> heapless::String<COLUMN_NAME_LEN> {
    let mut out = heapless::String::new();
    for ch in raw.chars().take(COLUMN_NAME_LEN) {
        let ch = if ch.is_ascii_alphanumeric() { ch } else { '_' };
        // Every sanitized char is one byte and the input is capped at
        // capacity, so this push cannot fail.
        let _ = out.push(ch);
    }
    out
}

fn sanitize_unit(raw: &str) -> heapless::String<UNIT_LABEL_LEN> {
    let mut out = heapless::String::new();
    for ch in raw.chars().take(UNIT_LABEL_LEN) {
        let ch = if ch.is_ascii_alphanumeric() || ch == '/' || ch == '*' {
            ch
        } else {
            '_'
        };
        let _ = out.push(ch);
    }
    out
}
