//! Error Types for Buffer Contract Violations
//!
//! ## Design Philosophy
//!
//! The buffer draws a hard line between two failure classes:
//!
//! 1. **Contract violations** (this module): bad dimensions, an out-of-range
//!    column, an unknown keyword, malformed decode input. These are caller
//!    bugs and surface as `Err(BufferError)`.
//!
//! 2. **Window misses**: a timestamp outside the retained window, or a
//!    future timestamp on a read path. These are normal outcomes, not
//!    errors - operations report them as `Ok(None)` and never touch this
//!    type.
//!
//! Errors are kept small and `Copy` with inline context fields; no heap
//! allocation, no `String`. A decode failure (`TooFewValues`,
//! `TooManyValues`, `MalformedInput`, `InvalidDelta`) can leave the grid
//! partially populated - callers must discard the buffer after one.

use thiserror_no_std::Error;

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Contract violations reported by buffer operations
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum BufferError {
    /// Buffer must retain at least two rows
    #[error("rows must be > 1, got {rows}")]
    InvalidRows {
        /// The rejected row count
        rows: u32,
    },

    /// Buffer must have at least one column
    #[error("columns must be > 0")]
    InvalidColumns,

    /// Each row must cover at least one second
    #[error("seconds_per_row must be > 0")]
    InvalidSecondsPerRow,

    /// 1-based column index outside `[1, columns]`
    #[error("column {column} out of range [1, {columns}]")]
    ColumnOutOfRange {
        /// The rejected 1-based index
        column: u32,
        /// Number of columns in the buffer
        columns: u32,
    },

    /// Aggregation keyword was not one of `sum`, `min`, `max`, `none`
    #[error("unknown aggregation method")]
    UnknownAggregation,

    /// Output format keyword was not recognized
    #[error("unknown output format")]
    UnknownFormat,

    /// Range query with `end` before `start`
    #[error("range end must be >= start")]
    InvalidRange,

    /// Decode input ended before the grid was fully populated
    #[error("too few values: got {got}, expected {expected}")]
    TooFewValues {
        /// Values consumed before input ran out
        got: usize,
        /// `rows * columns`
        expected: usize,
    },

    /// Decode input carried values beyond the grid size
    #[error("too many values, more than {expected}")]
    TooManyValues {
        /// `rows * columns`
        expected: usize,
    },

    /// Decode input ended inside a delta record
    #[error("incomplete delta record")]
    InvalidDelta,

    /// Decode input could not be parsed
    #[error("malformed input")]
    MalformedInput,

    /// The serialization sink reported a write failure
    #[error("output sink error")]
    Sink,
}

impl From<core::fmt::Error> for BufferError {
    fn from(_: core::fmt::Error) -> Self {
        BufferError::Sink
    }
}
