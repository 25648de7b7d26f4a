//! Fixed-capacity, time-indexed circular buffer for numeric metrics
//!
//! A `CircularBuffer` is a ring of time buckets (rows) crossed with named
//! metrics (columns). Each cell holds an `f64`; NaN marks a cell that has
//! never been written or was cleared when the window advanced. Writes land
//! in the bucket their timestamp falls into, combined according to the
//! column's aggregation policy, and may additionally be recorded in a
//! sparse delta log for later merging across independently maintained
//! buffers.
//!
//! Key constraints:
//! - Fixed dimensions: all storage is sized once at construction
//! - No interior mutability and no locking; `&mut self` is the contract
//! - Serialization streams to any `core::fmt::Write` sink
//!
//! ```
//! use cbuf_core::{Aggregation, CircularBuffer};
//!
//! // 1440 one-minute buckets, three metrics
//! let mut cb = CircularBuffer::new(1440, 3, 60, false).unwrap();
//! cb.set_header(2, "failures", "count", Aggregation::Sum).unwrap();
//!
//! // Timestamps are nanoseconds since epoch
//! assert_eq!(cb.add(61e9, 2, 1.0).unwrap(), Some(1.0));
//! assert_eq!(cb.add(61e9, 2, 1.0).unwrap(), Some(2.0));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

// Macros for optional logging
#[cfg(feature = "log")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "log")]
macro_rules! log_trace {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

pub mod buffer;
pub mod delta;
pub mod errors;
pub mod header;
pub mod serialize;

mod grid;

// Public API
pub use buffer::CircularBuffer;
pub use delta::DeltaLog;
pub use errors::{BufferError, BufferResult};
pub use header::{Aggregation, ColumnHeader};
pub use serialize::OutputFormat;

/// Crate version, informational only
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
