//! Sparse Delta Log for Incremental Change Tracking
//!
//! The delta log records incremental changes separately from the dense
//! grid: a nested map of row timestamp (whole seconds) to column index to
//! accumulated delta. It exists so several independently maintained buffers
//! covering the same timestamps can later be merged by replaying their
//! deltas, without shipping full grids around.
//!
//! The log's lifetime is independent of the grid's: an entry can outlive
//! its grid row (the row may have been overwritten or cleared by a window
//! advance) and there is no size bound tied to the row count. Entries
//! accumulate until a drain, which serialization performs as a side effect.
//!
//! `BTreeMap` is used for both levels so drained entries come out ascending
//! by timestamp, then by column index, which the delta text format relies
//! on.

use alloc::collections::BTreeMap;

/// Drained log contents: timestamp to column index to accumulated delta
pub type DeltaEntries = BTreeMap<i64, BTreeMap<u32, f64>>;

/// Time-keyed, column-keyed store of accumulated deltas
#[derive(Debug, Clone, Default)]
pub struct DeltaLog {
    entries: DeltaEntries,
}

impl DeltaLog {
    /// Creates an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` to the delta for `(time, column)`, creating the nested
    /// entry if absent. Deltas accumulate across repeated writes until the
    /// log is drained.
    pub fn record(&mut self, time: i64, column: u32, value: f64) {
        let row = self.entries.entry(time).or_default();
        let cell = row.entry(column).or_insert(0.0);
        *cell += value;
    }

    /// True when nothing has been recorded since the last drain
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct timestamps currently held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns all entries, ascending by timestamp then column, and leaves
    /// the log empty
    pub fn drain(&mut self) -> DeltaEntries {
        core::mem::take(&mut self.entries)
    }
}
