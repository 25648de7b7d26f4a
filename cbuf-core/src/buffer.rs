//! Time-Indexed Circular Buffer Engine
//!
//! ## Overview
//!
//! `CircularBuffer` maps wall-clock time onto a fixed ring of rows. Each
//! row is one time bucket covering `seconds_per_row` seconds; each column
//! is one named metric. The buffer tracks the most recently written bucket
//! with a `(current_time, current_row)` cursor, and the retained window is
//! the `rows` buckets ending at `current_time`.
//!
//! ## Time-to-row mapping
//!
//! A nanosecond timestamp is truncated to whole seconds and row-aligned.
//! Dividing the aligned time by `seconds_per_row` gives an absolute row
//! number; the physical row is that number modulo `rows`:
//!
//! ```text
//! rows = 4, seconds_per_row = 60
//!
//! absolute row:   5    6    7    8
//!                 |    |    |    |
//! physical row: [ 1 ][ 2 ][ 3 ][ 0 ]   current_row = 0, current_time = 480
//! ```
//!
//! Writes ahead of `current_time` advance the window: every bucket between
//! the old cursor and the new one is cleared to NaN (see
//! [`crate::grid`] for the amortized bulk clear). Writes behind the window
//! and reads outside it are window misses, reported as `None` rather than
//! as errors.
//!
//! ## Concurrency
//!
//! There is none. Every mutating operation takes `&mut self` and runs to
//! completion; a multi-threaded caller provides its own mutual exclusion
//! per buffer instance.

use alloc::vec::Vec;

use crate::delta::DeltaLog;
use crate::errors::{BufferError, BufferResult};
use crate::grid::Grid;
use crate::header::{Aggregation, ColumnHeader};
use crate::serialize::OutputFormat;

const NANOS_PER_SEC: f64 = 1e9;

/// Fixed-capacity time-indexed grid of metric values
///
/// See the [module docs](self) for the time-to-row mapping. Dimensions and
/// delta tracking are immutable after construction; only the output format
/// can be changed later.
#[derive(Debug, Clone)]
pub struct CircularBuffer {
    pub(crate) rows: u32,
    pub(crate) columns: u32,
    pub(crate) seconds_per_row: u32,
    /// Row-aligned time of the most recently written bucket, in seconds
    pub(crate) current_time: i64,
    /// Physical row holding the `current_time` bucket
    pub(crate) current_row: u32,
    pub(crate) delta_enabled: bool,
    pub(crate) format: OutputFormat,
    pub(crate) grid: Grid,
    pub(crate) headers: Vec<ColumnHeader>,
    pub(crate) delta: DeltaLog,
}

impl CircularBuffer {
    /// Creates a buffer of `rows` buckets by `columns` metrics, each bucket
    /// covering `seconds_per_row` seconds, with every cell NaN and default
    /// column headers (`Column_<i>`, unit `count`, aggregation `Sum`).
    ///
    /// The cursor starts at `current_time = seconds_per_row * (rows - 1)`
    /// so the initial window covers time zero.
    ///
    /// `delta_enabled` turns on the delta log for the buffer's lifetime.
    pub fn new(
        rows: u32,
        columns: u32,
        seconds_per_row: u32,
        delta_enabled: bool,
    ) -> BufferResult<Self> {
        if rows <= 1 {
            return Err(BufferError::InvalidRows { rows });
        }
        if columns == 0 {
            return Err(BufferError::InvalidColumns);
        }
        if seconds_per_row == 0 {
            return Err(BufferError::InvalidSecondsPerRow);
        }

        Ok(Self {
            rows,
            columns,
            seconds_per_row,
            current_time: i64::from(seconds_per_row) * (i64::from(rows) - 1),
            current_row: rows - 1,
            delta_enabled,
            format: OutputFormat::Full,
            grid: Grid::new(rows, columns),
            headers: (1..=columns).map(ColumnHeader::column).collect(),
            delta: DeltaLog::new(),
        })
    }

    /// Buffer dimensions as `(rows, columns, seconds_per_row)`
    pub fn get_configuration(&self) -> (u32, u32, u32) {
        (self.rows, self.columns, self.seconds_per_row)
    }

    /// Time of the most recently written bucket, in nanoseconds
    pub fn current_time(&self) -> f64 {
        self.current_time as f64 * NANOS_PER_SEC
    }

    /// Whether this buffer records deltas
    pub fn delta_enabled(&self) -> bool {
        self.delta_enabled
    }

    /// Selects the serialization format, returning the buffer for chaining
    pub fn format(&mut self, format: OutputFormat) -> &mut Self {
        self.format = format;
        self
    }

    /// Oldest representable bucket time, in seconds
    pub(crate) fn start_time(&self) -> i64 {
        self.current_time - i64::from(self.seconds_per_row) * (i64::from(self.rows) - 1)
    }

    /// Truncates a nanosecond timestamp to whole seconds and row-aligns it
    pub(crate) fn align(&self, ns: f64) -> i64 {
        let t = (ns / NANOS_PER_SEC) as i64;
        t - t % i64::from(self.seconds_per_row)
    }

    /// Aligned time, row-number delta from the cursor, and physical row
    fn locate(&self, ns: f64) -> (i64, i64, u32) {
        let spr = i64::from(self.seconds_per_row);
        let t = self.align(ns);
        let requested = t / spr;
        let current = self.current_time / spr;
        // Euclidean so a negative timestamp inside the window cannot
        // produce a negative physical index
        let row = requested.rem_euclid(i64::from(self.rows)) as u32;
        (t, requested - current, row)
    }

    /// Resolves a timestamp without permission to advance the window
    fn resolve_read(&self, ns: f64) -> Option<u32> {
        let (_, delta, row) = self.locate(ns);
        if delta > 0 || delta.unsigned_abs() >= u64::from(self.rows) {
            return None;
        }
        Some(row)
    }

    /// Resolves a timestamp, advancing the window over a future one
    fn resolve_write(&mut self, ns: f64) -> Option<u32> {
        let (t, delta, row) = self.locate(ns);
        if delta > 0 {
            let stale = delta.min(i64::from(self.rows)) as u32;
            log_trace!("advancing {} rows to t={}", stale, t);
            self.grid.clear_rows(self.current_row, stale);
            self.current_time = t;
            self.current_row = row;
            Some(row)
        } else if delta.unsigned_abs() >= u64::from(self.rows) {
            None
        } else {
            Some(row)
        }
    }

    /// Validates a 1-based column index and converts it to 0-based
    fn check_column(&self, column: u32) -> BufferResult<u32> {
        if column == 0 || column > self.columns {
            return Err(BufferError::ColumnOutOfRange {
                column,
                columns: self.columns,
            });
        }
        Ok(column - 1)
    }

    /// Adds `value` into the bucket at `ns`, advancing the window if the
    /// timestamp is ahead of the cursor.
    ///
    /// An unwritten (NaN) cell takes `value`; a written cell accumulates
    /// it. Returns the new cell total, or `Ok(None)` when the timestamp
    /// misses the retained window.
    ///
    /// With delta tracking on and `value != 0`, records `value` for `Sum`
    /// columns and the new cell total for every other policy (non-Sum
    /// aggregations track absolute state, not increments).
    pub fn add(&mut self, ns: f64, column: u32, value: f64) -> BufferResult<Option<f64>> {
        let column = self.check_column(column)?;
        let Some(row) = self.resolve_write(ns) else {
            return Ok(None);
        };

        let cell = self.grid.cell_mut(row, column);
        if cell.is_nan() {
            *cell = value;
        } else {
            *cell += value;
        }
        let total = *cell;

        if self.delta_enabled && value != 0.0 {
            let recorded = match self.headers[column as usize].aggregation() {
                Aggregation::Sum => value,
                _ => total,
            };
            self.record_delta(ns, column, recorded);
        }
        Ok(Some(total))
    }

    /// Sets the bucket at `ns` according to the column's aggregation
    /// policy, advancing the window if the timestamp is ahead of the
    /// cursor.
    ///
    /// `Min`/`Max` columns only accept a value that improves on the stored
    /// one (any value beats NaN); `Sum`/`None` columns always overwrite.
    /// Returns the resulting cell value, which is unchanged for a rejected
    /// `Min`/`Max` set, or `Ok(None)` on a window miss.
    ///
    /// Delta recording: an accepted `Min`/`Max` set records the raw value;
    /// `Sum`/`None` records `value - old` when the old cell was finite and
    /// the raw value otherwise (first writes and infinite cells are not
    /// diffed).
    pub fn set(&mut self, ns: f64, column: u32, value: f64) -> BufferResult<Option<f64>> {
        let column = self.check_column(column)?;
        let Some(row) = self.resolve_write(ns) else {
            return Ok(None);
        };

        let old = self.grid.cell(row, column);
        match self.headers[column as usize].aggregation() {
            Aggregation::Min => {
                if old.is_nan() || value < old {
                    *self.grid.cell_mut(row, column) = value;
                    if self.delta_enabled {
                        self.record_delta(ns, column, value);
                    }
                }
            }
            Aggregation::Max => {
                if old.is_nan() || value > old {
                    *self.grid.cell_mut(row, column) = value;
                    if self.delta_enabled {
                        self.record_delta(ns, column, value);
                    }
                }
            }
            Aggregation::Sum | Aggregation::None => {
                *self.grid.cell_mut(row, column) = value;
                if self.delta_enabled {
                    let recorded = if old.is_finite() { value - old } else { value };
                    self.record_delta(ns, column, recorded);
                }
            }
        }
        Ok(Some(self.grid.cell(row, column)))
    }

    /// Reads the bucket at `ns` without advancing the window
    ///
    /// Returns `Ok(None)` for a future timestamp or one older than the
    /// retained window.
    pub fn get(&self, ns: f64, column: u32) -> BufferResult<Option<f64>> {
        let column = self.check_column(column)?;
        Ok(self.resolve_read(ns).map(|row| self.grid.cell(row, column)))
    }

    /// Materializes the cell values for `[start_ns, end_ns]` inclusive,
    /// oldest first
    ///
    /// `None` endpoints default to the start of the window and
    /// `current_time` respectively. `end < start` is a contract violation;
    /// an endpoint outside the window yields `Ok(None)`.
    pub fn get_range(
        &self,
        column: u32,
        start_ns: Option<f64>,
        end_ns: Option<f64>,
    ) -> BufferResult<Option<Vec<f64>>> {
        let column = self.check_column(column)?;
        let start_ns = start_ns.unwrap_or(self.start_time() as f64 * NANOS_PER_SEC);
        let end_ns = end_ns.unwrap_or(self.current_time as f64 * NANOS_PER_SEC);
        if end_ns < start_ns {
            return Err(BufferError::InvalidRange);
        }

        let (Some(start_row), Some(end_row)) =
            (self.resolve_read(start_ns), self.resolve_read(end_ns))
        else {
            return Ok(None);
        };

        let len = (end_row + self.rows - start_row) % self.rows + 1;
        let mut out = Vec::with_capacity(len as usize);
        let mut row = start_row;
        loop {
            out.push(self.grid.cell(row, column));
            if row == end_row {
                break;
            }
            row += 1;
            if row == self.rows {
                row = 0;
            }
        }
        Ok(Some(out))
    }

    /// Replaces a column's header, sanitizing `name` and `unit` (see
    /// [`crate::header`]), and returns the 1-based column index
    pub fn set_header(
        &mut self,
        column: u32,
        name: &str,
        unit: &str,
        aggregation: Aggregation,
    ) -> BufferResult<u32> {
        let idx = self.check_column(column)?;
        self.headers[idx as usize] = ColumnHeader::new(name, unit, aggregation);
        Ok(idx + 1)
    }

    /// A column's sanitized name, unit, and aggregation policy
    pub fn get_header(&self, column: u32) -> BufferResult<(&str, &str, Aggregation)> {
        let idx = self.check_column(column)? as usize;
        let h = &self.headers[idx];
        Ok((h.name(), h.unit(), h.aggregation()))
    }

    /// Records a delta against the row-aligned timestamp of `ns`
    ///
    /// Callers gate on `delta_enabled`; the log itself never checks.
    pub(crate) fn record_delta(&mut self, ns: f64, column: u32, value: f64) {
        let t = self.align(ns);
        self.delta.record(t, column, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: f64 = 1e9;

    #[test]
    fn construction_validates_dimensions() {
        assert_eq!(
            CircularBuffer::new(1, 1, 1, false).unwrap_err(),
            BufferError::InvalidRows { rows: 1 }
        );
        assert_eq!(
            CircularBuffer::new(2, 0, 1, false).unwrap_err(),
            BufferError::InvalidColumns
        );
        assert_eq!(
            CircularBuffer::new(2, 1, 0, false).unwrap_err(),
            BufferError::InvalidSecondsPerRow
        );
    }

    #[test]
    fn fresh_buffer_is_all_nan() {
        let cb = CircularBuffer::new(10, 4, 30, false).unwrap();
        assert_eq!(cb.get_configuration(), (10, 4, 30));
        assert_eq!(cb.current_time(), 9.0 * 30.0 * SEC);
        for row in 0..10 {
            let ns = row as f64 * 30.0 * SEC;
            for col in 1..=4 {
                assert!(cb.get(ns, col).unwrap().unwrap().is_nan());
            }
        }
    }

    #[test]
    fn add_sets_then_accumulates() {
        let mut cb = CircularBuffer::new(3, 1, 1, false).unwrap();
        assert_eq!(cb.add(0.0, 1, 5.0).unwrap(), Some(5.0));
        assert_eq!(cb.add(0.0, 1, 2.5).unwrap(), Some(7.5));
        assert_eq!(cb.get(0.0, 1).unwrap(), Some(7.5));
    }

    #[test]
    fn add_advances_and_ages_out_old_rows() {
        // Two-row jump pushes the oldest bucket out of the window
        let mut cb = CircularBuffer::new(3, 1, 1, false).unwrap();
        assert_eq!(cb.add(0.0, 1, 5.0).unwrap(), Some(5.0));
        assert_eq!(cb.add(4.0 * SEC, 1, 7.0).unwrap(), Some(7.0));

        assert_eq!(cb.get(0.0, 1).unwrap(), None);
        assert_eq!(cb.get(4.0 * SEC, 1).unwrap(), Some(7.0));
        assert_eq!(cb.current_time(), 4.0 * SEC);
    }

    #[test]
    fn reads_never_advance() {
        let mut cb = CircularBuffer::new(3, 1, 1, false).unwrap();
        let _ = cb.add(0.0, 1, 5.0).unwrap();

        assert_eq!(cb.get(10.0 * SEC, 1).unwrap(), None);
        // The future read must not have cleared anything
        assert_eq!(cb.get(0.0, 1).unwrap(), Some(5.0));
    }

    #[test]
    fn advance_by_more_than_rows_clears_everything() {
        let mut cb = CircularBuffer::new(4, 2, 10, false).unwrap();
        for row in 0..4u32 {
            let _ = cb.set(row as f64 * 10.0 * SEC, 1, 1.0).unwrap();
            let _ = cb.set(row as f64 * 10.0 * SEC, 2, 2.0).unwrap();
        }

        // 1000 rows ahead, far beyond the window
        let _ = cb.add(10_000.0 * SEC, 1, 9.0).unwrap();
        let range = cb.get_range(1, None, None).unwrap().unwrap();
        assert_eq!(range.len(), 4);
        assert!(range[..3].iter().all(|v| v.is_nan()));
        assert_eq!(range[3], 9.0);
        assert!(cb
            .get_range(2, None, None)
            .unwrap()
            .unwrap()
            .iter()
            .all(|v| v.is_nan()));
    }

    #[test]
    fn min_max_policies() {
        let mut cb = CircularBuffer::new(2, 2, 1, false).unwrap();
        cb.set_header(1, "low", "ms", Aggregation::Min).unwrap();
        cb.set_header(2, "high", "ms", Aggregation::Max).unwrap();

        assert_eq!(cb.set(0.0, 1, 10.0).unwrap(), Some(10.0));
        assert_eq!(cb.set(0.0, 1, 12.0).unwrap(), Some(10.0)); // rejected
        assert_eq!(cb.set(0.0, 1, 7.0).unwrap(), Some(7.0));

        assert_eq!(cb.set(0.0, 2, 10.0).unwrap(), Some(10.0));
        assert_eq!(cb.set(0.0, 2, 8.0).unwrap(), Some(10.0)); // rejected
        assert_eq!(cb.set(0.0, 2, 15.0).unwrap(), Some(15.0));
    }

    #[test]
    fn sum_and_none_sets_overwrite() {
        let mut cb = CircularBuffer::new(2, 2, 1, false).unwrap();
        cb.set_header(2, "gauge", "count", Aggregation::None).unwrap();

        let _ = cb.set(0.0, 1, 3.0).unwrap();
        assert_eq!(cb.set(0.0, 1, 1.0).unwrap(), Some(1.0));
        let _ = cb.set(0.0, 2, 3.0).unwrap();
        assert_eq!(cb.set(0.0, 2, 1.0).unwrap(), Some(1.0));
    }

    #[test]
    fn sum_deltas_accumulate_to_cell_total() {
        let mut cb = CircularBuffer::new(3, 1, 1, true).unwrap();
        let _ = cb.add(0.0, 1, 3.0).unwrap();
        let _ = cb.add(0.0, 1, 4.0).unwrap();

        assert_eq!(cb.get(0.0, 1).unwrap(), Some(7.0));
        let entries = cb.delta.drain();
        assert_eq!(entries[&0][&0], 7.0);
    }

    #[test]
    fn non_sum_add_records_absolute_total() {
        let mut cb = CircularBuffer::new(3, 1, 1, true).unwrap();
        cb.set_header(1, "peak", "ms", Aggregation::Max).unwrap();
        let _ = cb.add(0.0, 1, 3.0).unwrap();
        let _ = cb.add(0.0, 1, 4.0).unwrap();

        // Each add records the running total, so the log accumulates 3 + 7
        assert_eq!(cb.delta.drain()[&0][&0], 10.0);
    }

    #[test]
    fn zero_add_records_no_delta() {
        let mut cb = CircularBuffer::new(3, 1, 1, true).unwrap();
        let _ = cb.add(0.0, 1, 0.0).unwrap();
        assert!(cb.delta.is_empty());
    }

    #[test]
    fn set_delta_diffs_finite_old_values_only() {
        let mut cb = CircularBuffer::new(3, 1, 1, true).unwrap();

        // First write: old cell is NaN, raw value is recorded
        let _ = cb.set(0.0, 1, 10.0).unwrap();
        assert_eq!(cb.delta.drain()[&0][&0], 10.0);

        // Overwrite of a finite cell records the difference
        let _ = cb.set(0.0, 1, 4.0).unwrap();
        assert_eq!(cb.delta.drain()[&0][&0], -6.0);

        // Infinite old values are not diffed
        let _ = cb.set(0.0, 1, f64::INFINITY).unwrap();
        cb.delta.drain();
        let _ = cb.set(0.0, 1, 2.0).unwrap();
        assert_eq!(cb.delta.drain()[&0][&0], 2.0);
    }

    #[test]
    fn min_max_set_records_raw_value() {
        let mut cb = CircularBuffer::new(3, 2, 1, true).unwrap();
        cb.set_header(1, "low", "ms", Aggregation::Min).unwrap();

        let _ = cb.set(0.0, 1, 10.0).unwrap();
        let _ = cb.set(0.0, 1, 12.0).unwrap(); // rejected, no delta
        let _ = cb.set(0.0, 1, 7.0).unwrap();
        assert_eq!(cb.delta.drain()[&0][&0], 17.0);
    }

    #[test]
    fn delta_entries_survive_window_advance() {
        let mut cb = CircularBuffer::new(3, 1, 1, true).unwrap();
        let _ = cb.add(0.0, 1, 5.0).unwrap();
        // Advance far enough to clear the t=0 row
        let _ = cb.add(10.0 * SEC, 1, 1.0).unwrap();

        assert_eq!(cb.get(0.0, 1).unwrap(), None);
        let entries = cb.delta.drain();
        assert_eq!(entries[&0][&0], 5.0);
        assert_eq!(entries[&10][&0], 1.0);
    }

    #[test]
    fn get_range_walks_circularly() {
        let mut cb = CircularBuffer::new(4, 1, 1, false).unwrap();
        for t in 0..4 {
            let _ = cb.set(t as f64 * SEC, 1, t as f64).unwrap();
        }
        // Advance one row: physical order is now 1,2,3,0
        let _ = cb.set(4.0 * SEC, 1, 4.0).unwrap();

        let range = cb.get_range(1, None, None).unwrap().unwrap();
        assert_eq!(range, [1.0, 2.0, 3.0, 4.0]);

        let tail = cb
            .get_range(1, Some(3.0 * SEC), Some(4.0 * SEC))
            .unwrap()
            .unwrap();
        assert_eq!(tail, [3.0, 4.0]);

        let single = cb
            .get_range(1, Some(2.0 * SEC), Some(2.0 * SEC))
            .unwrap()
            .unwrap();
        assert_eq!(single, [2.0]);
    }

    #[test]
    fn get_range_matches_get_per_bucket() {
        let mut cb = CircularBuffer::new(5, 1, 2, false).unwrap();
        let _ = cb.add(2.0 * SEC, 1, 1.5).unwrap();
        let _ = cb.add(6.0 * SEC, 1, 2.5).unwrap();

        let range = cb.get_range(1, None, None).unwrap().unwrap();
        assert_eq!(range.len(), 5);
        for (i, expect) in range.iter().enumerate() {
            let got = cb.get(i as f64 * 2.0 * SEC, 1).unwrap().unwrap();
            assert!(got == *expect || (got.is_nan() && expect.is_nan()));
        }
    }

    #[test]
    fn get_range_contract_and_misses() {
        let cb = CircularBuffer::new(3, 1, 1, false).unwrap();
        assert_eq!(
            cb.get_range(1, Some(2.0 * SEC), Some(1.0 * SEC)).unwrap_err(),
            BufferError::InvalidRange
        );
        // End beyond the window is a miss, not an error
        assert_eq!(cb.get_range(1, Some(0.0), Some(99.0 * SEC)).unwrap(), None);
    }

    #[test]
    fn column_bounds_are_contract_violations() {
        let mut cb = CircularBuffer::new(3, 2, 1, false).unwrap();
        assert_eq!(
            cb.get(0.0, 0).unwrap_err(),
            BufferError::ColumnOutOfRange { column: 0, columns: 2 }
        );
        assert_eq!(
            cb.add(0.0, 3, 1.0).unwrap_err(),
            BufferError::ColumnOutOfRange { column: 3, columns: 2 }
        );
        // A rejected column write must not advance the window
        assert!(cb.add(100.0 * SEC, 9, 1.0).is_err());
        assert_eq!(cb.current_time(), 2.0 * SEC);
    }

    #[test]
    fn headers_round_trip() {
        let mut cb = CircularBuffer::new(2, 2, 1, false).unwrap();
        assert_eq!(cb.get_header(1).unwrap(), ("Column_1", "count", Aggregation::Sum));

        assert_eq!(
            cb.set_header(2, "disk free", "KiB", Aggregation::Min).unwrap(),
            2
        );
        assert_eq!(cb.get_header(2).unwrap(), ("disk_free", "KiB", Aggregation::Min));
    }

    #[test]
    fn timestamps_are_row_aligned() {
        let mut cb = CircularBuffer::new(3, 1, 60, false).unwrap();
        let _ = cb.add(59.9 * SEC, 1, 1.0).unwrap();
        // 59.9s truncates to the t=0 bucket
        assert_eq!(cb.get(0.0, 1).unwrap(), Some(1.0));
        assert_eq!(cb.get(30.0 * SEC, 1).unwrap(), Some(1.0));
    }
}
