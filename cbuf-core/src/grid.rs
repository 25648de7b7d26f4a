//! Dense Row-Major Grid Storage with Amortized Bulk Clearing
//!
//! ## Overview
//!
//! The grid is a single `Vec<f64>` of `rows * columns` cells, row-major,
//! sized once at construction and never reallocated. NaN marks a cell that
//! has never been written or was cleared by a window advance.
//!
//! ## Bulk clearing
//!
//! Advancing the window by `k` rows must NaN-fill the `k` rows that follow
//! the current row. Doing that cell by cell is O(k * columns) writes; for
//! buffers with thousands of rows that cost shows up on every large time
//! jump. Instead the grid NaN-fills one row and then block-copies the
//! already-cleared prefix onto the rows that follow, doubling the prefix on
//! each pass:
//!
//! ```text
//! pass 0:  [X . . . . . . .]   fill one row by hand
//! pass 1:  [X X . . . . . .]   copy 1 row
//! pass 2:  [X X X X . . . .]   copy 2 rows
//! pass 3:  [X X X X X X X X]   copy 4 rows
//! ```
//!
//! Clearing `k` rows takes O(log k) block copies. When the stale span wraps
//! past the physical end of the array the clear is split into a pass that
//! runs to the end and a second pass that restarts at row zero.

use alloc::vec;
use alloc::vec::Vec;

/// Dense value storage for a circular buffer
///
/// Rows are physical here; the time-to-row mapping lives in
/// [`crate::buffer::CircularBuffer`].
#[derive(Debug, Clone)]
pub(crate) struct Grid {
    rows: u32,
    columns: u32,
    values: Vec<f64>,
}

impl Grid {
    /// Creates a grid with every cell NaN
    pub fn new(rows: u32, columns: u32) -> Self {
        Self {
            rows,
            columns,
            values: vec![f64::NAN; rows as usize * columns as usize],
        }
    }

    fn index(&self, row: u32, column: u32) -> usize {
        row as usize * self.columns as usize + column as usize
    }

    pub fn cell(&self, row: u32, column: u32) -> f64 {
        self.values[self.index(row, column)]
    }

    pub fn cell_mut(&mut self, row: u32, column: u32) -> &mut f64 {
        let i = self.index(row, column);
        &mut self.values[i]
    }

    /// All cells in physical row-major order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable view for the decoder, which repopulates cells in bulk
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// One physical row
    pub fn row(&self, row: u32) -> &[f64] {
        let start = self.index(row, 0);
        &self.values[start..start + self.columns as usize]
    }

    /// NaN-fills the `num_rows` rows following `current_row`, wrapping at
    /// the physical end of the array. `num_rows` is capped at `rows`, so a
    /// huge advance clears the whole grid exactly once.
    pub fn clear_rows(&mut self, current_row: u32, num_rows: u32) {
        let rows = self.rows as usize;
        let cols = self.columns as usize;
        let num = num_rows.min(self.rows) as usize;
        if num == 0 {
            return;
        }

        let mut row = current_row as usize + 1;
        if row >= rows {
            row = 0;
        }
        let base = row * cols;
        self.values[base..base + cols].fill(f64::NAN);

        if row + num - 1 >= rows {
            // Stale span wraps: finish out the tail, then restart at row 0
            self.copy_cleared(row, rows - row - 1);
            self.values[..cols].fill(f64::NAN);
            self.copy_cleared(0, row + num - 1 - rows);
        } else {
            self.copy_cleared(row, num - 1);
        }
    }

    /// Duplicates the cleared prefix starting at `start_row` onto the
    /// `count` rows that follow it, doubling the prefix each pass
    fn copy_cleared(&mut self, start_row: usize, count: usize) {
        let cols = self.columns as usize;
        let base = start_row * cols;
        let mut pool = 1usize;
        let mut remaining = count;
        while remaining > 0 {
            let ask = remaining.min(pool);
            self.values
                .copy_within(base..base + ask * cols, base + pool * cols);
            remaining -= ask;
            pool += ask;
        }
    }
}
