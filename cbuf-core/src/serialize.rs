//! Text Serialization and Exact-Reconstruction Decoding
//!
//! ## Formats
//!
//! Both output formats open with the same single-line header describing the
//! window and the column metadata:
//!
//! ```text
//! {"time":0,"rows":3,"columns":1,"seconds_per_row":60,"column_info":[
//!   {"name":"Column_1","unit":"count","aggregation":"sum"}]}
//! ```
//!
//! (shown wrapped; the real header is one line, `time` is the oldest
//! bucket's second).
//!
//! **Full**: the header, then one line per row of tab-separated cell
//! values, oldest row first (starting after the cursor and wrapping).
//!
//! **DeltaOnly**: the header, then one line per delta timestamp: the
//! timestamp and `columns` tab-separated accumulated deltas, with `nan`
//! standing in for columns that recorded nothing. Writing this format
//! drains the delta log; an empty log writes nothing at all, header
//! included.
//!
//! Non-finite cells are the literal tokens `nan`, `inf`, and `-inf`.
//! Finite values use Rust's shortest round-trip formatting, so decoding
//! reproduces them bit for bit.
//!
//! ## Snapshot and decode
//!
//! [`CircularBuffer::write_snapshot`] emits a small reconstruction script -
//! a constructor call, one `set_header` call per column, and a
//! `fromstring("...")` payload holding the cursor, every grid cell, and any
//! pending delta entries. [`CircularBuffer::from_string`] is the matching
//! decoder: it takes the payload and rebuilds cursor, grid, and delta log
//! exactly. Everything is streamed to a `core::fmt::Write` sink; the whole
//! output is never materialized in memory here.

use core::fmt::{self, Write};
use core::str::FromStr;

use crate::buffer::CircularBuffer;
use crate::errors::{BufferError, BufferResult};

/// Serialization format selector
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Header plus the full grid, oldest row first
    #[default]
    Full,
    /// Header plus drained delta-log entries only
    DeltaOnly,
}

impl OutputFormat {
    /// Keyword form of this format
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Full => "cbuf",
            OutputFormat::DeltaOnly => "cbufd",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = BufferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cbuf" | "full" => Ok(OutputFormat::Full),
            "cbufd" | "delta_only" => Ok(OutputFormat::DeltaOnly),
            _ => Err(BufferError::UnknownFormat),
        }
    }
}

/// Writes one value token: `nan`, `inf`, `-inf`, or shortest round-trip
fn write_value<W: Write>(out: &mut W, value: f64) -> fmt::Result {
    if value.is_nan() {
        out.write_str("nan")
    } else if value == f64::INFINITY {
        out.write_str("inf")
    } else if value == f64::NEG_INFINITY {
        out.write_str("-inf")
    } else {
        write!(out, "{value}")
    }
}

/// Parses one value token; `f64::from_str` already accepts the non-finite
/// tokens `write_value` emits
fn parse_value(token: &str) -> BufferResult<f64> {
    token.parse::<f64>().map_err(|_| BufferError::MalformedInput)
}

impl CircularBuffer {
    /// Streams the buffer in its selected [`OutputFormat`]
    ///
    /// `DeltaOnly` drains the delta log as a side effect and writes nothing
    /// when the log is empty.
    pub fn write_output<W: Write>(&mut self, out: &mut W) -> BufferResult<()> {
        match self.format {
            OutputFormat::Full => {
                self.write_header_line(out)?;
                self.write_grid_rows(out)?;
            }
            OutputFormat::DeltaOnly => {
                if self.delta.is_empty() {
                    return Ok(());
                }
                self.write_header_line(out)?;
                self.write_delta_rows(out)?;
            }
        }
        Ok(())
    }

    fn write_header_line<W: Write>(&self, out: &mut W) -> fmt::Result {
        write!(
            out,
            "{{\"time\":{},\"rows\":{},\"columns\":{},\"seconds_per_row\":{},\"column_info\":[",
            self.start_time(),
            self.rows,
            self.columns,
            self.seconds_per_row
        )?;
        for (i, h) in self.headers.iter().enumerate() {
            if i != 0 {
                out.write_char(',')?;
            }
            write!(
                out,
                "{{\"name\":\"{}\",\"unit\":\"{}\",\"aggregation\":\"{}\"}}",
                h.name(),
                h.unit(),
                h.aggregation().as_str()
            )?;
        }
        out.write_str("]}\n")
    }

    fn write_grid_rows<W: Write>(&self, out: &mut W) -> fmt::Result {
        let mut row = self.current_row + 1;
        for _ in 0..self.rows {
            if row >= self.rows {
                row = 0;
            }
            for (c, v) in self.grid.row(row).iter().enumerate() {
                if c != 0 {
                    out.write_char('\t')?;
                }
                write_value(out, *v)?;
            }
            out.write_char('\n')?;
            row += 1;
        }
        Ok(())
    }

    fn write_delta_rows<W: Write>(&mut self, out: &mut W) -> fmt::Result {
        let entries = self.delta.drain();
        log_debug!("draining {} delta timestamps", entries.len());
        for (t, cols) in &entries {
            write!(out, "{t}")?;
            for c in 0..self.columns {
                out.write_char('\t')?;
                match cols.get(&c) {
                    Some(v) => write_value(out, *v)?,
                    None => out.write_str("nan")?,
                }
            }
            out.write_char('\n')?;
        }
        Ok(())
    }

    /// Streams the decode-compatible state payload: cursor, every grid cell
    /// in physical row-major order, then any pending delta entries in
    /// groups of timestamp plus one value per column (absent columns as
    /// `0`). Drains the delta log.
    pub fn write_state<W: Write>(&mut self, out: &mut W) -> BufferResult<()> {
        write!(out, "{} {}", self.current_time, self.current_row)?;
        for v in self.grid.values() {
            out.write_char(' ')?;
            write_value(out, *v)?;
        }
        let entries = self.delta.drain();
        for (t, cols) in &entries {
            write!(out, " {t}")?;
            for c in 0..self.columns {
                out.write_char(' ')?;
                write_value(out, cols.get(&c).copied().unwrap_or(0.0))?;
            }
        }
        Ok(())
    }

    /// Streams a reconstruction script for snapshotting: a guarded
    /// constructor call, one `set_header` call per column, and a
    /// `fromstring` call wrapping [`write_state`](Self::write_state)'s
    /// payload. Drains the delta log.
    pub fn write_snapshot<W: Write>(&mut self, key: &str, out: &mut W) -> BufferResult<()> {
        let delta = if self.delta_enabled { ", true" } else { "" };
        writeln!(
            out,
            "if {key} == nil then {key} = circular_buffer.new({}, {}, {}{delta}) end",
            self.rows, self.columns, self.seconds_per_row
        )?;
        for (i, h) in self.headers.iter().enumerate() {
            writeln!(
                out,
                "{key}:set_header({}, \"{}\", \"{}\", \"{}\")",
                i + 1,
                h.name(),
                h.unit(),
                h.aggregation().as_str()
            )?;
        }
        write!(out, "{key}:fromstring(\"")?;
        self.write_state(out)?;
        out.write_str("\")\n")?;
        Ok(())
    }

    /// Rebuilds buffer state from a [`write_state`](Self::write_state)
    /// payload
    ///
    /// Expects `current_time current_row` followed by exactly
    /// `rows * columns` whitespace-separated values in physical row-major
    /// order, then, when delta tracking is enabled, complete groups of a
    /// whole-second integer timestamp plus one delta per column, replayed
    /// into the log.
    ///
    /// A count mismatch or unparsable token is a contract violation, and a
    /// failed decode may leave the grid partially populated; discard the
    /// buffer when this returns an error.
    pub fn from_string(&mut self, s: &str) -> BufferResult<()> {
        let mut tokens = s.split_ascii_whitespace();

        let time: i64 = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or(BufferError::MalformedInput)?;
        let row: u32 = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or(BufferError::MalformedInput)?;
        if row >= self.rows {
            return Err(BufferError::MalformedInput);
        }
        self.current_time = time;
        self.current_row = row;

        let expected = self.rows as usize * self.columns as usize;
        let cells = self.grid.values_mut();
        let mut pos = 0;
        while pos < expected {
            let Some(token) = tokens.next() else {
                return Err(BufferError::TooFewValues { got: pos, expected });
            };
            cells[pos] = parse_value(token)?;
            pos += 1;
        }

        if self.delta_enabled {
            // Remaining tokens are delta groups: an integral timestamp in
            // seconds, then one value per column
            while let Some(token) = tokens.next() {
                let ts: i64 = token.parse().map_err(|_| BufferError::InvalidDelta)?;
                for column in 0..self.columns {
                    let token = tokens.next().ok_or(BufferError::InvalidDelta)?;
                    let value = parse_value(token)?;
                    self.record_delta(ts as f64 * 1e9, column, value);
                }
            }
        } else if tokens.next().is_some() {
            return Err(BufferError::TooManyValues { expected });
        }
        Ok(())
    }
}
