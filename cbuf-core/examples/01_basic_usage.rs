//! Basic Circular Buffer Example
//!
//! This example demonstrates the simplest use case of cbuf: tracking
//! per-minute request metrics in a fixed-size window and dumping the
//! buffer as text.
//!
//! ## What You'll Learn
//!
//! - Creating a buffer and naming its columns
//! - Writing with `add` (accumulate) and `set` (policy-driven)
//! - How the window advances and ages out old buckets
//! - Emitting the full-grid text format
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 01_basic_usage
//! ```

use cbuf_core::{Aggregation, CircularBuffer};

const SEC: f64 = 1e9;

fn main() {
    println!("cbuf Basic Usage Example");
    println!("========================\n");

    // Five one-minute buckets, two metrics
    let mut cb = CircularBuffer::new(5, 2, 60, false).expect("valid dimensions");
    cb.set_header(1, "requests", "count", Aggregation::Sum)
        .expect("column 1 exists");
    cb.set_header(2, "worst_ms", "ms", Aggregation::Max)
        .expect("column 2 exists");

    // Simulate eight minutes of traffic; the buffer only keeps five
    println!("Recording eight minutes of traffic:");
    for minute in 0..8u32 {
        let ns = f64::from(minute) * 60.0 * SEC;
        let total = cb.add(ns, 1, f64::from(10 + minute)).unwrap();
        let _ = cb.set(ns, 2, f64::from(minute % 3) * 25.0).unwrap();
        println!("  minute {minute}: requests now {total:?}");
    }
    println!();

    // The first three minutes have aged out of the window
    println!("Reads after the window advanced:");
    for minute in [0u32, 2, 5, 7] {
        let ns = f64::from(minute) * 60.0 * SEC;
        match cb.get(ns, 1).unwrap() {
            Some(v) => println!("  minute {minute}: {v}"),
            None => println!("  minute {minute}: aged out"),
        }
    }
    println!();

    // Full window for one column, oldest bucket first
    let worst = cb.get_range(2, None, None).unwrap().expect("window is valid");
    println!("worst_ms over the window: {worst:?}\n");

    // The text dump is the same data, ready for a host to persist
    let mut out = String::new();
    cb.write_output(&mut out).unwrap();
    println!("Full-grid dump:\n{out}");
}
