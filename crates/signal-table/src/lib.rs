//! Signal Table
//!
//! Provides a time-indexed collection of named numeric series plus the series
//! operations the activity detectors are built on: trailing rolling min/max,
//! time-aligned shift, forward fill, and bounded-horizon differencing against
//! the last trustworthy sample.

mod error;
pub mod ops;
mod table;

pub use error::TableError;
pub use ops::{bounded_diff, forward_fill, rolling_max, rolling_min, shift, BoundedDiff};
pub use table::SignalTable;
