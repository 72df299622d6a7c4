//! Table Error Types

use thiserror::Error;

/// Errors raised by the signal table
#[derive(Debug, Clone, Error)]
pub enum TableError {
    /// Requested column does not exist
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Column length does not match the time index
    #[error("Column {name} has {actual} samples, table has {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Time index is empty
    #[error("Time index must not be empty")]
    EmptyIndex,

    /// Time index is not strictly increasing
    #[error("Time index is not strictly increasing at sample {0}")]
    NonMonotonicIndex(usize),

    /// Sampling frequency is not a positive finite number
    #[error("Invalid sampling frequency: {0}")]
    InvalidFrequency(f64),

    /// Sample index beyond the end of the table
    #[error("Sample index {index} out of range (table has {len} samples)")]
    IndexOutOfRange { index: usize, len: usize },
}
