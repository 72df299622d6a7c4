//! Signal Table Implementation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TableError;

/// Time-indexed table of named numeric series.
///
/// All columns share one strictly increasing time index (seconds). Missing or
/// untrusted samples are represented as NaN; the table itself never rejects
/// them. Sampling is assumed uniform at `frequency` samples per second.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalTable {
    time: Vec<f64>,
    frequency: f64,
    columns: BTreeMap<String, Vec<f64>>,
}

impl SignalTable {
    /// Create a table from a time index and a sampling frequency.
    pub fn new(time: Vec<f64>, frequency: f64) -> Result<Self, TableError> {
        if time.is_empty() {
            return Err(TableError::EmptyIndex);
        }
        for i in 1..time.len() {
            if !(time[i] > time[i - 1]) {
                return Err(TableError::NonMonotonicIndex(i));
            }
        }
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(TableError::InvalidFrequency(frequency));
        }
        Ok(Self {
            time,
            frequency,
            columns: BTreeMap::new(),
        })
    }

    /// Create a table inferring the sampling frequency from the median
    /// timestep of the index.
    pub fn with_inferred_frequency(time: Vec<f64>) -> Result<Self, TableError> {
        if time.len() < 2 {
            return Err(TableError::InvalidFrequency(f64::NAN));
        }
        let mut steps: Vec<f64> = time.windows(2).map(|w| w[1] - w[0]).collect();
        steps.sort_by(|a, b| a.total_cmp(b));
        let median = steps[steps.len() / 2];
        let frequency = (1.0 / median).round();
        Self::new(time, frequency)
    }

    /// Number of samples in the table.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Always false: construction rejects an empty index.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// The shared time index (seconds).
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Sampling frequency (samples per second).
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Convert a time horizon in seconds to a sample count.
    pub fn samples(&self, seconds: f64) -> usize {
        let n = (seconds * self.frequency).round();
        if n.is_finite() && n > 0.0 {
            n as usize
        } else {
            0
        }
    }

    /// Whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Names of all stored columns, in deterministic order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Borrow a column by name.
    pub fn get(&self, name: &str) -> Result<&[f64], TableError> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| TableError::UnknownColumn(name.to_owned()))
    }

    /// Read a single sample of a column.
    pub fn get_at(&self, name: &str, index: usize) -> Result<f64, TableError> {
        let column = self.get(name)?;
        column
            .get(index)
            .copied()
            .ok_or(TableError::IndexOutOfRange {
                index,
                len: column.len(),
            })
    }

    /// Store a column, overwriting any existing column of the same name.
    pub fn set(&mut self, name: &str, values: Vec<f64>) -> Result<(), TableError> {
        if values.len() != self.time.len() {
            return Err(TableError::LengthMismatch {
                name: name.to_owned(),
                expected: self.time.len(),
                actual: values.len(),
            });
        }
        self.columns.insert(name.to_owned(), values);
        Ok(())
    }
}
