//! Temperature dataset ingestion.
//!
//! Records are whitespace-separated `station year month day time temperature`.
//! Only the temperature is kept, as a fixed-point integer (value x 10, truncated
//! toward zero).

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use crate::error::{Result, StatsError};

/// Number of whitespace-separated fields in a record.
const FIELDS_PER_RECORD: usize = 6;

/// Fixed-point scale applied to every reading.
pub const FIXED_POINT_SCALE: f32 = 10.0;

/// Convert a decimal reading to fixed point, or `None` when the scaled value
/// does not fit strictly inside the `i32` range.
pub fn to_fixed(temperature: f32) -> Option<i32> {
    let scaled = temperature * FIXED_POINT_SCALE;
    // Both i32 extremes are reserved as reduction padding.
    if scaled.is_finite() && scaled > i32::MIN as f32 && scaled < i32::MAX as f32 {
        Some(scaled as i32)
    } else {
        None
    }
}

/// Convert a fixed-point value back to degrees.
pub fn from_fixed(value: f64) -> f64 {
    value / FIXED_POINT_SCALE as f64
}

/// Ordered, immutable sequence of fixed-point readings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    values: Vec<i32>,
}

impl Dataset {
    pub fn from_values(values: Vec<i32>) -> Self {
        Self { values }
    }

    /// Load and parse a dataset file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| StatsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset = Self::from_reader(BufReader::new(file))?;
        info!(path = %path.display(), records = dataset.len(), "dataset loaded");
        Ok(dataset)
    }

    /// Parse records from any buffered reader. Blank lines are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut values = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| StatsError::Read {
                line: idx + 1,
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            values.push(parse_record(&line, idx + 1)?);
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<i32> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn parse_record(line: &str, line_no: usize) -> Result<i32> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < FIELDS_PER_RECORD {
        return Err(StatsError::Parse {
            line: line_no,
            reason: format!(
                "expected {FIELDS_PER_RECORD} fields, found {}",
                fields.len()
            ),
        });
    }

    let raw = fields[FIELDS_PER_RECORD - 1];
    let temperature: f32 = raw.parse().map_err(|_| StatsError::Parse {
        line: line_no,
        reason: format!("invalid temperature {raw:?}"),
    })?;
    if !temperature.is_finite() {
        return Err(StatsError::Parse {
            line: line_no,
            reason: format!("non-finite temperature {raw:?}"),
        });
    }

    to_fixed(temperature).ok_or_else(|| StatsError::Parse {
        line: line_no,
        reason: format!("temperature {raw} is out of fixed-point range"),
    })
}
