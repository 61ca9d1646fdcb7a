//! Statistics core: partitioning, reduction passes, histogram and run orchestration.

pub mod histogram;
pub mod operator;
pub mod partition;
pub mod reduce;
pub mod report;
pub mod run;

pub use histogram::{bin_index, HistBounds, Histogram};
pub use operator::{neutral_for, Operator};
pub use partition::{build_padded, partition, GroupGeometry, DEFAULT_GROUP_SIZE};
pub use report::Summary;
pub use run::{RunState, StatsRun};

/// Result of a complete run, all values in fixed-point units (degrees x 10).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Statistics {
    /// Number of original (unpadded) elements.
    pub count: usize,
    pub min: i32,
    pub max: i32,
    pub sum: i64,
    /// `sum / count`; padding never enters the denominator.
    pub mean: f64,
    pub histogram: Histogram,
}
