//! Error taxonomy shared by the device backends and the statistics pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::stats::RunState;

/// Result type for device and statistics operations.
pub type Result<T> = std::result::Result<T, StatsError>;

/// Every failure is fatal for the run; nothing is retried locally.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("device setup failed: {0}")]
    DeviceSetup(String),

    #[error("kernel build failed (status: {status}, options: {options:?})\n{log}")]
    KernelBuild {
        status: String,
        options: String,
        log: String,
    },

    #[error("device buffer error: {0}")]
    Buffer(String),

    #[error("dispatch of kernel `{kernel}` failed: {reason}")]
    Dispatch { kernel: String, reason: String },

    #[error("invalid work-group size {size}: {reason}")]
    InvalidGroupSize { size: usize, reason: String },

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("histogram needs at least one bin")]
    InvalidBinCount,

    #[error("invalid histogram bounds: min {min} is greater than max {max}")]
    InvalidBounds { min: i32, max: i32 },

    #[error("sum of {count} values bounded by {bound} may overflow the 32-bit device accumulator")]
    SumOverflow { count: usize, bound: i64 },

    #[error("analysis exceeded the {secs}s deadline")]
    Timeout { secs: u64 },

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("line {line}: read failed: {source}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read dataset {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("run cannot start from state {0:?}")]
    RunFinished(RunState),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_build_message_carries_status_options_and_log() {
        let err = StatsError::KernelBuild {
            status: "Error".to_string(),
            options: "-cl-std=CL1.2".to_string(),
            log: "<kernel>:3:1: error: expected ';'".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("status: Error"));
        assert!(msg.contains("\"-cl-std=CL1.2\""));
        assert!(msg.ends_with("expected ';'"));
    }

    #[test]
    fn test_read_error_keeps_source() {
        use std::error::Error as _;

        let err = StatsError::Read {
            line: 4,
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "bad utf-8"),
        };
        assert_eq!(err.to_string(), "line 4: read failed: bad utf-8");
        assert!(err.source().is_some());
    }
}
