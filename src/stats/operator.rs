//! Reduction operators and their identity elements.

use serde::Serialize;

use crate::accel::ReduceKernel;

/// Associative, commutative reduction operators supported by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    Min,
    Max,
    Sum,
}

impl Operator {
    /// Device kernel implementing this operator.
    pub fn kernel(self) -> ReduceKernel {
        match self {
            Operator::Min => ReduceKernel::Min,
            Operator::Max => ReduceKernel::Max,
            Operator::Sum => ReduceKernel::ReduceAdd4,
        }
    }

    /// Identity value used both for padding and for the output fill pattern.
    pub fn neutral(self) -> i32 {
        neutral_for(self)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Min => write!(f, "min"),
            Operator::Max => write!(f, "max"),
            Operator::Sum => write!(f, "sum"),
        }
    }
}

/// Identity element of `op` over the fixed-point `i32` domain.
///
/// Padding with this value can never win a comparison (min/max) or change a total (sum).
pub fn neutral_for(op: Operator) -> i32 {
    match op {
        Operator::Min => i32::MAX,
        Operator::Max => i32::MIN,
        Operator::Sum => 0,
    }
}
