//! Reduction pipeline: one operator, one padded input, one scalar out.

use std::time::Instant;

use tracing::debug;

use crate::accel::DeviceSession;
use crate::error::Result;
use crate::stats::operator::Operator;
use crate::stats::partition::{build_padded, GroupGeometry};

/// Run `op` over `dataset` on the device and return the value at output index 0.
///
/// The padded copy and both device buffers live only for the duration of this call.
pub fn reduce<S: DeviceSession>(
    session: &S,
    op: Operator,
    dataset: &[i32],
    geometry: &GroupGeometry,
) -> Result<i32> {
    let started = Instant::now();
    let neutral = op.neutral();
    let padded = build_padded(dataset, geometry.padding_count, neutral);

    let input = session.upload(&padded)?;
    // The kernel folds each group's partial result into index 0, so the output
    // must start from the identity.
    let output = session.filled(geometry.padded_len, neutral)?;
    session.reduce(op.kernel(), &input, &output, geometry)?;

    let mut result = [neutral];
    session.read(&output, &mut result)?;

    debug!(
        %op,
        kernel = op.kernel().name(),
        padded_len = geometry.padded_len,
        group_count = geometry.group_count,
        result = result[0],
        elapsed_us = started.elapsed().as_micros() as u64,
        "reduction pass complete"
    );

    Ok(result[0])
}

/// Smallest element of `dataset`.
pub fn minimum<S: DeviceSession>(
    session: &S,
    dataset: &[i32],
    geometry: &GroupGeometry,
) -> Result<i32> {
    reduce(session, Operator::Min, dataset, geometry)
}

/// Largest element of `dataset`.
pub fn maximum<S: DeviceSession>(
    session: &S,
    dataset: &[i32],
    geometry: &GroupGeometry,
) -> Result<i32> {
    reduce(session, Operator::Max, dataset, geometry)
}

/// Sum of `dataset`, widened for the caller. The device accumulates in 32 bits.
pub fn total<S: DeviceSession>(
    session: &S,
    dataset: &[i32],
    geometry: &GroupGeometry,
) -> Result<i64> {
    reduce(session, Operator::Sum, dataset, geometry).map(i64::from)
}
