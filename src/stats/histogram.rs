//! Histogram builder: equal-width bins over `[min, max]` computed on the device.

use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::accel::{DeviceSession, HISTOGRAM_KERNEL};
use crate::error::{Result, StatsError};
use crate::stats::operator::{neutral_for, Operator};
use crate::stats::partition::{build_padded, GroupGeometry};

/// Inclusive value range covered by the bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistBounds {
    pub min: i32,
    pub max: i32,
}

impl HistBounds {
    pub fn new(min: i32, max: i32) -> Result<Self> {
        if min > max {
            return Err(StatsError::InvalidBounds { min, max });
        }
        Ok(Self { min, max })
    }

    /// Bin width in fixed-point units.
    pub fn width(&self, nr_bins: usize) -> f64 {
        (self.max as f64 - self.min as f64) / nr_bins as f64
    }
}

/// Bin for `value`, or `None` when it lies outside `bounds`.
///
/// Computes `floor((value - min) * nr_bins / (max - min))` in 64-bit integers and
/// clamps to the last bin, so `value == max` lands in `nr_bins - 1`. A zero-width
/// range puts every in-range value in bin 0.
pub fn bin_index(value: i32, bounds: HistBounds, nr_bins: usize) -> Option<usize> {
    if nr_bins == 0 || value < bounds.min || value > bounds.max {
        return None;
    }
    let range = bounds.max as i64 - bounds.min as i64;
    if range == 0 {
        return Some(0);
    }
    let offset = value as i64 - bounds.min as i64;
    let bin = (offset * nr_bins as i64 / range) as usize;
    Some(bin.min(nr_bins - 1))
}

/// Bin counts over an inclusive range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Histogram {
    pub bounds: HistBounds,
    pub counts: Vec<u32>,
}

impl Histogram {
    pub fn nr_bins(&self) -> usize {
        self.counts.len()
    }

    /// Total number of binned elements.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    /// Lower and upper edge of bin `index`, in fixed-point units.
    pub fn bin_range(&self, index: usize) -> (f64, f64) {
        let width = self.bounds.width(self.nr_bins());
        let lo = self.bounds.min as f64 + width * index as f64;
        let hi = if index + 1 == self.nr_bins() {
            self.bounds.max as f64
        } else {
            lo + width
        };
        (lo, hi)
    }
}

/// Bin every element of `dataset` into `nr_bins` bins spanning `bounds`.
///
/// The input is padded with the max-neutral value, which sits below `bounds.min`
/// and is therefore dropped by the kernel.
pub fn build<S: DeviceSession>(
    session: &S,
    dataset: &[i32],
    geometry: &GroupGeometry,
    bounds: HistBounds,
    nr_bins: usize,
) -> Result<Histogram> {
    if nr_bins == 0 {
        return Err(StatsError::InvalidBinCount);
    }

    let started = Instant::now();
    let padded = build_padded(dataset, geometry.padding_count, neutral_for(Operator::Max));

    let input = session.upload(&padded)?;
    let bins = session.filled(nr_bins, 0)?;
    session.histogram(&input, &bins, bounds, nr_bins, geometry)?;

    let mut raw = vec![0i32; nr_bins];
    session.read(&bins, &mut raw)?;

    let counts = raw
        .into_iter()
        .map(|c| {
            u32::try_from(c).map_err(|_| StatsError::Buffer(format!("negative bin count {c}")))
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        kernel = HISTOGRAM_KERNEL,
        nr_bins,
        min = bounds.min,
        max = bounds.max,
        elapsed_us = started.elapsed().as_micros() as u64,
        "histogram pass complete"
    );

    Ok(Histogram { bounds, counts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::workgroup::WorkGroupSession;
    use crate::stats::partition::partition;

    #[test]
    fn test_bin_index_boundaries() {
        let bounds = HistBounds::new(10, 40).unwrap();
        assert_eq!(bin_index(10, bounds, 2), Some(0));
        assert_eq!(bin_index(20, bounds, 2), Some(0));
        assert_eq!(bin_index(30, bounds, 2), Some(1));
        assert_eq!(bin_index(40, bounds, 2), Some(1));
    }

    #[test]
    fn test_bin_index_excludes_out_of_range() {
        let bounds = HistBounds::new(-5, 5).unwrap();
        assert_eq!(bin_index(i32::MIN, bounds, 4), None);
        assert_eq!(bin_index(-6, bounds, 4), None);
        assert_eq!(bin_index(6, bounds, 4), None);
        assert_eq!(bin_index(0, bounds, 0), None);
    }

    #[test]
    fn test_bin_index_degenerate_range() {
        let bounds = HistBounds::new(7, 7).unwrap();
        assert_eq!(bin_index(7, bounds, 5), Some(0));
    }

    #[test]
    fn test_bin_index_full_i32_range() {
        let bounds = HistBounds::new(i32::MIN + 1, i32::MAX).unwrap();
        assert_eq!(bin_index(i32::MAX, bounds, 3), Some(2));
        assert_eq!(bin_index(i32::MIN + 1, bounds, 3), Some(0));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        assert!(matches!(
            HistBounds::new(5, 4),
            Err(StatsError::InvalidBounds { min: 5, max: 4 })
        ));
    }

    #[test]
    fn test_bin_range_edges() {
        let hist = Histogram {
            bounds: HistBounds::new(0, 100).unwrap(),
            counts: vec![0; 4],
        };
        assert_eq!(hist.bin_range(0), (0.0, 25.0));
        assert_eq!(hist.bin_range(3), (75.0, 100.0));
    }

    #[test]
    fn test_build_counts_every_element_once() {
        let session = WorkGroupSession::new(0, 0).unwrap();
        let data: Vec<i32> = (0..1000).map(|i| (i * 37 % 611) - 300).collect();
        let geometry = partition(data.len(), 64).unwrap();
        let bounds = HistBounds::new(
            *data.iter().min().unwrap(),
            *data.iter().max().unwrap(),
        )
        .unwrap();

        for nr_bins in [1, 2, 7, 16, 100] {
            let hist = build(&session, &data, &geometry, bounds, nr_bins).unwrap();
            assert_eq!(hist.nr_bins(), nr_bins);
            assert_eq!(hist.total(), data.len() as u64);
        }
    }

    #[test]
    fn test_build_rejects_zero_bins() {
        let session = WorkGroupSession::new(0, 0).unwrap();
        let geometry = partition(4, 4).unwrap();
        let bounds = HistBounds::new(1, 4).unwrap();
        assert!(matches!(
            build(&session, &[1, 2, 3, 4], &geometry, bounds, 0),
            Err(StatsError::InvalidBinCount)
        ));
    }
}
