use crate::error::{Result, StatsError};
use crate::stats::{bin_index, HistBounds, Histogram, Statistics};

/// Scalar CPU reference implementation of the fixed-point statistics.
/// Calculates Min, Max, Sum, Mean and the histogram in one sequential sweep.
pub fn statistics_i32(data: &[i32], nr_bins: usize) -> Result<Statistics> {
    if data.is_empty() {
        return Err(StatsError::EmptyDataset);
    }
    if nr_bins == 0 {
        return Err(StatsError::InvalidBinCount);
    }

    let mut min = i32::MAX;
    let mut max = i32::MIN;
    let mut sum: i64 = 0;

    for &val in data {
        if val < min {
            min = val;
        }
        if val > max {
            max = val;
        }
        sum += val as i64;
    }

    let bounds = HistBounds::new(min, max)?;
    let mut counts = vec![0u32; nr_bins];
    for &val in data {
        if let Some(bin) = bin_index(val, bounds, nr_bins) {
            counts[bin] += 1;
        }
    }

    Ok(Statistics {
        count: data.len(),
        min,
        max,
        sum,
        mean: sum as f64 / data.len() as f64,
        histogram: Histogram { bounds, counts },
    })
}
