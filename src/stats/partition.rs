//! Work partitioning: pad a dataset up to a whole number of work-groups.

use serde::Serialize;

use crate::error::{Result, StatsError};

/// Default number of work-items per local group.
pub const DEFAULT_GROUP_SIZE: usize = 1024;

/// Derived, read-only dispatch geometry for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupGeometry {
    /// Length of the unpadded dataset (`N`).
    pub dataset_len: usize,
    pub group_size: usize,
    pub padded_len: usize,
    pub group_count: usize,
    pub padding_count: usize,
}

/// Compute the padded geometry for `dataset_len` elements in groups of `group_size`.
///
/// An already aligned dataset gets no padding and no extra group.
pub fn partition(dataset_len: usize, group_size: usize) -> Result<GroupGeometry> {
    if group_size == 0 {
        return Err(StatsError::InvalidGroupSize {
            size: group_size,
            reason: "group size must be positive".to_string(),
        });
    }
    if dataset_len == 0 {
        return Err(StatsError::EmptyDataset);
    }

    let padding_count = (group_size - dataset_len % group_size) % group_size;
    let padded_len = dataset_len + padding_count;

    Ok(GroupGeometry {
        dataset_len,
        group_size,
        padded_len,
        group_count: padded_len / group_size,
        padding_count,
    })
}

/// Copy `dataset` and append `padding_count` copies of `neutral`.
pub fn build_padded(dataset: &[i32], padding_count: usize, neutral: i32) -> Vec<i32> {
    let mut padded = Vec::with_capacity(dataset.len() + padding_count);
    padded.extend_from_slice(dataset);
    padded.resize(dataset.len() + padding_count, neutral);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_unaligned() {
        let geometry = partition(5, 4).unwrap();
        assert_eq!(geometry.padding_count, 3);
        assert_eq!(geometry.padded_len, 8);
        assert_eq!(geometry.group_count, 2);
    }

    #[test]
    fn test_partition_aligned_adds_no_group() {
        let geometry = partition(2048, 1024).unwrap();
        assert_eq!(geometry.padding_count, 0);
        assert_eq!(geometry.padded_len, 2048);
        assert_eq!(geometry.group_count, 2);
    }

    #[test]
    fn test_partition_invariants() {
        for group_size in [1usize, 2, 3, 7, 64, 1024] {
            for len in 1..300usize {
                let g = partition(len, group_size).unwrap();
                assert_eq!(g.padded_len % group_size, 0);
                assert!(g.padded_len >= len);
                assert!(g.padded_len - len < group_size);
                assert_eq!(g.group_count * group_size, g.padded_len);
            }
        }
    }

    #[test]
    fn test_partition_rejects_zero_group_size() {
        let err = partition(10, 0).unwrap_err();
        assert!(matches!(err, StatsError::InvalidGroupSize { size: 0, .. }));
    }

    #[test]
    fn test_partition_rejects_empty_dataset() {
        assert!(matches!(partition(0, 4), Err(StatsError::EmptyDataset)));
    }

    #[test]
    fn test_build_padded_leaves_input_untouched() {
        let data = vec![3, 1, 2];
        let padded = build_padded(&data, 5, i32::MAX);
        assert_eq!(data, vec![3, 1, 2]);
        assert_eq!(padded.len(), 8);
        assert_eq!(&padded[..3], &[3, 1, 2]);
        assert!(padded[3..].iter().all(|&v| v == i32::MAX));
    }

    #[test]
    fn test_padding_preserves_reductions() {
        let data = vec![-42, 7, 13, 0, 99];
        let g = partition(data.len(), 4).unwrap();

        let for_min = build_padded(&data, g.padding_count, i32::MAX);
        let for_max = build_padded(&data, g.padding_count, i32::MIN);
        let for_sum = build_padded(&data, g.padding_count, 0);

        assert_eq!(for_min.iter().min(), data.iter().min());
        assert_eq!(for_max.iter().max(), data.iter().max());
        assert_eq!(for_sum.iter().sum::<i32>(), data.iter().sum::<i32>());
    }
}
