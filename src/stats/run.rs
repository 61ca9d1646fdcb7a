//! Orchestration of the four device passes as a linear state machine.

use serde::Serialize;
use tracing::{error, info};

use crate::accel::DeviceSession;
use crate::error::{Result, StatsError};
use crate::stats::histogram::{self, HistBounds};
use crate::stats::partition::{partition, GroupGeometry};
use crate::stats::reduce;
use crate::stats::Statistics;

/// Progress of a run. Any failure jumps straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    DeviceReady,
    MinComputed,
    MaxComputed,
    MeanComputed,
    HistogramComputed,
    Done,
    Failed,
}

/// One statistics run over a dataset against a device session.
pub struct StatsRun<'a, S: DeviceSession> {
    session: &'a S,
    dataset: &'a [i32],
    group_size: usize,
    nr_bins: usize,
    state: RunState,
    geometry: Option<GroupGeometry>,
}

impl<'a, S: DeviceSession> StatsRun<'a, S> {
    pub fn new(session: &'a S, dataset: &'a [i32], group_size: usize, nr_bins: usize) -> Self {
        Self {
            session,
            dataset,
            group_size,
            nr_bins,
            state: RunState::Idle,
            geometry: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Geometry used by the passes, once partitioning succeeded.
    pub fn geometry(&self) -> Option<GroupGeometry> {
        self.geometry
    }

    /// Run min, max, sum and histogram in order. Only a fully successful run
    /// returns statistics.
    pub fn execute(&mut self) -> Result<Statistics> {
        if self.state != RunState::Idle {
            return Err(StatsError::RunFinished(self.state));
        }

        match self.drive() {
            Ok(stats) => {
                self.advance(RunState::Done);
                Ok(stats)
            }
            Err(e) => {
                error!(from = ?self.state, error = %e, "statistics run failed");
                self.state = RunState::Failed;
                Err(e)
            }
        }
    }

    fn drive(&mut self) -> Result<Statistics> {
        let max_group = self.session.info().max_work_group_size;
        if self.group_size > max_group {
            return Err(StatsError::InvalidGroupSize {
                size: self.group_size,
                reason: format!("device maximum work-group size is {max_group}"),
            });
        }
        if self.nr_bins == 0 {
            return Err(StatsError::InvalidBinCount);
        }

        let geometry = partition(self.dataset.len(), self.group_size)?;
        self.geometry = Some(geometry);
        info!(
            device = %self.session.info().name,
            dataset_len = geometry.dataset_len,
            padded_len = geometry.padded_len,
            group_size = geometry.group_size,
            group_count = geometry.group_count,
            "device ready"
        );
        self.advance(RunState::DeviceReady);

        let min = reduce::minimum(self.session, self.dataset, &geometry)?;
        self.advance(RunState::MinComputed);

        let max = reduce::maximum(self.session, self.dataset, &geometry)?;
        self.advance(RunState::MaxComputed);

        let count = self.dataset.len();
        let bound = (min as i64).abs().max((max as i64).abs());
        if bound.saturating_mul(count as i64) > i32::MAX as i64 {
            return Err(StatsError::SumOverflow { count, bound });
        }
        let sum = reduce::total(self.session, self.dataset, &geometry)?;
        let mean = sum as f64 / count as f64;
        self.advance(RunState::MeanComputed);

        let bounds = HistBounds::new(min, max)?;
        let histogram = histogram::build(self.session, self.dataset, &geometry, bounds, self.nr_bins)?;
        self.advance(RunState::HistogramComputed);

        Ok(Statistics {
            count,
            min,
            max,
            sum,
            mean,
            histogram,
        })
    }

    fn advance(&mut self, next: RunState) {
        tracing::debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accel::workgroup::{HostBuffer, WorkGroupSession};
    use crate::accel::{DeviceInfo, ReduceKernel};
    use std::cell::Cell;

    #[test]
    fn test_scenario_four_values() {
        let session = WorkGroupSession::new(0, 0).unwrap();
        let data = [10, 20, 30, 40];
        let mut run = StatsRun::new(&session, &data, 4, 2);
        let stats = run.execute().unwrap();

        assert_eq!(stats.min, 10);
        assert_eq!(stats.max, 40);
        assert_eq!(stats.sum, 100);
        assert_eq!(stats.mean, 25.0);
        assert_eq!(stats.histogram.counts, vec![2, 2]);
        assert_eq!(run.state(), RunState::Done);
    }

    #[test]
    fn test_mean_uses_unpadded_length() {
        let session = WorkGroupSession::new(0, 0).unwrap();
        let data = [1, 2, 3, 4, 5];
        let mut run = StatsRun::new(&session, &data, 4, 3);
        let stats = run.execute().unwrap();

        assert_eq!(run.geometry().unwrap().padded_len, 8);
        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.histogram.total(), 5);
    }

    #[test]
    fn test_empty_dataset_fails() {
        let session = WorkGroupSession::new(0, 0).unwrap();
        let mut run = StatsRun::new(&session, &[], 4, 2);
        assert!(matches!(run.execute(), Err(StatsError::EmptyDataset)));
        assert_eq!(run.state(), RunState::Failed);
    }

    #[test]
    fn test_group_size_above_device_limit() {
        let session = WorkGroupSession::new(0, 0).unwrap();
        let too_big = session.info().max_work_group_size + 1;
        let mut run = StatsRun::new(&session, &[1, 2, 3], too_big, 2);
        assert!(matches!(
            run.execute(),
            Err(StatsError::InvalidGroupSize { .. })
        ));
    }

    #[test]
    fn test_sum_overflow_guard() {
        let session = WorkGroupSession::new(0, 0).unwrap();
        let data = vec![i32::MAX / 2; 3];
        let mut run = StatsRun::new(&session, &data, 4, 2);
        assert!(matches!(run.execute(), Err(StatsError::SumOverflow { .. })));
        assert_eq!(run.state(), RunState::Failed);
    }

    #[test]
    fn test_run_cannot_restart() {
        let session = WorkGroupSession::new(0, 0).unwrap();
        let data = [1, 2];
        let mut run = StatsRun::new(&session, &data, 2, 1);
        run.execute().unwrap();
        assert!(matches!(
            run.execute(),
            Err(StatsError::RunFinished(RunState::Done))
        ));
    }

    /// Delegates to the host emulator but fails the n-th reduction dispatch.
    struct FlakySession {
        inner: WorkGroupSession,
        fail_on: usize,
        dispatched: Cell<usize>,
    }

    impl DeviceSession for FlakySession {
        type Buffer = HostBuffer;

        fn info(&self) -> &DeviceInfo {
            self.inner.info()
        }

        fn upload(&self, data: &[i32]) -> Result<HostBuffer> {
            self.inner.upload(data)
        }

        fn filled(&self, len: usize, pattern: i32) -> Result<HostBuffer> {
            self.inner.filled(len, pattern)
        }

        fn reduce(
            &self,
            kernel: ReduceKernel,
            input: &HostBuffer,
            output: &HostBuffer,
            geometry: &GroupGeometry,
        ) -> Result<()> {
            let n = self.dispatched.get();
            self.dispatched.set(n + 1);
            if n == self.fail_on {
                return Err(StatsError::Dispatch {
                    kernel: kernel.name().to_string(),
                    reason: "injected failure".to_string(),
                });
            }
            self.inner.reduce(kernel, input, output, geometry)
        }

        fn histogram(
            &self,
            input: &HostBuffer,
            bins: &HostBuffer,
            bounds: HistBounds,
            nr_bins: usize,
            geometry: &GroupGeometry,
        ) -> Result<()> {
            self.inner.histogram(input, bins, bounds, nr_bins, geometry)
        }

        fn read(&self, buffer: &HostBuffer, out: &mut [i32]) -> Result<()> {
            self.inner.read(buffer, out)
        }
    }

    #[test]
    fn test_dispatch_failure_aborts_remaining_passes() {
        let session = FlakySession {
            inner: WorkGroupSession::new(0, 0).unwrap(),
            fail_on: 1,
            dispatched: Cell::new(0),
        };
        let data = [4, 8, 15, 16, 23, 42];
        let mut run = StatsRun::new(&session, &data, 4, 3);

        let err = run.execute().unwrap_err();
        assert!(matches!(err, StatsError::Dispatch { ref kernel, .. } if kernel == "Max"));
        assert_eq!(run.state(), RunState::Failed);
        // Min ran, Max failed, Sum never dispatched.
        assert_eq!(session.dispatched.get(), 2);
    }
}
