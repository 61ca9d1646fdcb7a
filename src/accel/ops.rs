use crate::accel::{AcceleratedOp, AccelerationManager};
use crate::error::{Result, StatsError};
use crate::stats::{Statistics, StatsRun};

/// Input for a statistics run: the fixed-point dataset and its dispatch parameters.
#[derive(Debug, Clone)]
pub struct StatsInput {
    pub data: Vec<i32>,
    pub group_size: usize,
    pub nr_bins: usize,
}

/// Operation computing min, max, mean and histogram.
pub struct StatsOp;

impl AcceleratedOp<StatsInput, Statistics> for StatsOp {
    fn run_opencl(&self, input: &StatsInput, manager: &AccelerationManager) -> Result<Statistics> {
        #[cfg(feature = "opencl")]
        {
            let session = manager
                .get_opencl()
                .ok_or_else(|| StatsError::DeviceSetup("OpenCL session not open".to_string()))?;
            StatsRun::new(session, &input.data, input.group_size, input.nr_bins).execute()
        }

        #[cfg(not(feature = "opencl"))]
        {
            let _ = (input, manager);
            Err(StatsError::DeviceSetup(
                "built without the `opencl` feature".to_string(),
            ))
        }
    }

    fn run_work_group(
        &self,
        input: &StatsInput,
        manager: &AccelerationManager,
    ) -> Result<Statistics> {
        let session = manager
            .get_work_group()
            .ok_or_else(|| StatsError::DeviceSetup("work-group session not open".to_string()))?;
        StatsRun::new(session, &input.data, input.group_size, input.nr_bins).execute()
    }

    fn run_scalar(&self, input: &StatsInput) -> Result<Statistics> {
        crate::accel::cpu::statistics_i32(&input.data, input.nr_bins)
    }
}
