//! tempstats -- min, max, mean and histogram of temperature datasets via
//! work-group parallel reductions.
//!
//! The crate pads a dataset to whole work-groups, runs one reduction pass per
//! operator against a device session, and bins the data on the device using
//! the min/max bounds from the earlier passes.

pub mod accel;
pub mod config;
pub mod dataset;
pub mod error;
pub mod stats;

use std::time::Duration;

use anyhow::{Context, Result};

use crate::accel::ops::{StatsInput, StatsOp};
use crate::accel::{AccelerationManager, Backend, DeviceSelection};
use crate::config::StatsConfig;
use crate::dataset::Dataset;
use crate::error::StatsError;
use crate::stats::{partition, Summary};

/// Compute the statistics of `dataset` with the configured backend, bounded by
/// the configured deadline.
pub async fn run(config: &StatsConfig, dataset: Dataset) -> Result<Summary> {
    let (selection, input) = prepare(config, dataset);
    with_deadline(config.device.timeout_secs, move || analyze(&selection, &input)).await
}

/// Blocking variant of [`run`] for callers without a runtime.
pub fn run_blocking(config: &StatsConfig, dataset: Dataset) -> Result<Summary> {
    let (selection, input) = prepare(config, dataset);
    block_on_deadline(config.device.timeout_secs, move || analyze(&selection, &input))
}

fn prepare(config: &StatsConfig, dataset: Dataset) -> (DeviceSelection, StatsInput) {
    let selection = config.device_selection();
    let input = StatsInput {
        data: dataset.into_values(),
        group_size: config.analysis.group_size,
        nr_bins: config.analysis.bins,
    };

    tracing::info!(
        backend = ?selection.backend,
        records = input.data.len(),
        group_size = input.group_size,
        bins = input.nr_bins,
        "Starting analysis"
    );

    (selection, input)
}

/// Run `job` on the blocking pool, failing with [`StatsError::Timeout`] once
/// `secs` have elapsed. `0` disables the deadline.
///
/// A job that misses the deadline keeps running on its thread; device work
/// cannot be interrupted.
pub async fn with_deadline<T, F>(secs: u64, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> std::result::Result<T, StatsError> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(job);

    let joined = if secs == 0 {
        task.await
    } else {
        tokio::time::timeout(Duration::from_secs(secs), task)
            .await
            .map_err(|_| StatsError::Timeout { secs })?
    };

    let value = joined.context("analysis task panicked")??;
    Ok(value)
}

/// [`with_deadline`] on a private runtime. The runtime is shut down without
/// joining its blocking pool, so an abandoned job does not hold the caller
/// past the deadline.
pub fn block_on_deadline<T, F>(secs: u64, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> std::result::Result<T, StatsError> + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()
        .context("failed to start the async runtime")?;

    let result = runtime.block_on(with_deadline(secs, job));
    runtime.shutdown_background();
    result
}

/// Blocking run: open the device, execute all passes, attach metadata.
pub fn analyze(
    selection: &DeviceSelection,
    input: &StatsInput,
) -> std::result::Result<Summary, StatsError> {
    let manager = AccelerationManager::new(selection)?;
    let (statistics, accel) = manager.execute(&StatsOp, input)?;

    let geometry = match accel.path_used {
        Backend::Scalar => None,
        _ => Some(partition(input.data.len(), input.group_size)?),
    };

    Ok(Summary {
        statistics,
        accel,
        geometry,
    })
}
