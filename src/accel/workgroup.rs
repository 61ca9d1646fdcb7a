//! Host emulation of the kernel library on a rayon thread pool.
//!
//! Each work-group runs on one task: it loads its slice into local scratch,
//! tree-reduces it with doubling strides, and its leader folds the partial result
//! into output index 0 with an atomic. This mirrors the device kernels, so the
//! host-observable contract is the same.

use std::sync::atomic::{AtomicI32, Ordering};

use rayon::prelude::*;
use tracing::debug;

use crate::accel::{Backend, DeviceInfo, DeviceSession, PlatformListing, ReduceKernel, HISTOGRAM_KERNEL};
use crate::error::{Result, StatsError};
use crate::stats::{bin_index, GroupGeometry, HistBounds};

/// Largest group the emulator accepts, matching common discrete GPUs.
pub const HOST_MAX_WORK_GROUP_SIZE: usize = 4096;

const PLATFORM_NAME: &str = "Host";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Host-resident stand-in for a device buffer.
#[derive(Debug)]
pub struct HostBuffer {
    cells: Box<[AtomicI32]>,
    access: Access,
}

impl HostBuffer {
    fn new(values: impl Iterator<Item = i32>, access: Access) -> Self {
        Self {
            cells: values.map(AtomicI32::new).collect(),
            access,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn access(&self) -> Access {
        self.access
    }
}

/// Device session backed by a dedicated rayon pool.
pub struct WorkGroupSession {
    info: DeviceInfo,
    pool: rayon::ThreadPool,
}

impl WorkGroupSession {
    /// Open the host device. Only platform 0 / device 0 exists.
    pub fn new(platform: usize, device: usize) -> Result<Self> {
        if platform != 0 || device != 0 {
            return Err(StatsError::DeviceSetup(format!(
                "host backend has a single platform and device (requested platform {platform}, device {device})"
            )));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("work-group-{i}"))
            .build()
            .map_err(|e| StatsError::DeviceSetup(e.to_string()))?;

        let info = Self::device_info(pool.current_num_threads());
        debug!(threads = info.compute_units, "host work-group session opened");

        Ok(Self { info, pool })
    }

    fn device_info(threads: usize) -> DeviceInfo {
        DeviceInfo {
            platform: PLATFORM_NAME.to_string(),
            name: format!("rayon work-group emulator ({threads} threads)"),
            max_work_group_size: HOST_MAX_WORK_GROUP_SIZE,
            compute_units: threads,
        }
    }

    pub fn platforms() -> Vec<PlatformListing> {
        vec![PlatformListing {
            backend: Backend::WorkGroup,
            index: 0,
            name: PLATFORM_NAME.to_string(),
            devices: vec![Self::device_info(rayon::current_num_threads())],
        }]
    }

    fn check_dispatch(
        &self,
        kernel: &str,
        input: &HostBuffer,
        output: &HostBuffer,
        geometry: &GroupGeometry,
    ) -> Result<()> {
        let fail = |reason: String| {
            Err(StatsError::Dispatch {
                kernel: kernel.to_string(),
                reason,
            })
        };

        if geometry.group_size == 0 || geometry.group_size > self.info.max_work_group_size {
            return fail(format!("invalid local size {}", geometry.group_size));
        }
        if geometry.padded_len % geometry.group_size != 0 {
            return fail(format!(
                "global size {} is not a multiple of local size {}",
                geometry.padded_len, geometry.group_size
            ));
        }
        if input.len() < geometry.padded_len {
            return fail(format!(
                "input holds {} elements, global size is {}",
                input.len(),
                geometry.padded_len
            ));
        }
        if output.is_empty() {
            return fail("output buffer is empty".to_string());
        }
        if output.access != Access::ReadWrite {
            return fail("output buffer is read-only".to_string());
        }
        Ok(())
    }
}

/// Stride-doubling tree reduction over a group's local scratch; result ends in `scratch[0]`.
fn reduce_local(scratch: &mut [i32], combine: fn(i32, i32) -> i32) {
    let n = scratch.len();
    let mut stride = 1;
    while stride < n {
        let mut lid = 0;
        while lid + stride < n {
            scratch[lid] = combine(scratch[lid], scratch[lid + stride]);
            lid += stride * 2;
        }
        stride *= 2;
    }
}

impl DeviceSession for WorkGroupSession {
    type Buffer = HostBuffer;

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn upload(&self, data: &[i32]) -> Result<HostBuffer> {
        Ok(HostBuffer::new(data.iter().copied(), Access::ReadOnly))
    }

    fn filled(&self, len: usize, pattern: i32) -> Result<HostBuffer> {
        if len == 0 {
            return Err(StatsError::Buffer("cannot allocate a zero-length buffer".to_string()));
        }
        Ok(HostBuffer::new(std::iter::repeat(pattern).take(len), Access::ReadWrite))
    }

    fn reduce(
        &self,
        kernel: ReduceKernel,
        input: &HostBuffer,
        output: &HostBuffer,
        geometry: &GroupGeometry,
    ) -> Result<()> {
        self.check_dispatch(kernel.name(), input, output, geometry)?;

        let combine: fn(i32, i32) -> i32 = match kernel {
            ReduceKernel::Min => i32::min,
            ReduceKernel::Max => i32::max,
            ReduceKernel::ReduceAdd4 => i32::wrapping_add,
        };
        let result = &output.cells[0];

        self.pool.install(|| {
            input.cells[..geometry.padded_len]
                .par_chunks(geometry.group_size)
                .for_each(|group| {
                    let mut scratch: Vec<i32> =
                        group.iter().map(|c| c.load(Ordering::Relaxed)).collect();
                    reduce_local(&mut scratch, combine);
                    let partial = scratch[0];
                    match kernel {
                        ReduceKernel::Min => result.fetch_min(partial, Ordering::AcqRel),
                        ReduceKernel::Max => result.fetch_max(partial, Ordering::AcqRel),
                        ReduceKernel::ReduceAdd4 => result.fetch_add(partial, Ordering::AcqRel),
                    };
                });
        });

        Ok(())
    }

    fn histogram(
        &self,
        input: &HostBuffer,
        bins: &HostBuffer,
        bounds: HistBounds,
        nr_bins: usize,
        geometry: &GroupGeometry,
    ) -> Result<()> {
        self.check_dispatch(HISTOGRAM_KERNEL, input, bins, geometry)?;
        if bins.len() < nr_bins {
            return Err(StatsError::Dispatch {
                kernel: HISTOGRAM_KERNEL.to_string(),
                reason: format!("bin buffer holds {} of {nr_bins} bins", bins.len()),
            });
        }

        self.pool.install(|| {
            input.cells[..geometry.padded_len].par_iter().for_each(|cell| {
                if let Some(bin) = bin_index(cell.load(Ordering::Relaxed), bounds, nr_bins) {
                    bins.cells[bin].fetch_add(1, Ordering::Relaxed);
                }
            });
        });

        Ok(())
    }

    fn read(&self, buffer: &HostBuffer, out: &mut [i32]) -> Result<()> {
        if out.len() > buffer.len() {
            return Err(StatsError::Buffer(format!(
                "read of {} elements from a {}-element buffer",
                out.len(),
                buffer.len()
            )));
        }
        for (dst, cell) in out.iter_mut().zip(buffer.cells.iter()) {
            *dst = cell.load(Ordering::Acquire);
        }
        Ok(())
    }
}
