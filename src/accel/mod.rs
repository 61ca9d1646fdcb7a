//! Acceleration backends -- OpenCL device / host work-group emulation / scalar reference.
//!
//! A backend owns the compute context, command queue and compiled kernels. The
//! statistics pipeline only talks to it through [`DeviceSession`], whose
//! primitives are all blocking.

pub mod cpu;
pub mod manager;
pub mod ops;
pub mod workgroup;

#[cfg(feature = "opencl")]
pub mod opencl;

pub use manager::{AcceleratedOp, AccelerationManager, BackendChoice, DeviceSelection};

use crate::error::Result;
use crate::stats::{GroupGeometry, HistBounds};

/// Which acceleration path was used for a given computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Backend {
    /// OpenCL device running the bundled kernel library
    OpenCl,
    /// Work-group emulation of the kernel library on the host thread pool
    WorkGroup,
    /// Sequential reference implementation
    Scalar,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::OpenCl => write!(f, "opencl"),
            Backend::WorkGroup => write!(f, "work-group"),
            Backend::Scalar => write!(f, "scalar"),
        }
    }
}

/// Metadata recording which acceleration path was used.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AccelMetadata {
    pub path_used: Backend,
    pub device: String,
    pub duration_us: u64,
}

/// Reduction kernels of the device library. Each leaves its result at output index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceKernel {
    Min,
    Max,
    ReduceAdd4,
}

impl ReduceKernel {
    /// Entry point name in the kernel source.
    pub fn name(self) -> &'static str {
        match self {
            ReduceKernel::Min => "Min",
            ReduceKernel::Max => "Max",
            ReduceKernel::ReduceAdd4 => "reduce_add_4",
        }
    }
}

/// Entry point name of the binning kernel.
pub const HISTOGRAM_KERNEL: &str = "hist_simple";

/// Description of one compute device.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DeviceInfo {
    pub platform: String,
    pub name: String,
    pub max_work_group_size: usize,
    pub compute_units: usize,
}

/// One platform and its devices, as shown by `--list`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlatformListing {
    pub backend: Backend,
    pub index: usize,
    pub name: String,
    pub devices: Vec<DeviceInfo>,
}

/// Device execution context: buffer transfer and kernel dispatch primitives.
///
/// Buffers are released when dropped, so every exit path of a pass frees them.
pub trait DeviceSession {
    /// Device-resident `i32` buffer.
    type Buffer;

    fn info(&self) -> &DeviceInfo;

    /// Copy `data` into a new read-only device buffer.
    fn upload(&self, data: &[i32]) -> Result<Self::Buffer>;

    /// Allocate a read-write buffer of `len` elements, every element set to `pattern`.
    fn filled(&self, len: usize, pattern: i32) -> Result<Self::Buffer>;

    /// Run a reduction kernel over `geometry.padded_len` work-items in groups of
    /// `geometry.group_size`, with `group_size` elements of local scratch.
    fn reduce(
        &self,
        kernel: ReduceKernel,
        input: &Self::Buffer,
        output: &Self::Buffer,
        geometry: &GroupGeometry,
    ) -> Result<()>;

    /// Run the binning kernel; values outside `bounds` must not touch any bin.
    fn histogram(
        &self,
        input: &Self::Buffer,
        bins: &Self::Buffer,
        bounds: HistBounds,
        nr_bins: usize,
        geometry: &GroupGeometry,
    ) -> Result<()>;

    /// Blocking read of the first `out.len()` elements of `buffer`.
    fn read(&self, buffer: &Self::Buffer, out: &mut [i32]) -> Result<()>;
}

/// Enumerate every platform and device reachable from the compiled-in backends.
pub fn list_devices() -> Vec<PlatformListing> {
    let mut listings = workgroup::WorkGroupSession::platforms();
    listings.extend(opencl_platforms());
    listings
}

#[cfg(feature = "opencl")]
fn opencl_platforms() -> Vec<PlatformListing> {
    opencl::OpenClSession::platforms().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "OpenCL platform enumeration failed");
        Vec::new()
    })
}

#[cfg(not(feature = "opencl"))]
fn opencl_platforms() -> Vec<PlatformListing> {
    Vec::new()
}
