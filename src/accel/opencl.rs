//! OpenCL device session built on the `ocl` crate.
//!
//! Holds the platform, device, context, command queue and the program built
//! from the bundled kernel library. Every enqueue is followed by a blocking
//! finish or a blocking read.

use std::ffi::CString;

use ocl::{flags, Buffer, Context, Device, Kernel, Platform, Program, Queue};
use tracing::{debug, info};

use crate::accel::{Backend, DeviceInfo, DeviceSession, PlatformListing, ReduceKernel, HISTOGRAM_KERNEL};
use crate::error::{Result, StatsError};
use crate::stats::{GroupGeometry, HistBounds};

/// Kernel library compiled into every session.
pub const KERNEL_SOURCE: &str = include_str!("kernels.cl");

/// Options passed to the OpenCL compiler.
pub const BUILD_OPTIONS: &str = "-cl-std=CL1.2";

fn setup(e: ocl::Error) -> StatsError {
    StatsError::DeviceSetup(e.to_string())
}

fn buffer(e: ocl::Error) -> StatsError {
    StatsError::Buffer(e.to_string())
}

fn dispatch(kernel: &str) -> impl Fn(ocl::Error) -> StatsError + '_ {
    move |e| StatsError::Dispatch {
        kernel: kernel.to_string(),
        reason: e.to_string(),
    }
}

/// Context, queue and compiled program for one selected device.
pub struct OpenClSession {
    context: Context,
    queue: Queue,
    program: Program,
    info: DeviceInfo,
}

impl OpenClSession {
    pub fn is_available() -> bool {
        !Platform::list().is_empty()
    }

    /// Open `device` on `platform` (both by index) and build the kernel library.
    pub fn new(platform_index: usize, device_index: usize) -> Result<Self> {
        let platforms = Platform::list();
        let platform = platforms.get(platform_index).copied().ok_or_else(|| {
            StatsError::DeviceSetup(format!(
                "platform index {} out of range (available: {})",
                platform_index,
                platforms.len()
            ))
        })?;

        let devices = Device::list_all(platform).map_err(setup)?;
        let device = devices.get(device_index).copied().ok_or_else(|| {
            StatsError::DeviceSetup(format!(
                "device index {} out of range (available: {})",
                device_index,
                devices.len()
            ))
        })?;

        let context = Context::builder()
            .platform(platform)
            .devices(device)
            .build()
            .map_err(setup)?;
        let queue = Queue::new(&context, device, None).map_err(setup)?;

        let program = build_program(&context, device)?;

        let info = describe(platform, device)?;
        info!(platform = %info.platform, device = %info.name, "OpenCL session opened");

        Ok(Self {
            context,
            queue,
            program,
            info,
        })
    }

    /// Enumerate all OpenCL platforms and their devices.
    pub fn platforms() -> Result<Vec<PlatformListing>> {
        Platform::list()
            .into_iter()
            .enumerate()
            .map(|(index, platform)| {
                let devices = Device::list_all(platform)
                    .map_err(setup)?
                    .into_iter()
                    .map(|device| describe(platform, device))
                    .collect::<Result<Vec<_>>>()?;
                Ok(PlatformListing {
                    backend: Backend::OpenCl,
                    index,
                    name: platform.name().map_err(setup)?,
                    devices,
                })
            })
            .collect()
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}

fn build_program(context: &Context, device: Device) -> Result<Program> {
    Program::builder()
        .src(KERNEL_SOURCE)
        .devices(device)
        .cmplr_opt(BUILD_OPTIONS)
        .build(context)
        .map_err(|e| {
            let (status, log) = build_diagnostics(context, device)
                .unwrap_or_else(|| ("unavailable".to_string(), e.to_string()));
            StatsError::KernelBuild {
                status,
                options: BUILD_OPTIONS.to_string(),
                log,
            }
        })
}

/// Compile the library again through the core API and read back the
/// `CL_PROGRAM_BUILD_STATUS` and build log the driver reports for `device`.
fn build_diagnostics(context: &Context, device: Device) -> Option<(String, String)> {
    use ocl::core::{self, ProgramBuildInfo};

    let source = CString::new(KERNEL_SOURCE).ok()?;
    let options = CString::new(BUILD_OPTIONS).ok()?;
    let program = core::create_program_with_source(context.as_core(), &[source]).ok()?;
    let device_id = device.as_core();

    // Expected to fail again; the outcome is read from the build info below.
    let _ = core::build_program(&program, Some(&[device_id][..]), &options, None, None);

    let status =
        core::get_program_build_info(&program, device_id, ProgramBuildInfo::BuildStatus).ok()?;
    let log = core::get_program_build_info(&program, device_id, ProgramBuildInfo::BuildLog).ok()?;
    Some((status.to_string(), log.to_string()))
}

fn describe(platform: Platform, device: Device) -> Result<DeviceInfo> {
    let compute_units = match device
        .info(ocl::enums::DeviceInfo::MaxComputeUnits)
        .map_err(setup)?
    {
        ocl::enums::DeviceInfoResult::MaxComputeUnits(n) => n as usize,
        _ => 0,
    };
    Ok(DeviceInfo {
        platform: platform.name().map_err(setup)?,
        name: device.name().map_err(setup)?,
        max_work_group_size: device.max_wg_size().map_err(setup)?,
        compute_units,
    })
}

impl DeviceSession for OpenClSession {
    type Buffer = Buffer<i32>;

    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn upload(&self, data: &[i32]) -> Result<Buffer<i32>> {
        Buffer::<i32>::builder()
            .queue(self.queue.clone())
            .flags(flags::MEM_READ_ONLY)
            .len(data.len())
            .copy_host_slice(data)
            .build()
            .map_err(buffer)
    }

    fn filled(&self, len: usize, pattern: i32) -> Result<Buffer<i32>> {
        let buf = Buffer::<i32>::builder()
            .queue(self.queue.clone())
            .flags(flags::MEM_READ_WRITE)
            .len(len)
            .fill_val(pattern)
            .build()
            .map_err(buffer)?;
        self.queue.finish().map_err(buffer)?;
        Ok(buf)
    }

    fn reduce(
        &self,
        kernel: ReduceKernel,
        input: &Buffer<i32>,
        output: &Buffer<i32>,
        geometry: &GroupGeometry,
    ) -> Result<()> {
        let name = kernel.name();
        let k = Kernel::builder()
            .program(&self.program)
            .name(name)
            .queue(self.queue.clone())
            .global_work_size(geometry.padded_len)
            .local_work_size(geometry.group_size)
            .arg(input)
            .arg(output)
            .arg_local::<i32>(geometry.group_size)
            .build()
            .map_err(dispatch(name))?;

        unsafe {
            k.enq().map_err(dispatch(name))?;
        }
        self.queue.finish().map_err(dispatch(name))?;
        debug!(kernel = name, "kernel finished");
        Ok(())
    }

    fn histogram(
        &self,
        input: &Buffer<i32>,
        bins: &Buffer<i32>,
        bounds: HistBounds,
        nr_bins: usize,
        geometry: &GroupGeometry,
    ) -> Result<()> {
        let k = Kernel::builder()
            .program(&self.program)
            .name(HISTOGRAM_KERNEL)
            .queue(self.queue.clone())
            .global_work_size(geometry.padded_len)
            .local_work_size(geometry.group_size)
            .arg(input)
            .arg(bins)
            .arg(bounds.min)
            .arg(bounds.max)
            .arg(nr_bins as i32)
            .build()
            .map_err(dispatch(HISTOGRAM_KERNEL))?;

        unsafe {
            k.enq().map_err(dispatch(HISTOGRAM_KERNEL))?;
        }
        self.queue.finish().map_err(dispatch(HISTOGRAM_KERNEL))?;
        Ok(())
    }

    fn read(&self, buf: &Buffer<i32>, out: &mut [i32]) -> Result<()> {
        buf.read(out).enq().map_err(buffer)
    }
}
