use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::accel::workgroup::WorkGroupSession;
use crate::accel::{AccelMetadata, Backend, DeviceSession};
use crate::error::{Result, StatsError};

#[cfg(feature = "opencl")]
use crate::accel::opencl::OpenClSession;

/// Backend requested by configuration or the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BackendChoice {
    /// OpenCL when compiled in and a device is present, otherwise work-group emulation
    #[default]
    Auto,
    #[serde(rename = "opencl")]
    #[value(name = "opencl")]
    OpenCl,
    WorkGroup,
    Scalar,
}

/// Which platform/device to open and through which backend.
#[derive(Debug, Clone, Copy)]
pub struct DeviceSelection {
    pub backend: BackendChoice,
    pub platform: usize,
    pub device: usize,
}

/// Trait that all accelerated operations must implement.
/// Every op has a device implementation per backend plus a scalar reference.
pub trait AcceleratedOp<Input, Output> {
    /// OpenCL implementation (bundled kernel library)
    fn run_opencl(&self, input: &Input, manager: &AccelerationManager) -> Result<Output>;

    /// Work-group emulation on the host pool
    fn run_work_group(&self, input: &Input, manager: &AccelerationManager) -> Result<Output>;

    /// Scalar implementation (Reference)
    fn run_scalar(&self, input: &Input) -> Result<Output>;
}

/// Manager to handle backend selection and dispatch.
/// Owns the one device session used for the whole run.
pub struct AccelerationManager {
    backend: Backend,
    work_group: Option<WorkGroupSession>,
    #[cfg(feature = "opencl")]
    opencl: Option<OpenClSession>,
}

impl AccelerationManager {
    /// Resolve the requested backend and open its device session.
    pub fn new(selection: &DeviceSelection) -> Result<Self> {
        let backend = Self::select_backend(selection.backend);
        let mut manager = Self {
            backend,
            work_group: None,
            #[cfg(feature = "opencl")]
            opencl: None,
        };

        match backend {
            Backend::OpenCl => manager.open_opencl(selection)?,
            Backend::WorkGroup => {
                manager.work_group = Some(WorkGroupSession::new(selection.platform, selection.device)?);
            }
            Backend::Scalar => {}
        }

        info!(
            backend = %manager.backend,
            device = %manager.device_name(),
            "AccelerationManager initialized"
        );
        Ok(manager)
    }

    #[cfg(feature = "opencl")]
    fn open_opencl(&mut self, selection: &DeviceSelection) -> Result<()> {
        match OpenClSession::new(selection.platform, selection.device) {
            Ok(session) => {
                self.opencl = Some(session);
                Ok(())
            }
            Err(e) if selection.backend == BackendChoice::Auto => {
                warn!(error = %e, "OpenCL unavailable, falling back to work-group emulation");
                self.backend = Backend::WorkGroup;
                self.work_group = Some(WorkGroupSession::new(0, 0)?);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    #[cfg(not(feature = "opencl"))]
    fn open_opencl(&mut self, _selection: &DeviceSelection) -> Result<()> {
        Err(StatsError::DeviceSetup(
            "built without the `opencl` feature".to_string(),
        ))
    }

    /// Map a requested backend onto a concrete one.
    pub fn select_backend(choice: BackendChoice) -> Backend {
        match choice {
            BackendChoice::OpenCl => Backend::OpenCl,
            BackendChoice::WorkGroup => Backend::WorkGroup,
            BackendChoice::Scalar => Backend::Scalar,
            BackendChoice::Auto if Self::opencl_available() => Backend::OpenCl,
            BackendChoice::Auto => Backend::WorkGroup,
        }
    }

    #[cfg(feature = "opencl")]
    fn opencl_available() -> bool {
        OpenClSession::is_available()
    }

    #[cfg(not(feature = "opencl"))]
    fn opencl_available() -> bool {
        false
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Name of the device behind the active backend.
    pub fn device_name(&self) -> String {
        match self.backend {
            #[cfg(feature = "opencl")]
            Backend::OpenCl => self
                .opencl
                .as_ref()
                .map(|s| s.info().name.clone())
                .unwrap_or_default(),
            Backend::WorkGroup => self
                .work_group
                .as_ref()
                .map(|s| s.info().name.clone())
                .unwrap_or_default(),
            _ => "scalar reference".to_string(),
        }
    }

    pub fn get_work_group(&self) -> Option<&WorkGroupSession> {
        self.work_group.as_ref()
    }

    #[cfg(feature = "opencl")]
    pub fn get_opencl(&self) -> Option<&OpenClSession> {
        self.opencl.as_ref()
    }

    /// Execute an operation on the active backend.
    /// Includes verification against the scalar reference (debug builds).
    pub fn execute<Op, Input, Output>(
        &self,
        op: &Op,
        input: &Input,
    ) -> Result<(Output, AccelMetadata)>
    where
        Op: AcceleratedOp<Input, Output>,
        Output: PartialEq + std::fmt::Debug,
    {
        let started = Instant::now();
        let result = match self.backend {
            Backend::OpenCl => op.run_opencl(input, self),
            Backend::WorkGroup => op.run_work_group(input, self),
            Backend::Scalar => op.run_scalar(input),
        }?;
        let duration_us = started.elapsed().as_micros() as u64;

        // In debug builds, verify against scalar reference
        #[cfg(debug_assertions)]
        {
            if self.backend != Backend::Scalar {
                if let Ok(reference) = op.run_scalar(input) {
                    if result != reference {
                        warn!(
                            backend = %self.backend,
                            ?result,
                            ?reference,
                            "Acceleration mismatch! Device result differs from the scalar reference."
                        );
                    } else {
                        debug!(backend = %self.backend, "Acceleration verification passed");
                    }
                }
            }
        }

        let metadata = AccelMetadata {
            path_used: self.backend,
            device: self.device_name(),
            duration_us,
        };
        Ok((result, metadata))
    }
}
