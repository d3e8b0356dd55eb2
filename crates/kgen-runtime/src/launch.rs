//! Kernel launch entry point.
//!
//! Turns (module image, kernel name, geometry, parameters) into a kernel
//! submission on the context's current stream, going through the module cache
//! shared in the host registry.

use std::ffi::{c_void, CStr};
use std::sync::Arc;

use crate::cache::ModuleCache;
use crate::config::RuntimeConfig;
use crate::context::KernelContext;
use crate::driver::{GpuDriver, LaunchConfig, ModuleBlob, StreamHandle};
use crate::error::LaunchError;
use crate::report::report_internal_error;

/// One kernel launch. Consumed by a single [`KernelLauncher::launch`] call.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    pub blob: ModuleBlob,
    pub kernel_name: &'a CStr,
    pub config: LaunchConfig,
    /// One pointer per kernel argument; layout is defined by the kernel.
    pub params: *mut *mut c_void,
}

impl<'a> LaunchRequest<'a> {
    pub fn new(
        blob: ModuleBlob,
        kernel_name: &'a CStr,
        grid_dim: (u32, u32, u32),
        block_dim: (u32, u32, u32),
        params: *mut *mut c_void,
    ) -> Self {
        Self {
            blob,
            kernel_name,
            config: LaunchConfig::new(grid_dim, block_dim),
            params,
        }
    }
}

/// Launches kernels from generated code through a shared [`ModuleCache`].
pub struct KernelLauncher {
    driver: Arc<dyn GpuDriver>,
    config: RuntimeConfig,
}

impl KernelLauncher {
    pub fn new(driver: Arc<dyn GpuDriver>, config: RuntimeConfig) -> Self {
        Self { driver, config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Launch `request` on the context's current stream.
    ///
    /// Never fails: errors are reported against `ctx`, or logged when there is
    /// no context, and the kernel is not launched. An empty grid is a no-op.
    ///
    /// # Safety
    /// `request.params` must satisfy [`GpuDriver::launch_kernel`], and
    /// `request.blob` must point at a loadable module image.
    pub unsafe fn launch(&self, ctx: Option<&dyn KernelContext>, request: &LaunchRequest<'_>) {
        if request.config.is_empty_grid() {
            return;
        }
        if let Err(e) = self.try_launch(ctx, request) {
            report_internal_error(ctx, e);
        }
    }

    unsafe fn try_launch(
        &self,
        ctx: Option<&dyn KernelContext>,
        request: &LaunchRequest<'_>,
    ) -> Result<(), LaunchError> {
        let rm = ctx
            .and_then(|c| c.resource_manager())
            .ok_or(LaunchError::MissingResourceManager)?;
        let container = self.config.container.as_deref().unwrap_or(rm.default_container());
        let cache = rm
            .lookup_or_create(container, &self.config.resource_name, || {
                ModuleCache::create(Arc::clone(&self.driver), &self.config)
            })
            .map_err(LaunchError::Cache)?;

        let stream = ctx
            .and_then(|c| c.stream())
            .map(|s| s.native_handle())
            .unwrap_or_else(StreamHandle::null);

        let module = cache.lookup_or_load(request.blob)?;
        let function = self.driver.get_function(module, request.kernel_name)?;
        let config = LaunchConfig { shared_mem_bytes: 0, ..request.config };
        self.driver.launch_kernel(function, &config, stream, request.params)?;
        tracing::trace!(
            "launched {:?} grid={:?} block={:?}",
            request.kernel_name,
            config.grid_dim,
            config.block_dim
        );
        Ok(())
    }
}

/// Convert C `intptr_t` launch dimensions, rejecting negative or oversized ones.
pub fn launch_config_from_intptr(grid: [isize; 3], block: [isize; 3]) -> Result<LaunchConfig, LaunchError> {
    fn dim(axis: &'static str, value: isize) -> Result<u32, LaunchError> {
        u32::try_from(value).map_err(|_| LaunchError::InvalidDimension { axis, value })
    }
    Ok(LaunchConfig::new(
        (dim("gridX", grid[0])?, dim("gridY", grid[1])?, dim("gridZ", grid[2])?),
        (dim("blockX", block[0])?, dim("blockY", block[1])?, dim("blockZ", block[2])?),
    ))
}
