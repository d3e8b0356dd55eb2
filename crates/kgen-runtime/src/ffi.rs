//! C ABI entry point called from generated code.
//!
//! Dimensions are `intptr_t` to match the index type of the code generator, so
//! generated code needs no casts.

use std::ffi::{c_char, c_void, CStr};
use std::sync::OnceLock;

use crate::config::RuntimeConfig;
use crate::context::{ContextRef, KernelContext};
use crate::driver::{platform_driver, ModuleBlob};
use crate::error::LaunchError;
use crate::launch::{launch_config_from_intptr, KernelLauncher, LaunchRequest};
use crate::report::report_internal_error;

static LAUNCHER: OnceLock<KernelLauncher> = OnceLock::new();
static NO_PLATFORM_DRIVER: OnceLock<()> = OnceLock::new();

/// Install the process-wide launcher used by [`kgen_launch_kernel`].
///
/// Fails, handing the argument back, once a launcher is in place.
pub fn install(launcher: KernelLauncher) -> Result<(), KernelLauncher> {
    LAUNCHER.set(launcher)
}

/// The process-wide launcher: the installed one, else the build-selected
/// driver with configuration from the environment.
///
/// A missing platform driver is probed once; until a launcher is installed
/// later calls return `None` without retrying.
pub fn global() -> Option<&'static KernelLauncher> {
    if let Some(launcher) = LAUNCHER.get() {
        return Some(launcher);
    }
    if NO_PLATFORM_DRIVER.get().is_some() {
        return None;
    }
    let config = RuntimeConfig::from_env();
    match platform_driver(&config) {
        Ok(driver) => Some(LAUNCHER.get_or_init(|| KernelLauncher::new(driver, config))),
        Err(e) => {
            NO_PLATFORM_DRIVER.get_or_init(|| tracing::warn!("GPU runtime unavailable: {}", e));
            None
        }
    }
}

/// Launch `kernel_name` from the module image at `module_blob` on the current
/// stream of `ctx`. Errors are reported through `ctx` (or logged if `ctx` is
/// null); nothing is returned.
///
/// # Safety
/// - `ctx` is null or points at a live [`ContextRef`].
/// - `module_blob` points at a module image that outlives the host registry.
/// - `kernel_name` is null or a nul-terminated string.
/// - `params` holds one valid argument pointer per kernel parameter.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn kgen_launch_kernel(
    ctx: *mut c_void,
    module_blob: *mut c_void,
    kernel_name: *const c_char,
    grid_x: isize,
    grid_y: isize,
    grid_z: isize,
    block_x: isize,
    block_y: isize,
    block_z: isize,
    params: *mut *mut c_void,
) {
    if grid_x == 0 || grid_y == 0 || grid_z == 0 {
        return;
    }

    let ctx: Option<&dyn KernelContext> = if ctx.is_null() {
        None
    } else {
        Some((*(ctx as *const ContextRef<'_>)).get())
    };

    let config = match launch_config_from_intptr([grid_x, grid_y, grid_z], [block_x, block_y, block_z]) {
        Ok(config) => config,
        Err(e) => return report_internal_error(ctx, e),
    };
    if kernel_name.is_null() {
        return report_internal_error(ctx, "expected kernel name");
    }
    let Some(launcher) = global() else {
        return report_internal_error(ctx, LaunchError::NoDriver("no launcher installed".into()));
    };

    let request = LaunchRequest {
        blob: ModuleBlob::from_raw(module_blob),
        kernel_name: CStr::from_ptr(kernel_name),
        config,
        params,
    };
    launcher.launch(ctx, &request);
}
