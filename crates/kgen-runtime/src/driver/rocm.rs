//! ROCm/HIP backend.
//!
//! Parallel to `cuda.rs`: the `hipModule*` entry points are resolved from
//! `libamdhip64.so` at load time, so any ROCm install works without pinning a
//! version at build time.

use std::ffi::{c_char, c_int, c_uint, c_void, CStr};

use libloading::Library;

use super::{call_error, open_library, symbol};
use super::{FunctionHandle, GpuDriver, LaunchConfig, ModuleBlob, ModuleHandle, StreamHandle};
use crate::error::DriverError;

pub type HipErrorT = c_int;
pub const HIP_SUCCESS: HipErrorT = 0;

type HipModule = *mut c_void;
type HipFunction = *mut c_void;
type HipStream = *mut c_void;

type FnHipInit = unsafe extern "C" fn(c_uint) -> HipErrorT;
type FnHipModuleLoadData = unsafe extern "C" fn(*mut HipModule, *const c_void) -> HipErrorT;
type FnHipModuleGetFunction =
    unsafe extern "C" fn(*mut HipFunction, HipModule, *const c_char) -> HipErrorT;
type FnHipModuleUnload = unsafe extern "C" fn(HipModule) -> HipErrorT;
type FnHipModuleLaunchKernel = unsafe extern "C" fn(
    HipFunction,
    c_uint, c_uint, c_uint,   // grid x, y, z
    c_uint, c_uint, c_uint,   // block x, y, z
    c_uint,                   // shared mem bytes
    HipStream,                // stream (null = default)
    *mut *mut c_void,         // kernel params
    *mut *mut c_void,         // extra (null)
) -> HipErrorT;
type FnHipGetErrorName = unsafe extern "C" fn(HipErrorT) -> *const c_char;

/// HIP runtime API loaded from a shared library.
pub struct HipDriver {
    _lib: Library,
    hip_module_load_data: FnHipModuleLoadData,
    hip_module_get_function: FnHipModuleGetFunction,
    hip_module_unload: FnHipModuleUnload,
    hip_module_launch_kernel: FnHipModuleLaunchKernel,
    hip_get_error_name: FnHipGetErrorName,
}

impl HipDriver {
    /// Load the HIP library at `path` and initialize the runtime.
    pub fn load(path: &str) -> Result<Self, DriverError> {
        let lib = open_library(path)?;
        let driver = unsafe {
            let hip_init: FnHipInit = symbol(&lib, b"hipInit\0")?;
            let driver = HipDriver {
                hip_module_load_data: symbol(&lib, b"hipModuleLoadData\0")?,
                hip_module_get_function: symbol(&lib, b"hipModuleGetFunction\0")?,
                hip_module_unload: symbol(&lib, b"hipModuleUnload\0")?,
                hip_module_launch_kernel: symbol(&lib, b"hipModuleLaunchKernel\0")?,
                hip_get_error_name: symbol(&lib, b"hipGetErrorName\0")?,
                _lib: lib,
            };
            driver.check(hip_init(0), "hipInit")?;
            driver
        };
        tracing::debug!("loaded HIP runtime from {}", path);
        Ok(driver)
    }

    fn check(&self, code: HipErrorT, op: &'static str) -> Result<(), DriverError> {
        if code == HIP_SUCCESS {
            Ok(())
        } else {
            Err(call_error(self, op, code))
        }
    }
}

impl GpuDriver for HipDriver {
    fn name(&self) -> &'static str {
        "rocm"
    }

    fn load_module(&self, image: ModuleBlob) -> Result<ModuleHandle, DriverError> {
        let mut module: HipModule = std::ptr::null_mut();
        self.check(
            unsafe { (self.hip_module_load_data)(&mut module, image.as_ptr()) },
            "hipModuleLoadData",
        )?;
        Ok(ModuleHandle::from_raw(module))
    }

    fn get_function(&self, module: ModuleHandle, name: &CStr) -> Result<FunctionHandle, DriverError> {
        let mut function: HipFunction = std::ptr::null_mut();
        self.check(
            unsafe { (self.hip_module_get_function)(&mut function, module.as_raw(), name.as_ptr()) },
            "hipModuleGetFunction",
        )?;
        Ok(FunctionHandle::from_raw(function))
    }

    unsafe fn launch_kernel(
        &self,
        function: FunctionHandle,
        config: &LaunchConfig,
        stream: StreamHandle,
        params: *mut *mut c_void,
    ) -> Result<(), DriverError> {
        let (gx, gy, gz) = config.grid_dim;
        let (bx, by, bz) = config.block_dim;
        self.check(
            (self.hip_module_launch_kernel)(
                function.as_raw(),
                gx, gy, gz,
                bx, by, bz,
                config.shared_mem_bytes,
                stream.as_raw(),
                params,
                std::ptr::null_mut(),
            ),
            "hipModuleLaunchKernel",
        )
    }

    fn unload_module(&self, module: ModuleHandle) -> Result<(), DriverError> {
        self.check(unsafe { (self.hip_module_unload)(module.as_raw()) }, "hipModuleUnload")
    }

    fn error_name(&self, code: i32) -> Option<String> {
        let name = unsafe { (self.hip_get_error_name)(code) };
        if name.is_null() {
            return None;
        }
        Some(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
    }
}
