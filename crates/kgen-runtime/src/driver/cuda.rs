//! CUDA driver API backend.
//!
//! Resolves the handful of `cu*` entry points the runtime needs from
//! `libcuda.so.1` at load time. Modules are loaded into whatever CUDA context is
//! current on the calling thread; the host framework owns context setup.

use std::ffi::{c_char, c_int, c_uint, c_void, CStr};

use libloading::Library;

use super::{call_error, open_library, symbol};
use super::{FunctionHandle, GpuDriver, LaunchConfig, ModuleBlob, ModuleHandle, StreamHandle};
use crate::error::DriverError;

pub type CuResult = c_int;
pub const CUDA_SUCCESS: CuResult = 0;

type CuModule = *mut c_void;
type CuFunction = *mut c_void;
type CuStream = *mut c_void;

type FnCuInit = unsafe extern "C" fn(c_uint) -> CuResult;
type FnCuModuleLoadData = unsafe extern "C" fn(*mut CuModule, *const c_void) -> CuResult;
type FnCuModuleGetFunction =
    unsafe extern "C" fn(*mut CuFunction, CuModule, *const c_char) -> CuResult;
type FnCuModuleUnload = unsafe extern "C" fn(CuModule) -> CuResult;
type FnCuLaunchKernel = unsafe extern "C" fn(
    CuFunction,
    c_uint, c_uint, c_uint,   // grid x, y, z
    c_uint, c_uint, c_uint,   // block x, y, z
    c_uint,                   // shared mem bytes
    CuStream,
    *mut *mut c_void,         // kernel params
    *mut *mut c_void,         // extra (null)
) -> CuResult;
type FnCuGetErrorName = unsafe extern "C" fn(CuResult, *mut *const c_char) -> CuResult;

/// CUDA driver API loaded from a shared library.
pub struct CudaDriver {
    _lib: Library,
    cu_module_load_data: FnCuModuleLoadData,
    cu_module_get_function: FnCuModuleGetFunction,
    cu_module_unload: FnCuModuleUnload,
    cu_launch_kernel: FnCuLaunchKernel,
    cu_get_error_name: FnCuGetErrorName,
}

impl CudaDriver {
    /// Load the driver library at `path` and initialize the driver API.
    pub fn load(path: &str) -> Result<Self, DriverError> {
        let lib = open_library(path)?;
        let driver = unsafe {
            let cu_init: FnCuInit = symbol(&lib, b"cuInit\0")?;
            let driver = CudaDriver {
                cu_module_load_data: symbol(&lib, b"cuModuleLoadData\0")?,
                cu_module_get_function: symbol(&lib, b"cuModuleGetFunction\0")?,
                cu_module_unload: symbol(&lib, b"cuModuleUnload\0")?,
                cu_launch_kernel: symbol(&lib, b"cuLaunchKernel\0")?,
                cu_get_error_name: symbol(&lib, b"cuGetErrorName\0")?,
                _lib: lib,
            };
            driver.check(cu_init(0), "cuInit")?;
            driver
        };
        tracing::debug!("loaded CUDA driver from {}", path);
        Ok(driver)
    }

    fn check(&self, code: CuResult, op: &'static str) -> Result<(), DriverError> {
        if code == CUDA_SUCCESS {
            Ok(())
        } else {
            Err(call_error(self, op, code))
        }
    }
}

impl GpuDriver for CudaDriver {
    fn name(&self) -> &'static str {
        "cuda"
    }

    fn load_module(&self, image: ModuleBlob) -> Result<ModuleHandle, DriverError> {
        let mut module: CuModule = std::ptr::null_mut();
        self.check(
            unsafe { (self.cu_module_load_data)(&mut module, image.as_ptr()) },
            "cuModuleLoadData",
        )?;
        Ok(ModuleHandle::from_raw(module))
    }

    fn get_function(&self, module: ModuleHandle, name: &CStr) -> Result<FunctionHandle, DriverError> {
        let mut function: CuFunction = std::ptr::null_mut();
        self.check(
            unsafe { (self.cu_module_get_function)(&mut function, module.as_raw(), name.as_ptr()) },
            "cuModuleGetFunction",
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
            (self.cu_launch_kernel)(
                function.as_raw(),
                gx, gy, gz,
                bx, by, bz,
                config.shared_mem_bytes,
                stream.as_raw(),
                params,
                std::ptr::null_mut(),
            ),
            "cuLaunchKernel",
        )
    }

    fn unload_module(&self, module: ModuleHandle) -> Result<(), DriverError> {
        self.check(unsafe { (self.cu_module_unload)(module.as_raw()) }, "cuModuleUnload")
    }

    fn error_name(&self, code: i32) -> Option<String> {
        let mut name: *const c_char = std::ptr::null();
        let rc = unsafe { (self.cu_get_error_name)(code, &mut name) };
        if rc != CUDA_SUCCESS || name.is_null() {
            return None;
        }
        Some(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
    }
}
