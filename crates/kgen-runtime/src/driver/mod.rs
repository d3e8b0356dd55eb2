//! GPU driver abstraction.
//!
//! The rest of the crate talks to the GPU only through [`GpuDriver`]. Exactly
//! one concrete backend is compiled in, chosen by the `cuda` or `rocm` cargo
//! feature. Both backends resolve the driver's C API from its shared library at
//! runtime, so building needs no GPU toolkit.

use std::ffi::{c_void, CStr};
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::error::DriverError;

#[cfg(all(feature = "cuda", feature = "rocm"))]
compile_error!("features `cuda` and `rocm` are mutually exclusive");

#[cfg(feature = "cuda")]
pub mod cuda;
#[cfg(feature = "rocm")]
pub mod rocm;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(*mut c_void);

        impl $name {
            /// The driver's null/invalid handle.
            pub const fn null() -> Self {
                Self(std::ptr::null_mut())
            }

            pub const fn from_raw(raw: *mut c_void) -> Self {
                Self(raw)
            }

            pub const fn as_raw(self) -> *mut c_void {
                self.0
            }

            pub fn is_null(self) -> bool {
                self.0.is_null()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::null()
            }
        }

        // Driver handles are process-global tokens; the driver synchronizes
        // access to the objects behind them.
        unsafe impl Send for $name {}
        unsafe impl Sync for $name {}
    };
}

opaque_handle!(
    /// A module resident in the driver (`CUmodule` / `hipModule_t`).
    ModuleHandle
);
opaque_handle!(
    /// A kernel resolved from a loaded module (`CUfunction` / `hipFunction_t`).
    FunctionHandle
);
opaque_handle!(
    /// A driver-native stream (`CUstream` / `hipStream_t`). Null is the default stream.
    StreamHandle
);

/// A compiled GPU module image, identified by its address.
///
/// Two blobs are equal only if they point at the same memory: identical bytes
/// at different addresses are different blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleBlob(*const c_void);

// The blob is only read by the driver during a load.
unsafe impl Send for ModuleBlob {}
unsafe impl Sync for ModuleBlob {}

impl ModuleBlob {
    /// Wrap a raw module image pointer.
    ///
    /// # Safety
    /// `ptr` must point at a driver-loadable image that stays valid and
    /// unchanged for as long as any cache may load from it.
    pub const unsafe fn from_raw(ptr: *const c_void) -> Self {
        Self(ptr)
    }

    /// Wrap an image with static storage, e.g. one embedded by `include_bytes!`.
    pub fn from_static(image: &'static [u8]) -> Self {
        Self(image.as_ptr().cast())
    }

    pub fn as_ptr(self) -> *const c_void {
        self.0
    }
}

/// Grid/block geometry of one kernel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    pub grid_dim: (u32, u32, u32),
    pub block_dim: (u32, u32, u32),
    pub shared_mem_bytes: u32,
}

impl LaunchConfig {
    /// Launch geometry with no dynamic shared memory.
    pub fn new(grid_dim: (u32, u32, u32), block_dim: (u32, u32, u32)) -> Self {
        Self { grid_dim, block_dim, shared_mem_bytes: 0 }
    }

    /// Whether the grid has no blocks, i.e. the launch has no work.
    pub fn is_empty_grid(&self) -> bool {
        let (x, y, z) = self.grid_dim;
        x == 0 || y == 0 || z == 0
    }
}

/// The driver capabilities the module cache and the launcher need.
pub trait GpuDriver: Send + Sync {
    /// Backend name for logs ("cuda", "rocm", ...).
    fn name(&self) -> &'static str;

    /// Load a module from an in-memory image.
    fn load_module(&self, image: ModuleBlob) -> Result<ModuleHandle, DriverError>;

    /// Resolve a kernel by name from a loaded module.
    fn get_function(&self, module: ModuleHandle, name: &CStr) -> Result<FunctionHandle, DriverError>;

    /// Enqueue a kernel on `stream`. Returns once the launch is submitted.
    ///
    /// # Safety
    /// `params` must point at one valid argument pointer per kernel parameter,
    /// matching the kernel's signature.
    unsafe fn launch_kernel(
        &self,
        function: FunctionHandle,
        config: &LaunchConfig,
        stream: StreamHandle,
        params: *mut *mut c_void,
    ) -> Result<(), DriverError>;

    /// Unload a module previously returned by [`load_module`](Self::load_module).
    fn unload_module(&self, module: ModuleHandle) -> Result<(), DriverError>;

    /// Symbolic name for a driver status code.
    fn error_name(&self, code: i32) -> Option<String>;
}

/// Build the error for a failed driver call, resolving the code's symbolic name.
pub fn call_error<D: GpuDriver + ?Sized>(driver: &D, op: &'static str, code: i32) -> DriverError {
    DriverError::Call {
        op,
        code,
        name: driver.error_name(code).unwrap_or_else(|| "<unknown>".to_string()),
    }
}

/// The backend selected at build time.
#[cfg(feature = "cuda")]
pub fn platform_driver(config: &RuntimeConfig) -> Result<Arc<dyn GpuDriver>, DriverError> {
    let driver = cuda::CudaDriver::load(&config.cuda_library)?;
    Ok(Arc::new(driver))
}

/// The backend selected at build time.
#[cfg(all(feature = "rocm", not(feature = "cuda")))]
pub fn platform_driver(config: &RuntimeConfig) -> Result<Arc<dyn GpuDriver>, DriverError> {
    let driver = rocm::HipDriver::load(&config.hip_library)?;
    Ok(Arc::new(driver))
}

/// The backend selected at build time.
#[cfg(not(any(feature = "cuda", feature = "rocm")))]
pub fn platform_driver(_config: &RuntimeConfig) -> Result<Arc<dyn GpuDriver>, DriverError> {
    Err(DriverError::NotAvailable(
        "built without the `cuda` or `rocm` feature".to_string(),
    ))
}

#[cfg(any(feature = "cuda", feature = "rocm"))]
fn open_library(path: &str) -> Result<libloading::Library, DriverError> {
    unsafe { libloading::Library::new(path) }
        .map_err(|e| DriverError::NotAvailable(format!("{}: {}", path, e)))
}

/// Copy a function pointer out of `lib`. `name` must be nul-terminated.
///
/// # Safety
/// `T` must match the symbol's C signature.
#[cfg(any(feature = "cuda", feature = "rocm"))]
unsafe fn symbol<T: Copy>(lib: &libloading::Library, name: &[u8]) -> Result<T, DriverError> {
    lib.get::<T>(name).map(|s| *s).map_err(|e| {
        let name = String::from_utf8_lossy(&name[..name.len().saturating_sub(1)]).into_owned();
        DriverError::NotAvailable(format!("missing symbol {}: {}", name, e))
    })
}
