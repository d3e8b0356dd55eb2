//! # kgen-runtime
//!
//! GPU runtime support for generated kernels: a load-once cache of driver
//! modules and the kernel launch entry point called by generated code.
//!
//! Provides:
//! - [`ModuleCache`]: maps module images (by address) to loaded driver modules
//! - [`KernelLauncher`]: resolves a kernel and submits it on the current stream
//! - [`ResourceMgr`]: host registry owning the shared cache
//! - `kgen_launch_kernel`: the C ABI entry point (see [`ffi`])
//! - CUDA or ROCm backends behind the `cuda` / `rocm` features

pub mod cache;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod ffi;
pub mod launch;
pub mod logging;
pub mod registry;
pub mod report;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheStats, ModuleCache};
pub use config::RuntimeConfig;
pub use context::{ContextRef, GpuStream, KernelContext};
pub use driver::{FunctionHandle, GpuDriver, LaunchConfig, ModuleBlob, ModuleHandle, StreamHandle};
pub use error::{ConfigError, DriverError, LaunchError, Status, StatusCode};
pub use launch::{KernelLauncher, LaunchRequest};
pub use logging::init_logging;
pub use registry::{Resource, ResourceMgr};
