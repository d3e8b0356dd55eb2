//! In-process fakes for the driver and host collaborators, used by unit tests.

use std::collections::HashSet;
use std::ffi::{c_void, CStr};
use std::time::Duration;

use parking_lot::Mutex;

use crate::context::{GpuStream, KernelContext};
use crate::driver::{
    call_error, FunctionHandle, GpuDriver, LaunchConfig, ModuleBlob, ModuleHandle, StreamHandle,
};
use crate::error::{DriverError, Status};
use crate::registry::ResourceMgr;

/// One submitted launch, as seen by [`FakeDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRecord {
    pub function: FunctionHandle,
    pub config: LaunchConfig,
    pub stream: StreamHandle,
    pub params: usize,
}

#[derive(Default)]
struct FakeState {
    next_handle: usize,
    loads: Vec<ModuleBlob>,
    unloads: Vec<ModuleHandle>,
    lookups: Vec<String>,
    launches: Vec<LaunchRecord>,
    failing_loads: HashSet<ModuleBlob>,
    failing_unloads: HashSet<ModuleHandle>,
    fail_launches: bool,
}

/// A driver that hands out fake handles and records every call.
pub struct FakeDriver {
    kernels: HashSet<String>,
    load_delay: Option<Duration>,
    state: Mutex<FakeState>,
}

impl FakeDriver {
    pub const ERROR_INVALID_IMAGE: i32 = 200;
    pub const ERROR_INVALID_HANDLE: i32 = 400;
    pub const ERROR_NOT_FOUND: i32 = 500;
    pub const ERROR_LAUNCH_FAILED: i32 = 719;

    /// A driver whose modules all export the kernels `add` and `mul`.
    pub fn new() -> Self {
        Self::with_kernels(&["add", "mul"])
    }

    pub fn with_kernels(kernels: &[&str]) -> Self {
        Self {
            kernels: kernels.iter().map(|k| k.to_string()).collect(),
            load_delay: None,
            state: Mutex::new(FakeState { next_handle: 0x1000, ..Default::default() }),
        }
    }

    /// Make every load sleep, widening race windows in concurrency tests.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    pub fn fail_load(&self, blob: ModuleBlob) {
        self.state.lock().failing_loads.insert(blob);
    }

    pub fn heal_load(&self, blob: ModuleBlob) {
        self.state.lock().failing_loads.remove(&blob);
    }

    pub fn fail_unload(&self, module: ModuleHandle) {
        self.state.lock().failing_unloads.insert(module);
    }

    pub fn fail_launches(&self) {
        self.state.lock().fail_launches = true;
    }

    pub fn loads(&self) -> Vec<ModuleBlob> {
        self.state.lock().loads.clone()
    }

    pub fn load_count(&self) -> usize {
        self.state.lock().loads.len()
    }

    pub fn unloads(&self) -> Vec<ModuleHandle> {
        self.state.lock().unloads.clone()
    }

    pub fn lookups(&self) -> Vec<String> {
        self.state.lock().lookups.clone()
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.state.lock().launches.clone()
    }

    fn next_handle(state: &mut FakeState) -> *mut c_void {
        let raw = state.next_handle;
        state.next_handle += 0x10;
        raw as *mut c_void
    }
}

impl GpuDriver for FakeDriver {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn load_module(&self, image: ModuleBlob) -> Result<ModuleHandle, DriverError> {
        if let Some(delay) = self.load_delay {
            std::thread::sleep(delay);
        }
        let mut state = self.state.lock();
        state.loads.push(image);
        if state.failing_loads.contains(&image) {
            return Err(call_error(self, "fakeModuleLoadData", Self::ERROR_INVALID_IMAGE));
        }
        Ok(ModuleHandle::from_raw(Self::next_handle(&mut state)))
    }

    fn get_function(&self, module: ModuleHandle, name: &CStr) -> Result<FunctionHandle, DriverError> {
        let name = name.to_string_lossy().into_owned();
        let mut state = self.state.lock();
        state.lookups.push(name.clone());
        if module.is_null() {
            return Err(call_error(self, "fakeModuleGetFunction", Self::ERROR_INVALID_HANDLE));
        }
        if !self.kernels.contains(&name) {
            return Err(call_error(self, "fakeModuleGetFunction", Self::ERROR_NOT_FOUND));
        }
        Ok(FunctionHandle::from_raw(Self::next_handle(&mut state)))
    }

    unsafe fn launch_kernel(
        &self,
        function: FunctionHandle,
        config: &LaunchConfig,
        stream: StreamHandle,
        params: *mut *mut c_void,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        if state.fail_launches {
            return Err(call_error(self, "fakeLaunchKernel", Self::ERROR_LAUNCH_FAILED));
        }
        state.launches.push(LaunchRecord {
            function,
            config: *config,
            stream,
            params: params as usize,
        });
        Ok(())
    }

    fn unload_module(&self, module: ModuleHandle) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        state.unloads.push(module);
        if state.failing_unloads.contains(&module) {
            return Err(call_error(self, "fakeModuleUnload", Self::ERROR_INVALID_HANDLE));
        }
        Ok(())
    }

    fn error_name(&self, code: i32) -> Option<String> {
        let name = match code {
            Self::ERROR_INVALID_IMAGE => "FAKE_ERROR_INVALID_IMAGE",
            Self::ERROR_INVALID_HANDLE => "FAKE_ERROR_INVALID_HANDLE",
            Self::ERROR_NOT_FOUND => "FAKE_ERROR_NOT_FOUND",
            Self::ERROR_LAUNCH_FAILED => "FAKE_ERROR_LAUNCH_FAILED",
            _ => return None,
        };
        Some(name.to_string())
    }
}

pub struct FakeStream(pub StreamHandle);

impl GpuStream for FakeStream {
    fn native_handle(&self) -> StreamHandle {
        self.0
    }
}

/// A host context that records every failure reported against it.
pub struct FakeContext {
    registry: Option<ResourceMgr>,
    stream: Option<FakeStream>,
    failures: Mutex<Vec<Status>>,
}

impl FakeContext {
    pub const STREAM: usize = 0xabc0;

    /// A context with its own registry and a non-default stream.
    pub fn new() -> Self {
        Self {
            registry: Some(ResourceMgr::default()),
            stream: Some(FakeStream(StreamHandle::from_raw(Self::STREAM as *mut c_void))),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn without_registry() -> Self {
        Self { registry: None, ..Self::new() }
    }

    pub fn without_stream() -> Self {
        Self { stream: None, ..Self::new() }
    }

    pub fn registry(&self) -> &ResourceMgr {
        self.registry.as_ref().expect("context has no registry")
    }

    pub fn failures(&self) -> Vec<Status> {
        self.failures.lock().clone()
    }
}

impl KernelContext for FakeContext {
    fn resource_manager(&self) -> Option<&ResourceMgr> {
        self.registry.as_ref()
    }

    fn stream(&self) -> Option<&dyn GpuStream> {
        self.stream.as_ref().map(|s| s as &dyn GpuStream)
    }

    fn ctx_failure_with_warning(&self, status: Status) {
        self.failures.lock().push(status);
    }
}
