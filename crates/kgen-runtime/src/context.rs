//! Host collaborators seen by a kernel launch.

use crate::driver::StreamHandle;
use crate::error::Status;
use crate::registry::ResourceMgr;

/// An execution stream owned by the host framework.
pub trait GpuStream {
    /// The driver-native stream handle to submit work on.
    fn native_handle(&self) -> StreamHandle;
}

/// Per-call execution context supplied by the host framework.
pub trait KernelContext {
    /// Registry holding shared runtime resources, if the host has one.
    fn resource_manager(&self) -> Option<&ResourceMgr>;

    /// The current stream of the context's device. `None` means the driver's
    /// default stream.
    fn stream(&self) -> Option<&dyn GpuStream>;

    /// Record a failure against the current computation without aborting it.
    fn ctx_failure_with_warning(&self, status: Status);
}

/// A borrowed context in a form that can cross the C ABI as a thin pointer.
///
/// Generated code receives `*const ContextRef` from the host and passes it
/// back unchanged to [`kgen_launch_kernel`](crate::ffi::kgen_launch_kernel).
pub struct ContextRef<'a>(pub &'a dyn KernelContext);

impl<'a> ContextRef<'a> {
    pub fn new(ctx: &'a dyn KernelContext) -> Self {
        Self(ctx)
    }

    pub fn get(&self) -> &'a dyn KernelContext {
        self.0
    }
}
