//! Uniform error reporting.
//!
//! Errors never propagate out of the runtime's entry points. With a context
//! they become an internal-error failure on it; without one they are logged.

use std::fmt::Display;

use crate::context::KernelContext;
use crate::error::Status;

/// Report `msg` as an internal error against `ctx`, or log it if there is none.
pub fn report_internal_error(ctx: Option<&dyn KernelContext>, msg: impl Display) {
    match ctx {
        Some(ctx) => ctx.ctx_failure_with_warning(Status::internal(msg.to_string())),
        None => tracing::warn!("{}", msg),
    }
}

/// Pass `Ok` values through; report an `Err` and turn it into `None`.
pub fn report_if_error<T, E: Display>(
    ctx: Option<&dyn KernelContext>,
    result: Result<T, E>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            report_internal_error(ctx, e);
            None
        }
    }
}
