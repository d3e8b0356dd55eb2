//! Error types for the GPU runtime.
//!
//! Driver calls return [`DriverError`], the launch path composes them into
//! [`LaunchError`], and everything that crosses into a host context is
//! flattened into a [`Status`].

use std::fmt;

/// Errors raised by a [`GpuDriver`](crate::driver::GpuDriver) backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    #[error("GPU driver not available: {0}")]
    NotAvailable(String),

    /// A driver call returned a non-success code. `name` is the driver's
    /// symbolic error name, or `<unknown>` if the driver has none for `code`.
    #[error("'{op}' failed with '{name}'")]
    Call {
        op: &'static str,
        code: i32,
        name: String,
    },
}

/// Errors raised while servicing one kernel launch.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("expected resource_manager")]
    MissingResourceManager,

    #[error("GPU runtime cache unavailable: {0}")]
    Cache(Status),

    #[error("launch dimension {axis} out of range: {value}")]
    InvalidDimension { axis: &'static str, value: isize },

    #[error("no GPU driver available: {0}")]
    NoDriver(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Canonical status codes used by the resource registry and by context failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Internal,
    NotFound,
    AlreadyExists,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::Internal => "INTERNAL",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
        };
        f.write_str(s)
    }
}

/// A failure delivered to a host context or returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(StatusCode::AlreadyExists, message)
    }
}
