//! Logging setup for hosts that do not install their own subscriber.

/// Environment variable holding the log filter, e.g. `KGEN_LOG=kgen_runtime=debug`.
pub const LOG_ENV: &str = "KGEN_LOG";

/// Install a `tracing` fmt subscriber filtered by `KGEN_LOG` (default `warn`).
///
/// Does nothing if a global subscriber is already set, so it is safe to call
/// more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
        tracing::warn!("logging initialized");
    }
}
