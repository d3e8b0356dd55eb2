//! Runtime configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Registry name under which the shared module cache is stored.
pub const DEFAULT_RESOURCE_NAME: &str = "mlir-gpu-runtime-cache";

/// Environment variable overriding [`RuntimeConfig::resource_name`].
pub const RESOURCE_NAME_ENV: &str = "KGEN_GPU_CACHE_RESOURCE";

/// Configuration for the module cache and the launch entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Registry name of the shared [`ModuleCache`](crate::ModuleCache).
    pub resource_name: String,

    /// Registry container holding the cache. `None` uses the registry's
    /// default container.
    pub container: Option<String>,

    /// Whether a failed module load is retried on the next lookup. When
    /// false the driver's null handle stays cached for that blob.
    pub retry_failed_loads: bool,

    /// Shared library providing the CUDA driver API.
    pub cuda_library: String,

    /// Shared library providing the HIP runtime API.
    pub hip_library: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            resource_name: DEFAULT_RESOURCE_NAME.into(),
            container: None,
            retry_failed_loads: true,
            cuda_library: "libcuda.so.1".into(),
            hip_library: "libamdhip64.so".into(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Defaults, with the resource name taken from `KGEN_GPU_CACHE_RESOURCE` if set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = std::env::var(RESOURCE_NAME_ENV) {
            if !name.is_empty() {
                config.resource_name = name;
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let c = RuntimeConfig::default();
        assert_eq!(c.resource_name, DEFAULT_RESOURCE_NAME);
        assert!(c.container.is_none());
        assert!(c.retry_failed_loads);
        assert_eq!(c.hip_library, "libamdhip64.so");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let c = RuntimeConfig::from_json_str(r#"{"retry_failed_loads": false, "container": "jit"}"#)
            .unwrap();
        assert!(!c.retry_failed_loads);
        assert_eq!(c.container.as_deref(), Some("jit"));
        assert_eq!(c.resource_name, DEFAULT_RESOURCE_NAME);
    }

    #[test]
    fn test_invalid_json() {
        let err = RuntimeConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"resource_name": "kernels"}}"#).unwrap();
        let c = RuntimeConfig::from_file(file.path()).unwrap();
        assert_eq!(c.resource_name, "kernels");

        let missing = RuntimeConfig::from_file(Path::new("/nonexistent/kgen.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
