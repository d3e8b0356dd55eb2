//! GPU module cache.
//!
//! Maps module images, by address, to modules loaded in the driver. Each
//! distinct image is loaded at most once per cache, and every resident module
//! is unloaded when the cache is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::RuntimeConfig;
use crate::driver::{GpuDriver, ModuleBlob, ModuleHandle};
use crate::error::{DriverError, Status};
use crate::registry::Resource;
use crate::report::report_if_error;

/// Load-once cache of driver modules, shared through the host registry.
///
/// One lock guards the whole map and is held across the driver load, so
/// lookups for unrelated images also serialize.
pub struct ModuleCache {
    driver: Arc<dyn GpuDriver>,
    retry_failed_loads: bool,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    /// A failed load is kept only when failed loads are not retried.
    modules: HashMap<ModuleBlob, Result<ModuleHandle, DriverError>>,
    hits: u64,
    misses: u64,
    failed_loads: u64,
}

impl std::fmt::Debug for ModuleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ModuleCache")
            .field("driver", &self.driver.name())
            .field("entries", &inner.modules.len())
            .field("retry_failed_loads", &self.retry_failed_loads)
            .finish()
    }
}

impl ModuleCache {
    pub const DEBUG_STRING: &'static str = "GPU runtime cache";

    pub fn new(driver: Arc<dyn GpuDriver>, config: &RuntimeConfig) -> Self {
        Self {
            driver,
            retry_failed_loads: config.retry_failed_loads,
            inner: Mutex::new(CacheInner {
                modules: HashMap::new(),
                hits: 0,
                misses: 0,
                failed_loads: 0,
            }),
        }
    }

    /// Registry factory form of [`new`](Self::new).
    pub fn create(driver: Arc<dyn GpuDriver>, config: &RuntimeConfig) -> Result<Self, Status> {
        Ok(Self::new(driver, config))
    }

    /// Return the module loaded from `blob`, loading it on first use.
    pub fn lookup_or_load(&self, blob: ModuleBlob) -> Result<ModuleHandle, DriverError> {
        let mut inner = self.inner.lock();
        if let Some(cached) = inner.modules.get(&blob) {
            let cached = cached.clone();
            inner.hits += 1;
            tracing::trace!("module cache hit for {:p}", blob.as_ptr());
            return cached;
        }

        inner.misses += 1;
        let loaded = self.driver.load_module(blob);
        match &loaded {
            Ok(module) => {
                tracing::debug!(
                    "loaded {} module {:p} from image {:p}",
                    self.driver.name(),
                    module.as_raw(),
                    blob.as_ptr()
                );
                inner.modules.insert(blob, loaded.clone());
            }
            Err(_) => {
                inner.failed_loads += 1;
                if !self.retry_failed_loads {
                    inner.modules.insert(blob, loaded.clone());
                }
            }
        }
        loaded
    }

    /// Number of modules resident in the driver.
    pub fn len(&self) -> usize {
        self.inner.lock().modules.values().filter(|m| m.is_ok()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            resident_modules: inner.modules.values().filter(|m| m.is_ok()).count(),
            hits: inner.hits,
            misses: inner.misses,
            failed_loads: inner.failed_loads,
        }
    }
}

impl Resource for ModuleCache {
    fn debug_string(&self) -> String {
        Self::DEBUG_STRING.to_string()
    }
}

/// Outcome of unloading every resident module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct UnloadSummary {
    pub unloaded: usize,
    pub failed: usize,
}

impl ModuleCache {
    /// Unload every resident module and empty the map. Each failed unload is
    /// logged and the sweep continues.
    pub(crate) fn unload_resident(&self) -> UnloadSummary {
        let mut inner = self.inner.lock();
        let mut summary = UnloadSummary::default();
        for (_, entry) in inner.modules.drain() {
            let Ok(module) = entry else { continue };
            if report_if_error(None, self.driver.unload_module(module)).is_some() {
                summary.unloaded += 1;
            } else {
                summary.failed += 1;
            }
        }
        summary
    }
}

impl Drop for ModuleCache {
    fn drop(&mut self) {
        let summary = self.unload_resident();
        tracing::debug!(
            "module cache dropped, unloaded {} modules, {} unloads failed",
            summary.unloaded,
            summary.failed
        );
    }
}

/// Cache counters for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub resident_modules: usize,
    pub hits: u64,
    pub misses: u64,
    pub failed_loads: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ModuleCache: {} resident, {} hits, {} misses, {} failed loads",
            self.resident_modules, self.hits, self.misses, self.failed_loads,
        )
    }
}
