//! Host resource registry.
//!
//! Holds named, reference-counted resources grouped into containers. A
//! resource lives until its container drops it and every caller has released
//! its `Arc`.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Status;

/// Name of the container used when the host does not pick one.
pub const DEFAULT_CONTAINER: &str = "localhost";

/// A resource that can be stored in a [`ResourceMgr`].
pub trait Resource: Any + Send + Sync {
    /// Short human-readable description for diagnostics.
    fn debug_string(&self) -> String;
}

struct Entry {
    any: Arc<dyn Any + Send + Sync>,
    resource: Arc<dyn Resource>,
    type_name: &'static str,
}

impl Entry {
    fn new<T: Resource>(value: Arc<T>) -> Self {
        Self {
            any: value.clone(),
            resource: value,
            type_name: std::any::type_name::<T>(),
        }
    }

    fn downcast<T: Resource>(&self) -> Option<Arc<T>> {
        self.any.clone().downcast::<T>().ok()
    }
}

type Key = (TypeId, String);

/// Registry of shared resources, keyed by (container, type, name).
pub struct ResourceMgr {
    default_container: String,
    containers: Mutex<HashMap<String, HashMap<Key, Entry>>>,
}

impl Default for ResourceMgr {
    fn default() -> Self {
        Self::new(DEFAULT_CONTAINER)
    }
}

impl std::fmt::Debug for ResourceMgr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let containers = self.containers.lock();
        f.debug_struct("ResourceMgr")
            .field("default_container", &self.default_container)
            .field("containers", &containers.len())
            .finish()
    }
}

impl ResourceMgr {
    pub fn new(default_container: impl Into<String>) -> Self {
        Self {
            default_container: default_container.into(),
            containers: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_container(&self) -> &str {
        &self.default_container
    }

    /// Look up resource `name` of type `T`, creating it with `factory` if absent.
    ///
    /// The factory runs under the registry lock, so concurrent callers never
    /// create two instances. A factory error is returned unchanged and nothing
    /// is stored.
    pub fn lookup_or_create<T, F>(&self, container: &str, name: &str, factory: F) -> Result<Arc<T>, Status>
    where
        T: Resource,
        F: FnOnce() -> Result<T, Status>,
    {
        let mut containers = self.containers.lock();
        let key = (TypeId::of::<T>(), name.to_string());
        if let Some(entry) = containers.get(container).and_then(|c| c.get(&key)) {
            return entry
                .downcast::<T>()
                .ok_or_else(|| Status::internal(format!("resource {container}/{name} has unexpected type")));
        }

        let value = Arc::new(factory()?);
        containers
            .entry(container.to_string())
            .or_default()
            .insert(key, Entry::new(value.clone()));
        tracing::debug!("created resource {}/{}", container, name);
        Ok(value)
    }

    /// Look up an existing resource.
    pub fn lookup<T: Resource>(&self, container: &str, name: &str) -> Result<Arc<T>, Status> {
        let containers = self.containers.lock();
        containers
            .get(container)
            .and_then(|c| c.get(&(TypeId::of::<T>(), name.to_string())))
            .and_then(Entry::downcast::<T>)
            .ok_or_else(|| Status::not_found(format!("resource {container}/{name} does not exist")))
    }

    /// Store `value` under `name`. Fails if a resource of the same type and
    /// name already exists in `container`.
    pub fn create<T: Resource>(&self, container: &str, name: &str, value: T) -> Result<Arc<T>, Status> {
        let mut containers = self.containers.lock();
        let slot = containers.entry(container.to_string()).or_default();
        let key = (TypeId::of::<T>(), name.to_string());
        if slot.contains_key(&key) {
            return Err(Status::already_exists(format!("resource {container}/{name} already exists")));
        }
        let value = Arc::new(value);
        slot.insert(key, Entry::new(value.clone()));
        Ok(value)
    }

    /// Drop the registry's reference to resource `name` of type `T`.
    pub fn delete<T: Resource>(&self, container: &str, name: &str) -> Result<(), Status> {
        let removed = {
            let mut containers = self.containers.lock();
            containers
                .get_mut(container)
                .and_then(|c| c.remove(&(TypeId::of::<T>(), name.to_string())))
        };
        // Dropped outside the lock: a resource's teardown may be slow.
        match removed {
            Some(_) => Ok(()),
            None => Err(Status::not_found(format!("resource {container}/{name} does not exist"))),
        }
    }

    /// Drop every resource in `container`. Unknown containers are ignored.
    pub fn cleanup(&self, container: &str) {
        let removed = self.containers.lock().remove(container);
        if let Some(resources) = removed {
            tracing::debug!("cleaning up container {} ({} resources)", container, resources.len());
            drop(resources);
        }
    }

    /// One line per resource, sorted: `container | type | name | description`.
    pub fn debug_string(&self) -> String {
        let containers = self.containers.lock();
        let mut lines = BTreeMap::new();
        for (container, resources) in containers.iter() {
            for ((_, name), entry) in resources {
                let line = format!(
                    "{} | {} | {} | {}",
                    container,
                    entry.type_name,
                    name,
                    entry.resource.debug_string()
                );
                lines.insert(line, ());
            }
        }
        let mut out = String::new();
        for line in lines.keys() {
            let _ = writeln!(out, "{line}");
        }
        out
    }
}

impl Drop for ResourceMgr {
    fn drop(&mut self) {
        let containers = std::mem::take(&mut *self.containers.lock());
        drop(containers);
    }
}
