//! Thread-safe runtime handle.

use std::path::Path;
use std::sync::Arc;

use hookwire_sdk::{Callable, CallbackRef, TypeTag};
use parking_lot::{Mutex, MutexGuard};

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::runtime::{DiscoveryReport, PluginId, PluginInfo, PluginRuntime};

/// A [`PluginRuntime`] behind one lock, cloneable across threads.
///
/// Every operation takes the lock for its whole duration. Callbacks run
/// during a fold hold the lock and must not call back into the runtime.
#[derive(Clone)]
pub struct SharedRuntime {
    inner: Arc<Mutex<PluginRuntime>>,
}

impl SharedRuntime {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Ok(Self::from_runtime(PluginRuntime::new(config)?))
    }

    pub fn from_runtime(runtime: PluginRuntime) -> Self {
        Self {
            inner: Arc::new(Mutex::new(runtime)),
        }
    }

    /// Lock the runtime for a sequence of operations.
    pub fn lock(&self) -> MutexGuard<'_, PluginRuntime> {
        self.inner.lock()
    }

    pub fn load_plugin(&self, path: impl AsRef<Path>) -> Result<PluginId> {
        self.inner.lock().load_plugin(path)
    }

    pub fn unload_plugin(&self, id: PluginId) -> Result<()> {
        self.inner.lock().unload_plugin(id)
    }

    pub fn load_discovered(&self) -> DiscoveryReport {
        self.inner.lock().load_discovered()
    }

    pub fn shutdown(&self) -> Result<()> {
        self.inner.lock().shutdown()
    }

    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.inner.lock().plugins()
    }

    pub fn lookup(&self, handle: &str) -> Vec<CallbackRef> {
        self.inner.lock().lookup(handle)
    }

    pub fn lookup_as<F: Callable>(&self, handle: &str) -> Result<Vec<F>> {
        self.inner.lock().lookup_as(handle)
    }

    pub fn fold<T: TypeTag + 'static>(&self, handle: &str, seed: T) -> Result<T> {
        self.inner.lock().fold(handle, seed)
    }

    pub fn fold_with<T, G>(&self, handle: &str, seed: T, apply: G) -> T
    where
        G: FnMut(T, &CallbackRef) -> T,
    {
        self.inner.lock().fold_with(handle, seed, apply)
    }
}
