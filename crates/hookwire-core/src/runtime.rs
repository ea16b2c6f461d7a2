//! Plugin runtime.
//!
//! Owns the handle registry and every loaded module, and drives each module
//! through its lifecycle:
//!
//! ```text
//! Unloaded -> Opened -> VersionChecked -> Registered -> Active
//!                                                         |
//!                                Closed <- Unregistering <-
//! ```
//!
//! A load either completes or leaves the registry and the loaded list as they
//! were. Modules are unloaded in reverse load order on shutdown.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use hookwire_sdk::abi::{with_raw_manager, EntryFn, REGISTER_SYMBOL, UNREGISTER_SYMBOL};
use hookwire_sdk::{status, Callable, CallbackRef, TypeTag, Version};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::RuntimeConfig;
use crate::error::{PluginError, Result};
use crate::facade::{Change, RegistryFacade};
use crate::loader::{self, EntryPoints, Module, ModuleLoader, NativeLoader};
use crate::registry::HandleRegistry;
use crate::state::{PluginState, StateMachine, StateTransition};
use crate::version::VersionNegotiator;

/// Identifies a loaded plugin for as long as it stays loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PluginId(u64);

impl PluginId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plugin#{}", self.0)
    }
}

/// Snapshot of a loaded plugin.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub id: PluginId,
    pub path: PathBuf,
    pub version: Version,
    pub state: PluginState,
    pub loaded_at: DateTime<Utc>,
    /// Handles this plugin currently has callbacks on.
    pub handles: Vec<String>,
}

/// Outcome of [`PluginRuntime::load_discovered`].
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub loaded: Vec<PluginId>,
    pub failed: Vec<(PathBuf, PluginError)>,
}

struct LoadedPlugin {
    id: PluginId,
    path: PathBuf,
    key: PathBuf,
    version: Version,
    module: Box<dyn Module>,
    entry: EntryPoints,
    machine: StateMachine,
    /// Callbacks this plugin attached, by handle.
    owned: Vec<(String, CallbackRef)>,
    loaded_at: DateTime<Utc>,
}

impl LoadedPlugin {
    fn record(&mut self, changes: Vec<Change>) {
        for change in changes {
            match change {
                Change::Registered {
                    handle, callback, ..
                } => self.owned.push((handle, callback)),
                Change::Unregistered {
                    handle, callback, ..
                } => {
                    if let Some(index) = self
                        .owned
                        .iter()
                        .position(|(h, c)| *h == handle && c.same_target(&callback))
                    {
                        self.owned.remove(index);
                    }
                }
            }
        }
    }

    /// Owned callbacks still present in `registry`.
    fn attached<'a>(&'a self, registry: &'a HandleRegistry) -> impl Iterator<Item = &'a (String, CallbackRef)> {
        self.owned
            .iter()
            .filter(move |(handle, callback)| registry.contains(handle, callback))
    }

    fn info(&self, registry: &HandleRegistry) -> PluginInfo {
        let mut handles: Vec<String> = self.attached(registry).map(|(h, _)| h.clone()).collect();
        handles.sort();
        handles.dedup();

        PluginInfo {
            id: self.id,
            path: self.path.clone(),
            version: self.version,
            state: self.machine.current(),
            loaded_at: self.loaded_at,
            handles,
        }
    }
}

/// Loads plugins and hosts the handle registry they register into.
pub struct PluginRuntime<L: ModuleLoader = NativeLoader> {
    loader: L,
    negotiator: VersionNegotiator,
    registry: HandleRegistry,
    /// Load order.
    plugins: Vec<LoadedPlugin>,
    next_id: u64,
    config: RuntimeConfig,
}

impl PluginRuntime<NativeLoader> {
    /// Runtime loading shared libraries from disk.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::with_loader(NativeLoader::new(), config)
    }
}

impl<L: ModuleLoader> PluginRuntime<L> {
    pub fn with_loader(loader: L, config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            loader,
            negotiator: VersionNegotiator::new(config.host_version, config.window()),
            registry: HandleRegistry::new(),
            plugins: Vec::new(),
            next_id: 1,
            config,
        })
    }

    /// Load, version-check and register the plugin at `path`.
    pub fn load_plugin(&mut self, path: impl AsRef<Path>) -> Result<PluginId> {
        let path = path.as_ref();
        loader::validate_path(path)?;

        let key = path_key(path);
        if self.plugins.iter().any(|p| p.key == key) {
            return Err(PluginError::AlreadyLoaded(path.to_path_buf()));
        }

        let mut machine = StateMachine::new();
        let module = self.loader.load(path)?;
        machine.transition(PluginState::Opened, "module opened")?;

        let entry = match EntryPoints::resolve(module.as_ref()) {
            Ok(entry) => entry,
            Err(e) => {
                release(module, &mut machine, "missing entry point");
                return Err(e);
            }
        };

        let version = match self.negotiator.negotiate(path, entry.version) {
            Ok(version) => version,
            Err(e) => {
                release(module, &mut machine, "incompatible version");
                return Err(e);
            }
        };
        machine.transition(PluginState::VersionChecked, format!("version {}", version))?;

        let changes = match self.call_entry(path, entry.register, REGISTER_SYMBOL) {
            Ok(changes) => changes,
            Err(e) => {
                release(module, &mut machine, "register entry point failed");
                return Err(e);
            }
        };
        machine.transition(PluginState::Registered, "register entry point succeeded")?;
        machine.transition(PluginState::Active, "listed")?;

        let id = PluginId(self.next_id);
        self.next_id += 1;

        let mut plugin = LoadedPlugin {
            id,
            path: path.to_path_buf(),
            key,
            version,
            module,
            entry,
            machine,
            owned: Vec::new(),
            loaded_at: Utc::now(),
        };
        plugin.record(changes);

        info!(
            category = "plugin",
            id = %id,
            path = %path.display(),
            version = %version,
            callbacks = plugin.owned.len(),
            "Plugin loaded"
        );
        self.plugins.push(plugin);
        Ok(id)
    }

    /// Unregister and release a plugin.
    ///
    /// If the unregister entry point fails, the registry is rolled back and
    /// the plugin stays active. If releasing the module fails, the plugin
    /// stays listed as unregistering and a later call only retries the
    /// release.
    pub fn unload_plugin(&mut self, id: PluginId) -> Result<()> {
        let index = self
            .plugins
            .iter()
            .position(|p| p.id == id)
            .ok_or(PluginError::NotLoaded(id))?;

        if self.plugins[index].machine.current() == PluginState::Active {
            self.unregister_at(index)?;
        }

        let plugin = &mut self.plugins[index];
        if let Err(e) = plugin.module.close() {
            warn!(
                category = "plugin",
                id = %id,
                path = %plugin.path.display(),
                error = %e,
                "Failed to release plugin module"
            );
            return Err(e);
        }

        let mut plugin = self.plugins.remove(index);
        plugin.machine.transition(PluginState::Closed, "module released")?;
        info!(
            category = "plugin",
            id = %id,
            path = %plugin.path.display(),
            "Plugin unloaded"
        );
        Ok(())
    }

    /// Unload the plugin loaded from `path`.
    pub fn unload_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let key = path_key(path);
        let id = self
            .plugins
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.id)
            .ok_or_else(|| PluginError::PathNotLoaded(path.to_path_buf()))?;
        self.unload_plugin(id)
    }

    /// Load every artifact in the configured plugin directories, then the
    /// configured autoload paths. Failures are logged and collected.
    pub fn load_discovered(&mut self) -> DiscoveryReport {
        let mut paths = loader::discover(&self.config.plugin_dirs);
        paths.extend(self.config.autoload.iter().cloned());

        let mut report = DiscoveryReport::default();
        for path in paths {
            if self.is_loaded(&path) {
                debug!(category = "plugin", path = %path.display(), "Already loaded, skipping");
                continue;
            }
            match self.load_plugin(&path) {
                Ok(id) => report.loaded.push(id),
                Err(e) => {
                    warn!(
                        category = "plugin",
                        path = %path.display(),
                        error = %e,
                        "Failed to load plugin"
                    );
                    report.failed.push((path, e));
                }
            }
        }
        report
    }

    /// Unload every plugin in reverse load order.
    ///
    /// Each plugin is attempted once; the first error is returned.
    pub fn shutdown(&mut self) -> Result<()> {
        let ids: Vec<PluginId> = self.plugins.iter().rev().map(|p| p.id).collect();
        let mut first_error = None;

        for id in ids {
            if let Err(e) = self.unload_plugin(id) {
                error!(category = "plugin", id = %id, error = %e, "Failed to unload plugin");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.plugins.iter().map(|p| p.info(&self.registry)).collect()
    }

    pub fn plugin(&self, id: PluginId) -> Option<PluginInfo> {
        self.find(id).map(|p| p.info(&self.registry))
    }

    pub fn state(&self, id: PluginId) -> Option<PluginState> {
        self.find(id).map(|p| p.machine.current())
    }

    /// Lifecycle transitions of a loaded plugin.
    pub fn history(&self, id: PluginId) -> Option<&[StateTransition]> {
        self.find(id).map(|p| p.machine.history())
    }

    pub fn is_loaded(&self, path: impl AsRef<Path>) -> bool {
        let key = path_key(path.as_ref());
        self.plugins.iter().any(|p| p.key == key)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn negotiator(&self) -> &VersionNegotiator {
        &self.negotiator
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Direct access for host-side registrations.
    pub fn registry_mut(&mut self) -> &mut HandleRegistry {
        &mut self.registry
    }

    pub fn lookup(&self, handle: &str) -> Vec<CallbackRef> {
        self.registry.lookup(handle)
    }

    pub fn lookup_as<F: Callable>(&self, handle: &str) -> Result<Vec<F>> {
        Ok(self.registry.lookup_as::<F>(handle)?)
    }

    pub fn fold<T: TypeTag + 'static>(&self, handle: &str, seed: T) -> Result<T> {
        Ok(self.registry.fold(handle, seed)?)
    }

    pub fn fold_with<T, G>(&self, handle: &str, seed: T, apply: G) -> T
    where
        G: FnMut(T, &CallbackRef) -> T,
    {
        self.registry.fold_with(handle, seed, apply)
    }

    fn find(&self, id: PluginId) -> Option<&LoadedPlugin> {
        self.plugins.iter().find(|p| p.id == id)
    }

    /// Run the unregister entry point of an active plugin.
    fn unregister_at(&mut self, index: usize) -> Result<()> {
        let (id, path, unregister) = {
            let plugin = &mut self.plugins[index];
            plugin
                .machine
                .transition(PluginState::Unregistering, "unregister requested")?;
            (plugin.id, plugin.path.clone(), plugin.entry.unregister)
        };

        let result = self.call_entry(&path, unregister, UNREGISTER_SYMBOL);
        let plugin = &mut self.plugins[index];
        let changes = match result {
            Ok(changes) => changes,
            Err(e) => {
                plugin
                    .machine
                    .transition(PluginState::Active, "unregister entry point failed")?;
                return Err(e);
            }
        };
        plugin.record(changes);

        if self.config.report_leaked_callbacks {
            let plugin = &self.plugins[index];
            for (handle, callback) in plugin.attached(&self.registry) {
                warn!(
                    category = "plugin",
                    id = %id,
                    path = %path.display(),
                    handle = %handle,
                    signature = %callback.signature(),
                    "Plugin left a callback registered after unloading"
                );
            }
        }
        Ok(())
    }

    /// Call a register or unregister entry point through a fresh facade.
    ///
    /// On failure every change the call made is rolled back.
    fn call_entry(&mut self, path: &Path, entry: EntryFn, name: &'static str) -> Result<Vec<Change>> {
        let mut facade = RegistryFacade::new(&mut self.registry);
        // SAFETY: `entry` was resolved from a module that is still open, and
        // the raw manager does not outlive this call.
        let code = with_raw_manager(&mut facade, |raw| unsafe { entry(raw) });

        if code == status::OK {
            return Ok(facade.commit());
        }

        let rejected = facade.first_error().cloned();
        facade.rollback();
        debug!(
            category = "plugin",
            path = %path.display(),
            entry = name,
            code,
            "Entry point failed, registry rolled back"
        );

        Err(match rejected {
            Some(source) if source.status() == code => PluginError::EntryPointRejected {
                path: path.to_path_buf(),
                entry: name,
                source,
            },
            _ => PluginError::EntryPointFailed {
                path: path.to_path_buf(),
                entry: name,
                code,
            },
        })
    }
}

impl<L: ModuleLoader> Drop for PluginRuntime<L> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(category = "plugin", error = %e, "Plugin runtime shutdown incomplete");
        }
    }
}

impl<L: ModuleLoader> fmt::Debug for PluginRuntime<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRuntime")
            .field("plugins", &self.plugins())
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

/// Release a module that never became active.
fn release(mut module: Box<dyn Module>, machine: &mut StateMachine, reason: &str) {
    let _ = machine.transition(PluginState::Closed, reason);
    if let Err(e) = module.close() {
        warn!(
            category = "plugin",
            path = %module.path().display(),
            error = %e,
            "Failed to release rejected plugin module"
        );
    }
}

fn path_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
