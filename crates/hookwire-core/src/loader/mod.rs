//! Module loading.
//!
//! The runtime only talks to [`ModuleLoader`] and [`Module`]; the platform
//! loader lives in [`native`].

pub mod native;

use std::path::{Path, PathBuf};

use hookwire_sdk::abi::{EntryFn, VersionFn, REGISTER_SYMBOL, UNREGISTER_SYMBOL, VERSION_SYMBOL};
use tracing::warn;

use crate::error::{PluginError, Result};

pub use native::{NativeLoader, NativeModule};

/// Opens plugin modules.
pub trait ModuleLoader {
    /// Open the module at `path`.
    ///
    /// Implementations call [`validate_path`] before touching the platform
    /// loader.
    fn load(&self, path: &Path) -> Result<Box<dyn Module>>;
}

/// An open plugin module.
pub trait Module: Send {
    fn path(&self) -> &Path;

    /// Address of an exported symbol.
    fn resolve(&self, symbol: &str) -> Result<*const ()>;

    /// Release the module. Symbols resolved from it become invalid.
    fn close(&mut self) -> Result<()>;
}

/// The three exports every plugin provides.
#[derive(Clone, Copy)]
pub struct EntryPoints {
    pub version: VersionFn,
    pub register: EntryFn,
    pub unregister: EntryFn,
}

impl std::fmt::Debug for EntryPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryPoints")
            .field("version", &(self.version as *const ()))
            .field("register", &(self.register as *const ()))
            .field("unregister", &(self.unregister as *const ()))
            .finish()
    }
}

impl EntryPoints {
    /// Resolve all entry points, failing on the first missing one.
    pub fn resolve(module: &dyn Module) -> Result<Self> {
        let version = symbol(module, VERSION_SYMBOL)?;
        let register = symbol(module, REGISTER_SYMBOL)?;
        let unregister = symbol(module, UNREGISTER_SYMBOL)?;

        // SAFETY: the plugin contract fixes the types of these exports, and
        // function pointers have the size of data pointers on supported targets.
        unsafe {
            Ok(Self {
                version: std::mem::transmute_copy::<*const (), VersionFn>(&version),
                register: std::mem::transmute_copy::<*const (), EntryFn>(&register),
                unregister: std::mem::transmute_copy::<*const (), EntryFn>(&unregister),
            })
        }
    }
}

fn symbol(module: &dyn Module, name: &str) -> Result<*const ()> {
    let address = module.resolve(name)?;
    if address.is_null() {
        return Err(PluginError::SymbolNotFound {
            path: module.path().to_path_buf(),
            symbol: name.to_string(),
        });
    }
    Ok(address)
}

/// Check that `path` names a loadable artifact for this platform.
///
/// This is a filename check only; whether the file exists is left to the
/// platform loader.
pub fn validate_path(path: &Path) -> Result<()> {
    let invalid = |reason: String| PluginError::InvalidPath {
        path: path.to_path_buf(),
        reason,
    };

    let expected = std::env::consts::DLL_EXTENSION;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| invalid("No file extension".into()))?;
    if ext != expected {
        return Err(invalid(format!(
            "Invalid extension: {}, expected: {}",
            ext, expected
        )));
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    if stem.is_empty() {
        return Err(invalid("Empty file name".into()));
    }

    Ok(())
}

/// Check if a path looks like a plugin artifact.
pub fn is_plugin_file(path: &Path) -> bool {
    path.is_file() && validate_path(path).is_ok()
}

/// List plugin artifacts directly inside each of `dirs`.
///
/// Entries of each directory are sorted; unreadable directories are skipped.
pub fn discover(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();

    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    category = "plugin",
                    dir = %dir.display(),
                    error = %e,
                    "Cannot read plugin directory"
                );
                continue;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_plugin_file(path))
            .collect();
        paths.sort();
        found.extend(paths);
    }

    found
}
