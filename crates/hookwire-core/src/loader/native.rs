//! Native module loader using libloading.

use std::path::{Path, PathBuf};

use libloading::Library;
use tracing::debug;

use super::{validate_path, Module, ModuleLoader};
use crate::error::{PluginError, Result};

/// Loads shared libraries through the platform's dynamic loader.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLoader;

impl NativeLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for NativeLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn Module>> {
        validate_path(path)?;

        // SAFETY: loading runs the library's initialisers. Plugins are trusted
        // code built against the same SDK.
        let library = unsafe {
            Library::new(path).map_err(|e| PluginError::LoadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };
        debug!(category = "plugin", path = %path.display(), "Library opened");

        Ok(Box::new(NativeModule {
            path: path.to_path_buf(),
            library: Some(library),
            close_error: None,
        }))
    }
}

/// A shared library opened by [`NativeLoader`].
#[derive(Debug)]
pub struct NativeModule {
    path: PathBuf,
    library: Option<Library>,
    /// Set when the platform refused to release the library. libloading
    /// consumes the handle either way, so the module can never be confirmed
    /// released afterwards.
    close_error: Option<String>,
}

impl NativeModule {
    fn closed(&self) -> PluginError {
        PluginError::LoadFailed {
            path: self.path.clone(),
            reason: "Library already closed".into(),
        }
    }

    fn unload_failed(&self, reason: String) -> PluginError {
        PluginError::UnloadFailed {
            path: self.path.clone(),
            reason,
        }
    }
}

impl Module for NativeModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn resolve(&self, symbol: &str) -> Result<*const ()> {
        let library = self.library.as_ref().ok_or_else(|| self.closed())?;
        // SAFETY: the address is only reinterpreted by `EntryPoints`, which
        // knows the exported types.
        let address = unsafe {
            library
                .get::<*const ()>(symbol.as_bytes())
                .map_err(|_| PluginError::SymbolNotFound {
                    path: self.path.clone(),
                    symbol: symbol.to_string(),
                })?
        };
        Ok(*address)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(reason) = &self.close_error {
            return Err(self.unload_failed(format!("earlier release failed: {}", reason)));
        }
        let Some(library) = self.library.take() else {
            return Ok(());
        };
        if let Err(e) = library.close() {
            let reason = e.to_string();
            self.close_error = Some(reason.clone());
            return Err(self.unload_failed(reason));
        }
        debug!(category = "plugin", path = %self.path.display(), "Library closed");
        Ok(())
    }
}
