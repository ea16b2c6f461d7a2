//! Error types for the plugin runtime.

use std::path::PathBuf;

use hookwire_sdk::{RegistryError, Version, VersionWindow};

use crate::state::PluginState;
use crate::version::Rejection;
use crate::PluginId;

/// Result type alias for the runtime.
pub type Result<T> = std::result::Result<T, PluginError>;

/// Broad classification of a [`PluginError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caused by the environment: a bad artifact, a missing file, an
    /// incompatible plugin. Hosts usually log these and carry on.
    Environmental,
    /// A broken invariant in host or plugin code.
    Invariant,
}

/// Plugin runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Invalid plugin path {}: {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Failed to load plugin {}: {reason}", .path.display())]
    LoadFailed { path: PathBuf, reason: String },

    #[error("Symbol {symbol} not found in {}", .path.display())]
    SymbolNotFound { path: PathBuf, symbol: String },

    #[error(
        "Incompatible plugin {}: plugin version {plugin}, host version {host}, accepted {window} (rejected by {rejected_by})",
        .path.display()
    )]
    IncompatibleVersion {
        path: PathBuf,
        plugin: Version,
        host: Version,
        window: VersionWindow,
        rejected_by: Rejection,
    },

    #[error("Plugin already loaded: {}", .0.display())]
    AlreadyLoaded(PathBuf),

    #[error("Plugin not loaded: {0}")]
    NotLoaded(PluginId),

    #[error("No plugin loaded from {}", .0.display())]
    PathNotLoaded(PathBuf),

    #[error("Entry point {entry} of {} rejected: {source}", .path.display())]
    EntryPointRejected {
        path: PathBuf,
        entry: &'static str,
        #[source]
        source: RegistryError,
    },

    #[error("Entry point {entry} of {} failed with status {code}", .path.display())]
    EntryPointFailed {
        path: PathBuf,
        entry: &'static str,
        code: i32,
    },

    #[error("Failed to unload plugin {}: {reason}", .path.display())]
    UnloadFailed { path: PathBuf, reason: String },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidState { from: PluginState, to: PluginState },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl PluginError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PluginError::InvalidPath { .. }
            | PluginError::LoadFailed { .. }
            | PluginError::SymbolNotFound { .. }
            | PluginError::IncompatibleVersion { .. }
            | PluginError::AlreadyLoaded(_)
            | PluginError::UnloadFailed { .. }
            | PluginError::Config(_)
            | PluginError::Io(_) => ErrorKind::Environmental,
            PluginError::NotLoaded(_)
            | PluginError::PathNotLoaded(_)
            | PluginError::EntryPointRejected { .. }
            | PluginError::EntryPointFailed { .. }
            | PluginError::InvalidState { .. }
            | PluginError::Registry(_) => ErrorKind::Invariant,
        }
    }

    /// Whether a host can log this error and keep running.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Environmental
    }
}
