//! Runtime configuration.
//!
//! Loaded from TOML, then optionally overridden from the environment:
//!
//! ```toml
//! plugin_dirs = ["plugins"]
//! autoload = ["extra/demo.so"]
//! host_version = "1.0"
//! min_version = "1.0"
//! max_version = "1.0"
//! report_leaked_callbacks = true
//! ```

use std::path::{Path, PathBuf};

use hookwire_sdk::{Version, VersionWindow, API_VERSION};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PluginError, Result};

/// Environment variable names.
pub mod env_vars {
    /// Plugin directories, separated like `PATH`.
    pub const PLUGIN_DIR: &str = "HOOKWIRE_PLUGIN_DIR";
    pub const MIN_VERSION: &str = "HOOKWIRE_MIN_VERSION";
    pub const MAX_VERSION: &str = "HOOKWIRE_MAX_VERSION";
    /// `1`, `true`, `yes` or `on` switches log output to JSON.
    pub const LOG_JSON: &str = "HOOKWIRE_LOG_JSON";
}

/// Plugin runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directories scanned by `load_discovered`.
    pub plugin_dirs: Vec<PathBuf>,
    /// Individual artifacts loaded after the scanned ones.
    pub autoload: Vec<PathBuf>,
    /// Version the host reports to plugins.
    pub host_version: Version,
    /// Oldest plugin version accepted.
    pub min_version: Version,
    /// Newest plugin version accepted.
    pub max_version: Version,
    /// Warn about callbacks a plugin left behind when it was unloaded.
    pub report_leaked_callbacks: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            plugin_dirs: Vec::new(),
            autoload: Vec::new(),
            host_version: API_VERSION,
            min_version: API_VERSION,
            max_version: API_VERSION,
            report_leaked_callbacks: true,
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PluginError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(category = "config", path = %path.display(), "Loaded plugin runtime config");
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, keyed by the names in [`env_vars`].
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(dirs) = lookup(env_vars::PLUGIN_DIR) {
            self.plugin_dirs = std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            info!(category = "config", dirs = ?self.plugin_dirs, "Plugin dirs from environment");
        }
        if let Some(min) = lookup(env_vars::MIN_VERSION) {
            self.min_version = parse_version(env_vars::MIN_VERSION, &min)?;
        }
        if let Some(max) = lookup(env_vars::MAX_VERSION) {
            self.max_version = parse_version(env_vars::MAX_VERSION, &max)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_version > self.max_version {
            return Err(PluginError::Config(format!(
                "min_version {} is greater than max_version {}",
                self.min_version, self.max_version
            )));
        }
        Ok(())
    }

    /// Accepted plugin versions.
    pub fn window(&self) -> VersionWindow {
        VersionWindow::new(self.min_version, self.max_version)
    }
}

fn parse_version(name: &str, value: &str) -> Result<Version> {
    value
        .parse()
        .map_err(|e| PluginError::Config(format!("{}: {}", name, e)))
}
