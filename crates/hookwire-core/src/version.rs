//! Host-side version negotiation.

use std::fmt;
use std::path::Path;

use hookwire_sdk::abi::VersionFn;
use hookwire_sdk::{Version, VersionWindow};

use crate::error::{PluginError, Result};

/// Whether `plugin` lies in the closed interval `[min, max]`.
pub fn is_compatible(plugin: Version, min: Version, max: Version) -> bool {
    min <= plugin && plugin <= max
}

/// Which side refused a version pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// The plugin did not accept the host version.
    Plugin,
    /// The plugin version is outside the host's window.
    Host,
    Both,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rejection::Plugin => "plugin",
            Rejection::Host => "host",
            Rejection::Both => "plugin and host",
        };
        f.write_str(name)
    }
}

/// Checks plugin versions against the host's accepted window.
#[derive(Debug, Clone, Copy)]
pub struct VersionNegotiator {
    host: Version,
    window: VersionWindow,
}

impl VersionNegotiator {
    pub fn new(host: Version, window: VersionWindow) -> Self {
        Self { host, window }
    }

    pub fn host(&self) -> Version {
        self.host
    }

    pub fn window(&self) -> VersionWindow {
        self.window
    }

    pub fn is_compatible(&self, plugin: Version) -> bool {
        is_compatible(plugin, self.window.min, self.window.max)
    }

    /// Query a plugin's version export and check both directions.
    ///
    /// Returns the plugin's declared version when both sides agree.
    pub fn negotiate(&self, path: &Path, query: VersionFn) -> Result<Version> {
        // SAFETY: `query` was resolved from the plugin's version export.
        let reply = unsafe { query(self.host.as_raw()) };
        let plugin = reply.version();

        let rejected_by = match (reply.accepts_host, self.is_compatible(plugin)) {
            (true, true) => return Ok(plugin),
            (false, true) => Rejection::Plugin,
            (true, false) => Rejection::Host,
            (false, false) => Rejection::Both,
        };

        Err(PluginError::IncompatibleVersion {
            path: path.to_path_buf(),
            plugin,
            host: self.host,
            window: self.window,
            rejected_by,
        })
    }
}

impl Default for VersionNegotiator {
    fn default() -> Self {
        Self::new(
            hookwire_sdk::API_VERSION,
            VersionWindow::exact(hookwire_sdk::API_VERSION),
        )
    }
}
