//! Hookwire host runtime.
//!
//! Loads plugin modules built with `hookwire-sdk`, checks their API version,
//! lets them attach callbacks to named handles, and invokes those callbacks
//! by handle name.
//!
//! ```rust,no_run
//! use hookwire_core::{PluginRuntime, RuntimeConfig};
//! use hookwire_sdk::handles;
//!
//! # fn main() -> hookwire_core::Result<()> {
//! let mut runtime = PluginRuntime::new(RuntimeConfig::default())?;
//! runtime.load_plugin("plugins/libdemo.so")?;
//!
//! let seed = runtime.fold(handles::SEED_GENERATION, 42)?;
//! for symbols in runtime.lookup_as::<fn() -> Vec<char>>(handles::MAP_SYMBOLS)? {
//!     println!("{:?} (seed {})", symbols(), seed);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod facade;
pub mod loader;
pub mod logging;
pub mod registry;
pub mod runtime;
pub mod shared;
pub mod state;
pub mod version;

pub use config::RuntimeConfig;
pub use error::{ErrorKind, PluginError, Result};
pub use facade::RegistryFacade;
pub use loader::{EntryPoints, Module, ModuleLoader, NativeLoader};
pub use registry::{HandleEntry, HandleRegistry};
pub use runtime::{DiscoveryReport, PluginId, PluginInfo, PluginRuntime};
pub use shared::SharedRuntime;
pub use state::{PluginState, StateMachine};
pub use version::{is_compatible, Rejection, VersionNegotiator};
