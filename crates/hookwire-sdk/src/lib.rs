//! Hookwire plugin SDK
//!
//! Shared types for hosts and plugins: API versions, signature-tagged
//! callback references, the [`HandleManager`] interface and the C ABI that
//! carries it across a dynamic library boundary.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hookwire_sdk::prelude::*;
//!
//! fn map_symbols() -> Vec<char> {
//!     vec!['#', '-']
//! }
//!
//! fn register(manager: &mut Manager<'_>) -> Result<(), RegistryError> {
//!     manager.register_fn(handles::MAP_SYMBOLS, map_symbols as fn() -> Vec<char>)
//! }
//!
//! fn unregister(manager: &mut Manager<'_>) -> Result<(), RegistryError> {
//!     manager.unregister_fn(handles::MAP_SYMBOLS, map_symbols as fn() -> Vec<char>)
//! }
//!
//! declare_plugin! {
//!     version: API_VERSION,
//!     register: register,
//!     unregister: unregister,
//! }
//! ```

pub mod abi;
pub mod error;
#[macro_use]
pub mod macros;
pub mod manager;
pub mod signature;
pub mod version;

pub use abi::{RawManager, VersionReply};
pub use error::{status, RegistryError};
pub use manager::{HandleManager, HandleManagerExt, Manager};
pub use signature::{Callable, CallbackRef, Signature, TypeTag};
pub use version::{Version, VersionParseError, VersionWindow, API_VERSION};

/// Well-known handle names.
pub mod handles {
    /// Symbols used when rendering a map: `fn() -> Vec<char>`.
    pub const MAP_SYMBOLS: &str = "mapSymbols";
    /// Seed editing during world generation: `fn(i32) -> i32`.
    pub const SEED_GENERATION: &str = "seedGeneration";
}

/// Prelude module with common imports
pub mod prelude {
    pub use crate::declare_plugin;
    pub use crate::error::RegistryError;
    pub use crate::handles;
    pub use crate::manager::{HandleManager, HandleManagerExt, Manager};
    pub use crate::signature::{Callable, CallbackRef, Signature};
    pub use crate::version::{Version, VersionWindow, API_VERSION};
}
