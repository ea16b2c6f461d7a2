//! Smoke test plugin.
//!
//! Attaches one callback to each well-known handle:
//! - `mapSymbols` returns `['#', '-']`
//! - `seedGeneration` resets any seed to `0`

use hookwire_sdk::prelude::*;

pub fn map_symbols() -> Vec<char> {
    vec!['#', '-']
}

pub fn edit_seed(_seed: i32) -> i32 {
    0
}

pub fn register(manager: &mut Manager<'_>) -> Result<(), RegistryError> {
    manager.register_fn(handles::MAP_SYMBOLS, map_symbols as fn() -> Vec<char>)?;
    manager.register_fn(handles::SEED_GENERATION, edit_seed as fn(i32) -> i32)
}

pub fn unregister(manager: &mut Manager<'_>) -> Result<(), RegistryError> {
    manager.unregister_fn(handles::MAP_SYMBOLS, map_symbols as fn() -> Vec<char>)?;
    manager.unregister_fn(handles::SEED_GENERATION, edit_seed as fn(i32) -> i32)
}

declare_plugin! {
    version: API_VERSION,
    accepts: VersionWindow::exact(API_VERSION),
    register: register,
    unregister: unregister,
}
