//! Native Loader Tests
//!
//! Tests loading through the platform dynamic loader:
//! - Invalid and missing paths
//! - Files that are not shared libraries
//! - End-to-end load of the smoke plugin cdylib

use std::env::consts::{DLL_EXTENSION, DLL_PREFIX};
use std::path::PathBuf;

use hookwire_core::{ModuleLoader, NativeLoader, PluginError, PluginRuntime, RuntimeConfig};
use hookwire_sdk::{handles, API_VERSION};

/// Locate the smoke plugin built alongside the tests.
///
/// `HOOKWIRE_SMOKE_PLUGIN` overrides the search.
fn smoke_plugin() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("HOOKWIRE_SMOKE_PLUGIN") {
        return Some(PathBuf::from(path));
    }

    let target = std::env::var("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target"));
    let file = format!("{}hookwire_smoke_plugin.{}", DLL_PREFIX, DLL_EXTENSION);

    ["debug", "release"]
        .iter()
        .flat_map(|profile| {
            let dir = target.join(profile);
            [dir.join(&file), dir.join("deps").join(&file)]
        })
        .find(|path| path.is_file())
}

#[test]
fn test_load_nonexistent_file() {
    let loader = NativeLoader::new();
    let path = PathBuf::from(format!("/nonexistent/path/to/plugin.{}", DLL_EXTENSION));

    match loader.load(&path) {
        Err(PluginError::LoadFailed { path: failed, .. }) => assert_eq!(failed, path),
        Err(e) => panic!("Expected LoadFailed, got {}", e),
        Ok(_) => panic!("Expected LoadFailed, got a module"),
    }
}

#[test]
fn test_load_invalid_extension() {
    let loader = NativeLoader::new();

    for path in ["test.txt", "test.json", "test.toml", "test"] {
        assert!(
            matches!(loader.load(path.as_ref()), Err(PluginError::InvalidPath { .. })),
            "Expected InvalidPath for {}",
            path
        );
    }
}

#[test]
fn test_load_garbage_library() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(format!("garbage.{}", DLL_EXTENSION));
    std::fs::write(&path, b"definitely not a shared library").unwrap();

    let mut runtime = PluginRuntime::new(RuntimeConfig::default()).unwrap();
    let err = runtime.load_plugin(&path).unwrap_err();
    assert!(matches!(err, PluginError::LoadFailed { .. }));
    assert!(err.is_recoverable());
    assert!(runtime.is_empty());
}

#[test]
fn test_discover_from_config_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(format!("broken.{}", DLL_EXTENSION)), b"").unwrap();
    std::fs::write(dir.path().join("README.md"), b"").unwrap();

    let config = RuntimeConfig {
        plugin_dirs: vec![dir.path().to_path_buf()],
        ..RuntimeConfig::default()
    };
    let mut runtime = PluginRuntime::new(config).unwrap();
    let report = runtime.load_discovered();

    assert!(report.loaded.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.ends_with(format!("broken.{}", DLL_EXTENSION)));
}

#[test]
fn test_smoke_plugin_end_to_end() {
    let Some(path) = smoke_plugin() else {
        eprintln!("Smoke plugin not built, skipping");
        return;
    };

    let mut runtime = PluginRuntime::new(RuntimeConfig::default()).unwrap();
    let id = runtime.load_plugin(&path).unwrap();
    assert_eq!(runtime.plugin(id).unwrap().version, API_VERSION);

    let symbols = runtime
        .lookup_as::<fn() -> Vec<char>>(handles::MAP_SYMBOLS)
        .unwrap();
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0](), vec!['#', '-']);
    assert_eq!(runtime.fold(handles::SEED_GENERATION, 42).unwrap(), 0);

    assert!(matches!(
        runtime.load_plugin(&path),
        Err(PluginError::AlreadyLoaded(_))
    ));

    runtime.unload_plugin(id).unwrap();
    assert!(runtime.is_empty());
    assert!(runtime.lookup(handles::MAP_SYMBOLS).is_empty());
    assert_eq!(runtime.fold(handles::SEED_GENERATION, 42).unwrap(), 42);
}
