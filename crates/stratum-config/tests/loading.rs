use std::path::Path;

use stratum_config::{load_config, StoreBackend};

#[test]
fn load_memory_backend() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/memory.yml");
    let config = load_config(&path).expect("should load without error");
    assert_eq!(config.store, StoreBackend::Memory);
    assert_eq!(config.logging.level, "debug");
    assert!(!config.logging.json);
}

#[test]
fn load_redb_backend() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/redb.yml");
    let config = load_config(&path).expect("should load without error");
    assert_eq!(config.store, StoreBackend::Redb { path: "/var/lib/stratum/state.redb".to_string() });
}

#[test]
fn redb_backend_requires_path() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/redb_missing_path.yml");
    let err = load_config(&path).expect_err("redb_path is required");
    assert!(matches!(err, stratum_config::ConfigError::Conversion { .. }));
}

#[test]
fn unknown_backend_is_rejected() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/unknown_backend.yml");
    assert!(load_config(&path).is_err());
}

#[test]
fn missing_file_returns_error() {
    let path = Path::new("/nonexistent/path/does/not/exist.yml");
    assert!(load_config(path).is_err());
}
