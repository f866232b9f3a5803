//! Unit tests for configuration and graceful degradation
//!
//! Covers:
//! - Missing TOML files do not cause errors
//! - Priority order for root folder resolution
//! - Automatic directory creation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate FACET_ROOT_FOLDER or FACET_CONFIG are marked with #[serial].

use facet_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig, CONFIG_FILE_ENV,
    ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.to_string_lossy().contains("facet"));
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    env::set_var(CONFIG_FILE_ENV, "/nonexistent/facet-test.toml");

    let root_folder = RootFolderResolver::new("facet-ensemble").resolve();

    let defaults = CompiledDefaults::for_current_platform();
    assert_eq!(root_folder, defaults.root_folder);

    env::remove_var(CONFIG_FILE_ENV);
}

#[test]
#[serial]
fn test_resolver_env_var_root_folder() {
    let test_path = "/tmp/facet-test-env-folder";
    env::set_var(ROOT_FOLDER_ENV, test_path);

    let root_folder = RootFolderResolver::new("facet-ensemble").resolve();
    assert_eq!(root_folder, PathBuf::from(test_path));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_cli_arg_takes_precedence() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/facet-priority-2");

    let root_folder = RootFolderResolver::new("facet-ensemble")
        .with_cli_arg(Some(PathBuf::from("/tmp/facet-priority-1")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/facet-priority-1"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_reads_root_folder_from_toml() {
    let temp_dir = TempDir::new().unwrap();
    let toml_path = temp_dir.path().join("facet-ensemble.toml");
    std::fs::write(&toml_path, "root_folder = \"/tmp/facet-from-toml\"\n").unwrap();

    env::remove_var(ROOT_FOLDER_ENV);
    env::set_var(CONFIG_FILE_ENV, &toml_path);

    let root_folder = RootFolderResolver::new("facet-ensemble").resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/facet-from-toml"));

    env::remove_var(CONFIG_FILE_ENV);
}

#[test]
#[serial]
fn test_resolver_explicit_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let toml_path = temp_dir.path().join("custom.toml");
    std::fs::write(&toml_path, "root_folder = \"/tmp/facet-from-custom\"\n").unwrap();

    env::remove_var(ROOT_FOLDER_ENV);
    env::set_var(CONFIG_FILE_ENV, "/nonexistent/facet-test.toml");

    let root_folder = RootFolderResolver::new("facet-ensemble")
        .with_config_file(Some(toml_path))
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/facet-from-custom"));

    env::remove_var(CONFIG_FILE_ENV);
}

#[test]
fn test_initializer_paths() {
    let root = PathBuf::from("/tmp/facet-test-root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert_eq!(initializer.database_path(), root.join("facet.db"));
    assert_eq!(initializer.baselines_dir(), root.join("baselines"));
}

#[test]
fn test_initializer_idempotent_directory_creation() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("facet-root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(initializer.ensure_directory_exists().is_ok());

    assert!(root.is_dir());
    assert!(initializer.baselines_dir().is_dir());
    assert!(!initializer.database_path().exists());
}

#[test]
fn test_invalid_toml_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let toml_path = temp_dir.path().join("broken.toml");
    std::fs::write(&toml_path, "this is = = not toml").unwrap();

    assert!(TomlConfig::load(&toml_path).is_err());
    let (config, warning) = TomlConfig::load_or_default(Some(&toml_path));
    assert_eq!(config, TomlConfig::default());
    assert!(warning.unwrap().contains("Parse TOML failed"));
}

#[test]
fn test_valid_toml_loads_without_warning() {
    let temp_dir = TempDir::new().unwrap();
    let toml_path = temp_dir.path().join("facet.toml");
    std::fs::write(
        &toml_path,
        "baseline_storage = \"sqlite\"\n\n[logging]\nlevel = \"debug\"\n",
    )
    .unwrap();

    let (config, warning) = TomlConfig::load_or_default(Some(&toml_path));
    assert!(warning.is_none());
    assert_eq!(config.logging.level, "debug");
}
