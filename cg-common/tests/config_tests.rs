//! Root folder resolution and TOML loading
//!
//! Tests that touch CARDGRAPH_ROOT_FOLDER / CARDGRAPH_ROOT are #[serial] so
//! they never observe each other's environment.

use cg_common::config::{
    read_toml_config, CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig,
    DATABASE_FILE, ROOT_ENV, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

fn clear_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    env::remove_var(ROOT_ENV);
}

#[test]
fn test_compiled_defaults() {
    let defaults = CompiledDefaults::for_current_platform();
    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.to_string_lossy().contains("cardgraph"));
}

#[test]
fn test_toml_defaults_without_file() {
    let config = TomlConfig::default();
    assert_eq!(config.logging.level, "info");
    assert!(config.logging.file.is_none());
    assert!(config.port.is_none());
    assert_eq!(config.tools.docker, "docker");
}

#[test]
#[serial]
fn test_env_primary_variable() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "/tmp/cg-env-primary");

    let resolved = RootFolderResolver::new("cardgraph-config-test").resolve();
    assert_eq!(resolved, PathBuf::from("/tmp/cg-env-primary"));

    clear_env();
}

#[test]
#[serial]
fn test_env_primary_beats_alternate() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "/tmp/cg-primary");
    env::set_var(ROOT_ENV, "/tmp/cg-alternate");

    let resolved = RootFolderResolver::new("cardgraph-config-test").resolve();
    assert_eq!(resolved, PathBuf::from("/tmp/cg-primary"));

    clear_env();
}

#[test]
#[serial]
fn test_env_alternate_variable() {
    clear_env();
    env::set_var(ROOT_ENV, "/tmp/cg-alternate-only");

    let resolved = RootFolderResolver::new("cardgraph-config-test").resolve();
    assert_eq!(resolved, PathBuf::from("/tmp/cg-alternate-only"));

    clear_env();
}

#[test]
#[serial]
fn test_cli_beats_env() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "/tmp/cg-env");

    let resolved = RootFolderResolver::new("cardgraph-config-test")
        .with_cli_arg(Some(PathBuf::from("/tmp/cg-cli")))
        .resolve();
    assert_eq!(resolved, PathBuf::from("/tmp/cg-cli"));

    clear_env();
}

#[test]
#[serial]
fn test_blank_env_is_ignored() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "   ");

    let resolved = RootFolderResolver::new("cardgraph-config-test").resolve();
    assert_ne!(resolved, PathBuf::from("   "));

    clear_env();
}

#[test]
fn test_initializer_creates_nested_directory() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join("a").join("b");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();
    // Idempotent
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(initializer.database_path(), root.join(DATABASE_FILE));
    assert!(!initializer.database_exists());
}

#[test]
fn test_read_toml_config_full_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("cardgraph.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/cardgraph"
port = 6100
scheduler_key = "abc123"

[logging]
level = "debug"

[tools]
whisper = "/opt/whisper/bin/whisper"
"#,
    )
    .unwrap();

    let config = read_toml_config(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/cardgraph")));
    assert_eq!(config.port, Some(6100));
    assert_eq!(config.scheduler_key.as_deref(), Some("abc123"));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.tools.whisper, "/opt/whisper/bin/whisper");
    assert_eq!(config.tools.ffmpeg, "ffmpeg");
}
