//! Loading and saving configuration files.

use nestcfg::{Config, ConfigError, ConfigValue};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const SERVICE: &str = "\
# Service settings
name = api
server:
    host = localhost
    port = 8080
    # tls is optional
    tls:
        enabled = false
";

/// Test helper to create a temporary configuration file
fn create_temp_config_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let config_path = dir.path().join(name);
    fs::write(&config_path, content).expect("Failed to write test config file");
    config_path
}

#[test]
fn test_open_records_file_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = create_temp_config_file(&temp_dir, "service.cfg", SERVICE);

    let config = Config::open(&path).unwrap();
    assert_eq!(config.file_path(), Some(path.as_path()));
    assert_eq!(
        config.get("config_file_path").unwrap().unwrap(),
        ConfigValue::from(path.display().to_string())
    );
    assert_eq!(
        config
            .root()
            .lookup_path(["server", "tls", "enabled"])
            .unwrap()
            .unwrap(),
        ConfigValue::Boolean(false)
    );
}

#[test]
fn test_save_writes_back_unchanged_text() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = create_temp_config_file(&temp_dir, "service.cfg", SERVICE);

    let config = Config::open(&path).unwrap();
    fs::write(&path, "").unwrap();
    config.save(None).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), SERVICE);
}

#[test]
fn test_save_to_other_path_keeps_file_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = create_temp_config_file(&temp_dir, "service.cfg", SERVICE);
    let other = temp_dir.path().join("nested").join("dir").join("copy.cfg");

    let config = Config::open(&path).unwrap();
    config.save(Some(other.as_path())).unwrap();

    assert_eq!(fs::read_to_string(&other).unwrap(), SERVICE);
    assert_eq!(config.file_path(), Some(path.as_path()));
}

#[test]
fn test_save_as_updates_file_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let target = temp_dir.path().join("new.cfg");

    let mut config = Config::new();
    config.set("answer", 42).unwrap();
    config
        .section("server")
        .unwrap()
        .save_as(&target)
        .unwrap();

    assert_eq!(config.file_path(), Some(target.as_path()));
    assert_eq!(fs::read_to_string(&target).unwrap(), "answer = 42\nserver:\n");

    // Saving from a nested node writes the whole tree to the root's file
    config.section("server").unwrap().set("port", 1).unwrap();
    config.root().section("server").unwrap().save(None).unwrap();
    assert_eq!(
        fs::read_to_string(&target).unwrap(),
        "answer = 42\nserver:\n    port = 1\n"
    );
}

#[test]
fn test_save_without_path_fails() {
    let config = Config::new();
    assert!(matches!(
        config.save(None).unwrap_err(),
        ConfigError::MissingFilePath
    ));
}

#[test]
fn test_load_file_into_populated_node_keeps_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let extra = create_temp_config_file(&temp_dir, "extra.cfg", "extra = 1\n");

    let mut config: Config = "base = 0\n".parse().unwrap();
    config.root_mut().load_file(&extra).unwrap();
    assert_eq!(config.file_path(), None);
    assert_eq!(config.dumps().unwrap(), "base = 0\nextra = 1\n");
}

#[test]
fn test_load_file_into_section() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = create_temp_config_file(&temp_dir, "db.cfg", "host = db\nport = 5432\n");

    let mut config = Config::new();
    config.section("database").unwrap().load_file(&path).unwrap();

    let database = config.root().section("database").unwrap();
    assert_eq!(database.file_path(), Some(path.as_path()));
    assert_eq!(config.file_path(), None);
    assert_eq!(
        config.dumps().unwrap(),
        "database:\n    host = db\n    port = 5432\n"
    );
}

#[test]
fn test_open_missing_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let err = Config::open(temp_dir.path().join("missing.cfg")).unwrap_err();
    assert!(err.is_io_error());
}

#[test]
fn test_open_reports_bad_line() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = create_temp_config_file(&temp_dir, "bad.cfg", "a = 1\nthis is not valid\n");

    let err = Config::open(&path).unwrap_err();
    assert_eq!(err.line(), Some(2));
    assert!(err.to_string().contains("Ill formed line"));
}

#[test]
fn test_copy_is_detached_from_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = create_temp_config_file(&temp_dir, "service.cfg", SERVICE);

    let config = Config::open(&path).unwrap();
    let copy = config.root().section("server").unwrap().copy().unwrap();
    assert_eq!(copy.file_path(), None);
    assert_eq!(
        copy.dumps().unwrap(),
        "host = localhost\nport = 8080\n    # tls is optional\ntls:\n    enabled = false\n"
    );
}

#[test]
fn test_frozen_tree_can_still_be_saved() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = create_temp_config_file(&temp_dir, "service.cfg", SERVICE);

    let mut config = Config::open(&path).unwrap();
    config.set_immutable(true);
    config.save(None).unwrap();

    let err = config.save_as(temp_dir.path().join("other.cfg")).unwrap_err();
    assert!(err.is_unsupported_operation());
    assert!(err.to_string().contains("save_as"));
}
