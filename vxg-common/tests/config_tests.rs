//! Tests for configuration resolution and graceful degradation
//!
//! Covers:
//! - Priority order: CLI argument, then environment variable, then user config dir
//! - Missing user config → defaults
//! - Malformed TOML → error
//! - Atomic TOML write-back
//!
//! Note: Uses serial_test to prevent ENV variable race conditions.
//! Tests that manipulate VXG_TEST_CONFIG are marked with #[serial].

use serde::{Deserialize, Serialize};
use serial_test::serial;
use std::env;
use std::path::Path;
use tempfile::TempDir;
use vxg_common::config::{
    load_toml, resolve_config_path, write_toml_config, ConfigOrigin, LoggingConfig,
};
use vxg_common::Error;

const ENV_VAR: &str = "VXG_TEST_CONFIG";

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
struct SampleConfig {
    #[serde(default)]
    name: String,
    #[serde(default)]
    logging: Option<LoggingConfig>,
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    env::set_var(ENV_VAR, "/tmp/from-env.toml");

    let resolved = resolve_config_path(None, ENV_VAR, "sample.toml").unwrap();
    assert_eq!(resolved.origin, ConfigOrigin::Environment);
    assert_eq!(resolved.path, Path::new("/tmp/from-env.toml"));

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_cli_arg_overrides_env_var() {
    env::set_var(ENV_VAR, "/tmp/from-env.toml");

    let resolved =
        resolve_config_path(Some(Path::new("/tmp/from-cli.toml")), ENV_VAR, "sample.toml")
            .unwrap();
    assert_eq!(resolved.origin, ConfigOrigin::CommandLine);

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_empty_env_var_is_ignored() {
    env::set_var(ENV_VAR, "   ");

    let resolved = resolve_config_path(None, ENV_VAR, "vxg-no-such-file-for-tests.toml");
    assert!(resolved.is_none());

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_load_from_env_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sample.toml");
    std::fs::write(&path, "name = \"ops\"\n[logging]\nlevel = \"debug\"\n").unwrap();
    env::set_var(ENV_VAR, &path);

    let resolved = resolve_config_path(None, ENV_VAR, "sample.toml");
    let config: SampleConfig = load_toml(resolved.as_ref()).unwrap();
    assert_eq!(config.name, "ops");
    assert_eq!(config.logging.unwrap().level, "debug");

    env::remove_var(ENV_VAR);
}

#[test]
fn test_malformed_toml_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "name = [unterminated").unwrap();

    let resolved = resolve_config_path(Some(&path), ENV_VAR, "broken.toml");
    let result: vxg_common::Result<SampleConfig> = load_toml(resolved.as_ref());
    assert!(matches!(result, Err(Error::TomlParse(_))));
}

#[test]
fn test_write_then_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("written.toml");

    let original = SampleConfig {
        name: "written".to_string(),
        logging: Some(LoggingConfig::default()),
    };
    write_toml_config(&original, &path).unwrap();

    assert!(path.exists());
    assert!(!path.with_extension("toml.tmp").exists());

    let resolved = resolve_config_path(Some(&path), ENV_VAR, "written.toml");
    let loaded: SampleConfig = load_toml(resolved.as_ref()).unwrap();
    assert_eq!(loaded, original);
}
