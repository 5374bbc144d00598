//! Configuration resolution tests
//!
//! Tests that touch SPELLBOOK_TEST_ROOT are marked #[serial] so they never
//! race on the process environment.

use serial_test::serial;
use spellbook_common::config::{database_path, resolve_root_folder, TomlConfig};
use spellbook_common::{ApprovalPolicy, Error};
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

const ENV_VAR: &str = "SPELLBOOK_TEST_ROOT";

fn toml_with_root(root: &str) -> TomlConfig {
    TomlConfig {
        root_folder: Some(root.to_string()),
        ..TomlConfig::default()
    }
}

#[test]
#[serial]
fn test_cli_argument_wins() {
    env::set_var(ENV_VAR, "/from/env");

    let root = resolve_root_folder(Some("/from/cli"), ENV_VAR, &toml_with_root("/from/toml"));
    assert_eq!(root, PathBuf::from("/from/cli"));

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ENV_VAR, "/from/env");

    let root = resolve_root_folder(None, ENV_VAR, &toml_with_root("/from/toml"));
    assert_eq!(root, PathBuf::from("/from/env"));

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_empty_env_var_falls_through_to_toml() {
    env::set_var(ENV_VAR, "");

    let root = resolve_root_folder(None, ENV_VAR, &toml_with_root("/from/toml"));
    assert_eq!(root, PathBuf::from("/from/toml"));

    env::remove_var(ENV_VAR);
}

#[test]
#[serial]
fn test_compiled_default_when_nothing_is_set() {
    env::remove_var(ENV_VAR);

    let root = resolve_root_folder(None, ENV_VAR, &TomlConfig::default());
    assert!(root.ends_with("spellbook") || root.ends_with("spellbook_data"));
    assert!(database_path(&root).ends_with("spellbook.db"));
}

#[test]
fn test_config_file_round_trip() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
port = 6000
admin_token_sha256 = "9af15b336e6a9619928537df30b2e6a2376569fcf9d7e773eccede65606529a0"
approval_policy = "reconcile"
"#
    )
    .unwrap();

    let config = TomlConfig::from_file(file.path()).unwrap();
    assert_eq!(config.port, Some(6000));
    assert!(config.root_folder.is_none());
    assert_eq!(config.approval_policy().unwrap(), Some(ApprovalPolicy::Reconcile));
}

#[test]
fn test_malformed_config_file_is_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number\"").unwrap();

    assert!(matches!(
        TomlConfig::from_file(file.path()),
        Err(Error::Config(_))
    ));
}
