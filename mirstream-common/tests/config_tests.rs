//! Tests for configuration file discovery and TOML loading
//!
//! Tests that manipulate MIRSTREAM_* environment variables are marked #[serial]
//! so they never run in parallel with each other.

use mirstream_common::config::{
    default_config_path, load_toml, resolve_config_path, CONFIG_ENV_VAR,
};
use mirstream_common::Error;
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Deserialize, PartialEq)]
struct HttpSection {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    host: Option<String>,
}

fn default_port() -> u16 {
    5050
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    http: Option<HttpSection>,
}

#[test]
#[serial]
fn test_env_var_used_when_no_cli_arg() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/mirstream-from-env.toml");

    let resolved = resolve_config_path(None, CONFIG_ENV_VAR);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/mirstream-from-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/mirstream-from-env.toml");

    let cli = PathBuf::from("/tmp/mirstream-from-cli.toml");
    let resolved = resolve_config_path(Some(&cli), CONFIG_ENV_VAR);
    assert_eq!(resolved, Some(cli));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_empty_env_var_ignored() {
    env::set_var(CONFIG_ENV_VAR, "");

    let resolved = resolve_config_path(None, CONFIG_ENV_VAR);
    // Falls through to the platform default, which is only returned if it exists
    if let Some(path) = resolved {
        assert_eq!(Some(path), default_config_path());
    }

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_default_path_under_app_dir() {
    if let Some(path) = default_config_path() {
        assert!(path.ends_with("mirstream/config.toml"));
    }
}

#[test]
fn test_load_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[http]\nhost = \"0.0.0.0\"\n").unwrap();

    let doc: Document = load_toml(&path).unwrap();
    assert_eq!(
        doc.http,
        Some(HttpSection {
            port: 5050,
            host: Some("0.0.0.0".to_string()),
        })
    );
}

#[test]
fn test_load_empty_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "").unwrap();

    let doc: Document = load_toml(&path).unwrap();
    assert!(doc.http.is_none());
}

#[test]
fn test_load_invalid_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[http\nport = ").unwrap();

    let result: mirstream_common::Result<Document> = load_toml(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}
