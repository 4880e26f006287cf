//! Configuration file discovery and TOML loading
//!
//! Resolution order for the configuration file:
//! 1. Explicit path (command-line argument)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/mirstream/config.toml`)
//!
//! A missing file is not an error: callers fall back to built-in defaults.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "MIRSTREAM_CONFIG";

/// Application directory name under the platform config directory
const APP_DIR: &str = "mirstream";

/// Locate the configuration file to use, if any.
///
/// An explicit path or the environment variable is returned as-is (the caller
/// reports a missing file). The platform default is only returned when it exists.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: platform default, only if present
    let default = default_config_path()?;
    if default.exists() {
        Some(default)
    } else {
        debug!("No config file at {}", default.display());
        None
    }
}

/// Platform default configuration file path
///
/// - Linux: `~/.config/mirstream/config.toml`
/// - macOS: `~/Library/Application Support/mirstream/config.toml`
/// - Windows: `%APPDATA%\mirstream\config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Parse a TOML document into `T`
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(toml::from_str(content)?)
}

/// Read and parse a TOML file into `T`
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    parse_toml(&content).map_err(|e| {
        warn!("Invalid config file {}: {}", path.display(), e);
        Error::Config(format!("Invalid config file {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        port: u16,
        #[serde(default)]
        name: Option<String>,
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = PathBuf::from("/tmp/explicit.toml");
        let resolved = resolve_config_path(Some(&path), "MIRSTREAM_TEST_UNSET_VAR");
        assert_eq!(resolved, Some(path));
    }

    #[test]
    fn test_parse_toml() {
        let sample: Sample = parse_toml("port = 5050\n").unwrap();
        assert_eq!(sample.port, 5050);
        assert!(sample.name.is_none());
    }

    #[test]
    fn test_parse_toml_error() {
        let result: Result<Sample> = parse_toml("port = \"not a number\"");
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let result: Result<Sample> = load_toml(Path::new("/nonexistent/mirstream.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
