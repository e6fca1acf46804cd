//! Configuration file resolution and TOML loading
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/stemsync/config.toml`)
//! 4. None: callers fall back to built-in defaults

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable consulted for the config file path
pub const CONFIG_ENV_VAR: &str = "STEMSYNC_CONFIG";

/// File name of the configuration file inside the platform config dir
const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolve which configuration file to load
///
/// An explicitly requested file (CLI or environment) must exist, otherwise
/// an error is returned. The platform default is optional: if it does not
/// exist, `Ok(None)` tells the caller to use built-in defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Result<Option<PathBuf>> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return require_existing(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return require_existing(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    if let Some(path) = default_config_path() {
        if path.exists() {
            debug!("Using platform config file: {}", path.display());
            return Ok(Some(path));
        }
    }

    // Priority 4: Built-in defaults
    Ok(None)
}

fn require_existing(path: PathBuf) -> Result<Option<PathBuf>> {
    if path.exists() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!("Config file not found: {}", path.display())))
    }
}

/// Default per-user configuration file path for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("stemsync").join(CONFIG_FILE_NAME))
}

/// Default per-user cache directory for on-disk stores
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("stemsync"))
        .unwrap_or_else(|| PathBuf::from("./stemsync_cache"))
}

/// Load a TOML file into `T`
///
/// Missing fields are filled by `T`'s serde defaults.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    let value = toml::from_str::<T>(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(value)
}

/// Resolve and load a TOML config, or fall back to `T::default()`
pub fn load_or_default<T: DeserializeOwned + Default>(
    cli_arg: Option<&Path>,
    env_var_name: &str,
) -> Result<T> {
    match resolve_config_path(cli_arg, env_var_name)? {
        Some(path) => load_toml(&path),
        None => {
            info!("No configuration file found, using built-in defaults");
            Ok(T::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serial_test::serial;
    use std::io::Write;

    #[derive(Debug, Deserialize, Default, PartialEq)]
    struct Sample {
        #[serde(default)]
        name: String,
        #[serde(default)]
        count: u32,
    }

    #[test]
    #[serial]
    fn test_cli_arg_takes_priority() {
        let dir = tempfile::tempdir().unwrap();
        let cli = dir.path().join("cli.toml");
        let env = dir.path().join("env.toml");
        std::fs::write(&cli, "name = \"cli\"").unwrap();
        std::fs::write(&env, "name = \"env\"").unwrap();

        std::env::set_var("STEMSYNC_TEST_CONFIG_A", &env);
        let resolved = resolve_config_path(Some(&cli), "STEMSYNC_TEST_CONFIG_A").unwrap();
        std::env::remove_var("STEMSYNC_TEST_CONFIG_A");

        assert_eq!(resolved, Some(cli));
    }

    #[test]
    #[serial]
    fn test_env_var_used_without_cli() {
        let dir = tempfile::tempdir().unwrap();
        let env = dir.path().join("env.toml");
        std::fs::write(&env, "name = \"env\"").unwrap();

        std::env::set_var("STEMSYNC_TEST_CONFIG_B", &env);
        let resolved = resolve_config_path(None, "STEMSYNC_TEST_CONFIG_B").unwrap();
        std::env::remove_var("STEMSYNC_TEST_CONFIG_B");

        assert_eq!(resolved, Some(env));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let result = resolve_config_path(Some(Path::new("/nonexistent/stemsync.toml")), "UNUSED_VAR");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_toml_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"studio\"").unwrap();

        let sample: Sample = load_toml(file.path()).unwrap();
        assert_eq!(sample, Sample { name: "studio".to_string(), count: 0 });
    }

    #[test]
    fn test_load_toml_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = [unterminated").unwrap();

        let result: Result<Sample> = load_toml(file.path());
        assert!(matches!(result, Err(Error::Toml(_))));
    }
}
