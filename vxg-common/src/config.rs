//! Configuration file resolution, TOML loading and logging bootstrap
//!
//! Configuration file priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config file (`<config_dir>/vxg/<file_name>`)
//! 4. Built-in defaults (no file)
//!
//! A missing per-user file is not an error: the caller gets defaults and a
//! warning. A path named explicitly on the command line or in the
//! environment must exist, and a file that exists must parse.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Directory name under the platform config dir
pub const APP_DIR: &str = "vxg";

/// Where a configuration path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    CommandLine,
    Environment,
    UserConfigDir,
}

/// A configuration file path together with its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfigPath {
    pub path: PathBuf,
    pub origin: ConfigOrigin,
}

impl ResolvedConfigPath {
    /// Explicit paths (CLI or ENV) must exist; the per-user default may not
    fn is_explicit(&self) -> bool {
        !matches!(self.origin, ConfigOrigin::UserConfigDir)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve the configuration file path following the priority order above
///
/// Returns `None` when no source names a file, in which case the caller
/// runs on built-in defaults.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_name: &str,
) -> Option<ResolvedConfigPath> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(ResolvedConfigPath {
            path: path.to_path_buf(),
            origin: ConfigOrigin::CommandLine,
        });
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(ResolvedConfigPath {
                path: PathBuf::from(path),
                origin: ConfigOrigin::Environment,
            });
        }
    }

    // Priority 3: Per-user config file, only if present
    default_config_path(file_name)
        .filter(|p| p.exists())
        .map(|path| ResolvedConfigPath {
            path,
            origin: ConfigOrigin::UserConfigDir,
        })
}

/// Platform default location for a config file
pub fn default_config_path(file_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(file_name))
}

/// Load a TOML document, falling back to `T::default()` when no file applies
pub fn load_toml<T>(resolved: Option<&ResolvedConfigPath>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(resolved) = resolved else {
        warn!("No configuration file found, using built-in defaults");
        return Ok(T::default());
    };

    if !resolved.path.exists() {
        if resolved.is_explicit() {
            return Err(Error::Config(format!(
                "Config file not found: {} (from {:?})",
                resolved.path.display(),
                resolved.origin
            )));
        }
        warn!(
            "Config file {} disappeared, using built-in defaults",
            resolved.path.display()
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(&resolved.path)?;
    let config = toml::from_str(&content)?;
    info!(
        "Loaded configuration from {} ({:?})",
        resolved.path.display(),
        resolved.origin
    );
    Ok(config)
}

/// Write a configuration document to TOML
///
/// Writes to a sibling temporary file then renames it over the target so a
/// reader never observes a half-written file.
pub fn write_toml_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level. Returns an error if a
/// subscriber is already installed.
pub fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", logging.level, e)))?;

    let installed = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Tracing already initialized: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_defaults() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.level, "info");
        assert!(logging.file.is_none());
    }

    #[test]
    fn test_cli_path_wins() {
        let resolved = resolve_config_path(
            Some(Path::new("/tmp/explicit.toml")),
            "VXG_TEST_UNUSED_VAR",
            "vxg-engine.toml",
        )
        .unwrap();
        assert_eq!(resolved.origin, ConfigOrigin::CommandLine);
        assert_eq!(resolved.path, PathBuf::from("/tmp/explicit.toml"));
    }

    #[test]
    fn test_missing_explicit_path_is_error() {
        let resolved = ResolvedConfigPath {
            path: PathBuf::from("/nonexistent/vxg/none.toml"),
            origin: ConfigOrigin::CommandLine,
        };
        let result: Result<LoggingConfig> = load_toml(Some(&resolved));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_no_path_gives_defaults() {
        let logging: LoggingConfig = load_toml(None).unwrap();
        assert_eq!(logging.level, "info");
    }
}
