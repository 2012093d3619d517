//! Configuration loading with hierarchy merging.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::ConfigError;
use super::schema::Config;
use crate::cli::Cli;
use crate::forward::ForwardPolicy;

/// User configuration directory name.
pub const USER_CONFIG_DIR: &str = "lanlink";

/// User configuration filename.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Configuration loader with support for hierarchy merging.
pub struct ConfigLoader {
    user_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader using the default user config path.
    #[must_use]
    pub fn new() -> Self {
        let user_config_dir = dirs::config_dir()
            .map(|p| p.join(USER_CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from(".config").join(USER_CONFIG_DIR));
        Self {
            user_path: user_config_dir.join(USER_CONFIG_FILE),
        }
    }

    /// Create a loader with a custom user config path (for testing).
    #[must_use]
    pub fn with_user_path(user_path: PathBuf) -> Self {
        Self { user_path }
    }

    /// Load and merge configuration from all sources.
    ///
    /// Order: built-in defaults, then the user config file (skipped when
    /// missing), then the `--config` file (an error when unreadable, since
    /// the user asked for it explicitly), then CLI flag overrides.
    pub fn load(&self, cli: &Cli) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        match load_file(&self.user_path)? {
            Some(user) => {
                debug!(path = %self.user_path.display(), "merged user config");
                config.merge(user);
            }
            None => debug!(path = %self.user_path.display(), "no user config"),
        }

        if let Some(extra_path) = &cli.config {
            let extra = load_file(extra_path)?.ok_or_else(|| ConfigError::ReadError {
                path: extra_path.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            })?;
            debug!(path = %extra_path.display(), "merged --config file");
            config.merge(extra);
        }

        apply_cli_overrides(&mut config, cli);
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Read and parse one TOML config file, returning `None` when it does not
/// exist.
fn load_file(path: &Path) -> Result<Option<Config>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "config file unreadable");
            return Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    let config = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(Some(config))
}

/// Fold CLI flags into the merged config (highest priority).
fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if cli.strict_forwarding {
        config.forward.policy = ForwardPolicy::Strict;
    }
    if let Some(secs) = cli.stop_timeout {
        config.daemon.stop_timeout_secs = secs;
    }
    if let Some(path) = &cli.core_bin {
        config.toolchain.core_bin = Some(path.clone());
    }
    if let Some(path) = &cli.cli_bin {
        config.toolchain.cli_bin = Some(path.clone());
    }
    if let Some(dir) = &cli.easytier_dir {
        config.toolchain.easytier_dir = dir.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("lanlink").chain(args.iter().copied()))
            .expect("CLI args parse")
    }

    #[test]
    fn missing_user_config_yields_defaults() {
        let loader = ConfigLoader::with_user_path(PathBuf::from("/nonexistent/config.toml"));
        let config = loader.load(&cli(&[])).expect("load");
        assert_eq!(config.daemon.stop_timeout_secs, 5);
        assert_eq!(config.forward.policy, ForwardPolicy::Lenient);
    }

    #[test]
    fn user_config_file_is_merged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[daemon]\nstop_timeout_secs = 9\n").expect("write config");

        let loader = ConfigLoader::with_user_path(path);
        let config = loader.load(&cli(&[])).expect("load");
        assert_eq!(config.daemon.stop_timeout_secs, 9);
    }

    #[test]
    fn cli_flags_override_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[daemon]\nstop_timeout_secs = 9\n").expect("write config");

        let loader = ConfigLoader::with_user_path(path);
        let config = loader
            .load(&cli(&["--stop-timeout", "3", "--strict-forwarding"]))
            .expect("load");
        assert_eq!(config.daemon.stop_timeout_secs, 3);
        assert_eq!(config.forward.policy, ForwardPolicy::Strict);
    }

    #[test]
    fn explicit_config_flag_must_exist() {
        let loader = ConfigLoader::with_user_path(PathBuf::from("/nonexistent/config.toml"));
        let result = loader.load(&cli(&["--config", "/nonexistent/extra.toml"]));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn malformed_config_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is not toml = [").expect("write config");

        let loader = ConfigLoader::with_user_path(path);
        assert!(matches!(
            loader.load(&cli(&[])),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
