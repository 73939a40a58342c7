//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered with the `config`
//! crate: built-in defaults, `relay-dispatch.toml`, `relay-dispatch.<environment>.toml`
//! and finally `RELAY_DISPATCH__*` environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::DispatcherConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_STEM: &str = "relay-dispatch";
const ENV_PREFIX: &str = "RELAY_DISPATCH";

/// Loaded, validated configuration with the context it was loaded from
#[derive(Debug)]
pub struct ConfigManager {
    config: DispatcherConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for tests that must not touch global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading dispatcher configuration"
        );

        let config = Self::load_layers(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            checkpoint_kind = config.checkpoint.kind,
            flush_interval_seconds = config.checkpoint.flush_interval_seconds,
            tolerance_seconds = config.subscriptions.created_at_tolerance_seconds,
            "⚙️ Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect the deployment environment from process variables
    pub fn detect_environment() -> String {
        env::var("RELAY_DISPATCH_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("RELAY_DISPATCH_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn load_layers(directory: &Path, environment: &str) -> ConfigResult<DispatcherConfig> {
        let to_error = |e: config::ConfigError| ConfigurationError::load_error(environment, e);

        let defaults = Config::try_from(&DispatcherConfig::default()).map_err(to_error)?;
        let base_file = directory.join(format!("{BASE_FILE_STEM}.toml"));
        let env_file = directory.join(format!("{BASE_FILE_STEM}.{environment}.toml"));

        debug!(
            base_file = %base_file.display(),
            base_exists = base_file.exists(),
            env_file = %env_file.display(),
            env_exists = env_file.exists(),
            "Resolving configuration layers"
        );

        Config::builder()
            .add_source(defaults)
            .add_source(File::from(base_file).required(false))
            .add_source(File::from(env_file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override("environment", environment)
            .map_err(to_error)?
            .build()
            .map_err(to_error)?
            .try_deserialize::<DispatcherConfig>()
            .map_err(to_error)
    }
}
