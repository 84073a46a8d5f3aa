//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles config directory
//! discovery, environment detection and layering of file and environment
//! variable sources.

use super::error::{ConfigResult, ConfigurationError};
use super::CoreConfig;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const BASE_FILE_STEM: &str = "core";
const ENV_PREFIX: &str = "CHIMERA";

/// Loaded configuration plus the context it was loaded in
#[derive(Debug)]
pub struct ConfigManager {
    config: CoreConfig,
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

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from("config"));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::build_layered_config(&config_directory, environment)?;
        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string(&config).unwrap_or_else(|_| "[serialization error]".to_string())
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration (tests, embedded hosts)
    pub fn from_config(config: CoreConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from("config"),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Configuration rendered as JSON for diagnostics
    pub fn debug_config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment: CHIMERA_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("CHIMERA_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn build_layered_config(config_directory: &Path, environment: &str) -> ConfigResult<CoreConfig> {
        let base_file = config_directory.join(format!("{BASE_FILE_STEM}.toml"));
        let env_file = config_directory.join(format!("{BASE_FILE_STEM}.{environment}.toml"));

        if !base_file.exists() {
            debug!(
                "No base configuration at {}; using built-in defaults",
                base_file.display()
            );
        }

        let layered = config::Config::builder()
            .add_source(config::File::from(base_file.as_path()).required(false))
            .add_source(config::File::from(env_file.as_path()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::source_error(config_directory, e))?;

        layered.try_deserialize::<CoreConfig>().map_err(|e| {
            ConfigurationError::EnvironmentConfigError {
                environment: environment.to_string(),
                error: ConfigurationError::deserialization(e).to_string(),
            }
        })
    }
}
