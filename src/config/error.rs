//! Configuration Error Types
//!
//! Errors raised while loading, merging and validating the core configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The layered sources could not be read or merged
    #[error("Failed to build configuration from '{config_directory}': {error}")]
    SourceError {
        config_directory: PathBuf,
        error: String,
    },

    /// The merged configuration does not match the expected shape
    #[error("Failed to deserialize configuration: {error}")]
    DeserializationError { error: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// Environment-specific configuration issues
    #[error("Environment configuration error for '{environment}': {error}")]
    EnvironmentConfigError { environment: String, error: String },
}

impl ConfigurationError {
    pub fn source_error<E: std::fmt::Display>(config_directory: impl Into<PathBuf>, error: E) -> Self {
        Self::SourceError {
            config_directory: config_directory.into(),
            error: error.to_string(),
        }
    }

    pub fn deserialization<E: std::fmt::Display>(error: E) -> Self {
        Self::DeserializationError {
            error: error.to_string(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
