//! # Chimera Core Configuration
//!
//! Layered configuration for the lifecycle orchestrator, the event bus and the
//! persistence coordinator.
//!
//! ## Sources (later sources win)
//!
//! 1. Built-in defaults (every field has one)
//! 2. `config/core.toml`
//! 3. `config/core.{environment}.toml`
//! 4. `CHIMERA_<SECTION>__<FIELD>` environment variables
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chimera_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let max_listeners = manager.config().events.max_listeners;
//! let save_dir = &manager.config().persistence.save_directory;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/core.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Startup/shutdown sequencing and tick pacing
    pub lifecycle: LifecycleConfig,

    /// Event bus caps, diagnostics and metrics window
    pub events: EventsConfig,

    /// Save slots, file layout and auto-save scheduling
    pub persistence: PersistenceConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Reject configurations the core cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.events.max_listeners == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.max_listeners",
                "0",
                "channels must accept at least one listener",
            ));
        }
        if self.events.max_events_per_frame == 0 {
            return Err(ConfigurationError::invalid_value(
                "events.max_events_per_frame",
                "0",
                "a zero cap would drop every event",
            ));
        }
        if self.events.metrics_window_seconds <= 0.0 {
            return Err(ConfigurationError::invalid_value(
                "events.metrics_window_seconds",
                self.events.metrics_window_seconds.to_string(),
                "metrics window must be positive",
            ));
        }
        if self.persistence.file_prefix.is_empty() {
            return Err(ConfigurationError::invalid_value(
                "persistence.file_prefix",
                "",
                "slot files need a prefix to be discoverable",
            ));
        }
        if self.persistence.max_auto_saves == 0 && self.persistence.auto_save_enabled {
            return Err(ConfigurationError::invalid_value(
                "persistence.max_auto_saves",
                "0",
                "auto-save is enabled but the auto-save band is empty",
            ));
        }
        if self.lifecycle.tick_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "lifecycle.tick_interval_ms",
                "0",
                "tick interval must be positive",
            ));
        }
        Ok(())
    }
}

/// Lifecycle orchestration configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Explicit initialization order by component kind. Components not listed
    /// initialize afterwards in registration order.
    pub initialization_order: Vec<String>,
    /// Host tick pacing used by the bootstrap loop
    pub tick_interval_ms: u64,
    /// Map external suspend/focus-loss signals onto pause/resume
    pub pause_on_suspend: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            initialization_order: Vec::new(),
            tick_interval_ms: 16,
            pause_on_suspend: true,
        }
    }
}

impl LifecycleConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Event bus configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Listener cap applied to channels created through the bus
    pub max_listeners: usize,
    /// Raises admitted per tick before further raises are dropped
    pub max_events_per_frame: usize,
    /// Capacity of the diagnostic ring buffer
    pub event_log_capacity: usize,
    /// Rolling window (simulated seconds) for events-per-minute
    pub metrics_window_seconds: f64,
    /// Record every admitted raise in the diagnostic log, not only channels
    /// with logging enabled
    pub log_all_events: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            max_listeners: constants::events::DEFAULT_MAX_LISTENERS,
            max_events_per_frame: constants::events::DEFAULT_MAX_EVENTS_PER_FRAME,
            event_log_capacity: constants::events::DEFAULT_EVENT_LOG_CAPACITY,
            metrics_window_seconds: constants::events::DEFAULT_METRICS_WINDOW_SECONDS,
            log_all_events: false,
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Register a persistence coordinator with the orchestrator
    pub enabled: bool,
    pub save_directory: PathBuf,
    pub file_prefix: String,
    pub file_extension: String,
    pub auto_save_enabled: bool,
    /// Simulated seconds between auto-saves
    pub auto_save_interval_seconds: f64,
    /// Size of the reserved auto-save band starting at slot 9000
    pub max_auto_saves: u32,
    /// Version stamped into save metadata
    pub application_version: String,
    pub pretty_print: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            save_directory: PathBuf::from(constants::persistence::DEFAULT_SAVE_DIRECTORY),
            file_prefix: constants::persistence::DEFAULT_FILE_PREFIX.to_string(),
            file_extension: constants::persistence::DEFAULT_FILE_EXTENSION.to_string(),
            auto_save_enabled: true,
            auto_save_interval_seconds: constants::persistence::DEFAULT_AUTO_SAVE_INTERVAL_SECONDS,
            max_auto_saves: constants::persistence::DEFAULT_MAX_AUTO_SAVES,
            application_version: constants::APPLICATION_VERSION.to_string(),
            pretty_print: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; falls back to `RUST_LOG`, then the environment default
    pub level: Option<String>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.events.max_listeners, 100);
        assert_eq!(config.events.max_events_per_frame, 100);
        assert_eq!(config.events.event_log_capacity, 1000);
        assert_eq!(config.persistence.file_prefix, "SaveGame_");
        assert_eq!(config.lifecycle.tick_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_validation_rejects_zero_caps() {
        let mut config = CoreConfig::default();
        config.events.max_listeners = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { ref field, .. }) if field == "events.max_listeners"
        ));

        let mut config = CoreConfig::default();
        config.persistence.max_auto_saves = 0;
        assert!(config.validate().is_err());
        config.persistence.auto_save_enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: CoreConfig =
            serde_json::from_str(r#"{"events": {"max_listeners": 5}}"#).unwrap();
        assert_eq!(config.events.max_listeners, 5);
        assert_eq!(config.events.max_events_per_frame, 100);
        assert!(config.persistence.enabled);
    }
}
