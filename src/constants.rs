//! # System Constants
//!
//! Defaults and identifiers that define the operational boundaries of the
//! core: listener and per-frame caps, the diagnostic log size, the auto-save
//! slot band and the ids of the built-in notification channels.

/// Identifiers of the channels every event bus carries
pub mod channels {
    pub const STATE_CHANGED: &str = "core.state_changed";
    pub const SAVE_STARTED: &str = "core.save_started";
    pub const SAVE_COMPLETED: &str = "core.save_completed";
    pub const SAVE_ERROR: &str = "core.save_error";
    pub const LOAD_STARTED: &str = "core.load_started";
    pub const LOAD_COMPLETED: &str = "core.load_completed";
    pub const LOAD_ERROR: &str = "core.load_error";
    pub const EVENT_OVERFLOW: &str = "core.event_overflow";
}

/// Event bus defaults
pub mod events {
    pub const DEFAULT_MAX_LISTENERS: usize = 100;
    pub const DEFAULT_MAX_EVENTS_PER_FRAME: usize = 100;
    pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 1000;
    pub const DEFAULT_METRICS_WINDOW_SECONDS: f64 = 60.0;
}

/// Persistence defaults
pub mod persistence {
    /// First slot of the reserved auto-save band
    pub const AUTO_SAVE_SLOT_BASE: u32 = 9000;
    pub const DEFAULT_MAX_AUTO_SAVES: u32 = 3;
    pub const DEFAULT_AUTO_SAVE_INTERVAL_SECONDS: f64 = 300.0;
    pub const DEFAULT_SAVE_DIRECTORY: &str = "saves";
    pub const DEFAULT_FILE_PREFIX: &str = "SaveGame_";
    pub const DEFAULT_FILE_EXTENSION: &str = ".json";
    pub const AUTO_SAVE_MARKER: &str = "AutoSave_";
    pub const TEMP_SUFFIX: &str = ".tmp";
}

/// Registry keys of the components the core registers itself
pub mod components {
    pub const EVENT_BUS: &str = "event_bus";
    pub const PERSISTENCE: &str = "persistence_coordinator";
}

/// Application version stamped into save metadata when none is configured
pub const APPLICATION_VERSION: &str = env!("CARGO_PKG_VERSION");
