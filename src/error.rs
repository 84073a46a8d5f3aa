//! Error types for the Chimera core.
//!
//! Errors local to a single component (initialization, shutdown, save
//! contribution) are caught at the orchestrator/coordinator boundary and only
//! logged. The variants here describe failures that are surfaced to callers
//! of an operation.

use crate::config::ConfigurationError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for the core surface
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Initialization failure in component '{component}': {reason}")]
    InitializationFailure { component: String, reason: String },
    #[error("Shutdown failure in component '{component}': {reason}")]
    ShutdownFailure { component: String, reason: String },
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
    #[error("Component not registered: {0}")]
    ComponentNotFound(String),
    #[error(transparent)]
    Event(#[from] EventError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Event bus failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("Channel '{channel}' is at listener capacity ({max_listeners})")]
    ListenerCapacityExceeded { channel: String, max_listeners: usize },
    #[error("Event rate exceeded on frame {frame}: '{channel}' dropped (cap {max_events_per_frame})")]
    EventRateExceeded {
        channel: String,
        frame: u64,
        max_events_per_frame: usize,
    },
    #[error("Event channel not found: {0}")]
    ChannelNotFound(String),
    #[error("Event channel '{channel}' carries {actual}, not {requested}")]
    ChannelTypeMismatch {
        channel: String,
        requested: &'static str,
        actual: &'static str,
    },
}

/// Save/load failures
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("A save operation is already in progress")]
    SaveInProgress,
    #[error("A load operation is already in progress")]
    LoadInProgress,
    #[error("Save slot {0} not found")]
    SlotNotFound(u32),
    #[error("Slot {slot} is reserved for auto-saves")]
    ReservedSlot { slot: u32 },
    #[error("Serialization failure for '{path}': {reason}")]
    SerializationFailure { path: PathBuf, reason: String },
    #[error("I/O failure during {operation} on '{path}': {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Component '{save_id}' could not contribute save data: {reason}")]
    ComponentContributionFailure { save_id: String, reason: String },
    #[error("Persistence coordinator is not initialized")]
    NotInitialized,
    #[error("Operation cancelled before completion")]
    Cancelled,
}

impl PersistenceError {
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn serialization(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::SerializationFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-friendly label used in notifications
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SaveInProgress => "save_in_progress",
            Self::LoadInProgress => "load_in_progress",
            Self::SlotNotFound(_) => "slot_not_found",
            Self::ReservedSlot { .. } => "reserved_slot",
            Self::SerializationFailure { .. } => "serialization_failure",
            Self::Io { .. } => "io_failure",
            Self::ComponentContributionFailure { .. } => "component_contribution_failure",
            Self::NotInitialized => "not_initialized",
            Self::Cancelled => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_wraps_into_core_error() {
        let err: CoreError = PersistenceError::SlotNotFound(7).into();
        assert_eq!(err.to_string(), "Save slot 7 not found");
    }

    #[test]
    fn test_persistence_error_kind_labels() {
        assert_eq!(PersistenceError::SaveInProgress.kind(), "save_in_progress");
        let io = PersistenceError::io(
            "write",
            "saves/SaveGame_0001.json",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        assert_eq!(io.kind(), "io_failure");
        assert!(io.to_string().contains("disk full"));
    }
}
