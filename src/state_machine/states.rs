use serde::{Deserialize, Serialize};
use std::fmt;

/// Global run-state owned by the lifecycle orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Initial state before the startup sequence begins
    #[default]
    Uninitialized,
    /// Startup sequence is running
    Initializing,
    /// Every component has been given its initialization attempt
    Running,
    /// Simulation updates are suspended
    Paused,
    /// A load operation is in flight
    Loading,
    /// A save operation is in flight
    Saving,
    /// The host reported an unrecoverable condition
    Error,
    /// Terminal state, components have been shut down
    Shutdown,
}

impl RunState {
    /// Check if this is the terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Shutdown)
    }

    /// Check if this is one of the transient persistence sub-states
    pub fn is_persistence_state(&self) -> bool {
        matches!(self, Self::Loading | Self::Saving)
    }

    /// Check if components should receive simulation ticks
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Loading | Self::Saving)
    }

    /// Check if startup has finished and shutdown has not happened
    pub fn is_started(&self) -> bool {
        !matches!(self, Self::Uninitialized | Self::Initializing | Self::Shutdown)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Loading => write!(f, "loading"),
            Self::Saving => write!(f, "saving"),
            Self::Error => write!(f, "error"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

impl std::str::FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uninitialized" => Ok(Self::Uninitialized),
            "initializing" => Ok(Self::Initializing),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "loading" => Ok(Self::Loading),
            "saving" => Ok(Self::Saving),
            "error" => Ok(Self::Error),
            "shutdown" => Ok(Self::Shutdown),
            _ => Err(format!("Invalid run state: {s}")),
        }
    }
}
