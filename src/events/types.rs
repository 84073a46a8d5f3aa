//! Payloads and channels the core raises on its own behalf.

use super::channel::{AnyChannel, EventChannel};
use crate::constants::channels;
use crate::state_machine::RunState;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Raised on `core.state_changed` after every effective transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    pub previous: RunState,
    pub current: RunState,
    pub frame: u64,
}

/// Raised on `core.save_started` and `core.save_completed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveNotification {
    pub slot: u32,
    pub description: String,
    pub is_auto_save: bool,
    /// Set once the file has been committed
    pub path: Option<PathBuf>,
}

/// Raised on `core.load_started` and `core.load_completed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadNotification {
    pub slot: u32,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceOperation {
    Save,
    Load,
}

/// Raised on `core.save_error` and `core.load_error`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceFailure {
    pub operation: PersistenceOperation,
    pub slot: Option<u32>,
    pub kind: String,
    pub message: String,
}

/// Raised on `core.event_overflow` the first time a frame hits the cap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOverflow {
    /// Channel whose raise was the first one dropped
    pub channel_id: String,
    pub frame: u64,
    pub max_events_per_frame: usize,
}

/// Built-in notification channels present on every bus
#[derive(Debug, Clone)]
pub struct CoreChannels {
    pub state_changed: Arc<EventChannel<StateTransition>>,
    pub save_started: Arc<EventChannel<SaveNotification>>,
    pub save_completed: Arc<EventChannel<SaveNotification>>,
    pub save_error: Arc<EventChannel<PersistenceFailure>>,
    pub load_started: Arc<EventChannel<LoadNotification>>,
    pub load_completed: Arc<EventChannel<LoadNotification>>,
    pub load_error: Arc<EventChannel<PersistenceFailure>>,
    pub event_overflow: Arc<EventChannel<EventOverflow>>,
}

impl CoreChannels {
    pub fn new(max_listeners: usize) -> Self {
        Self {
            state_changed: Arc::new(EventChannel::with_max_listeners(
                channels::STATE_CHANGED,
                max_listeners,
            )),
            save_started: Arc::new(EventChannel::with_max_listeners(
                channels::SAVE_STARTED,
                max_listeners,
            )),
            save_completed: Arc::new(EventChannel::with_max_listeners(
                channels::SAVE_COMPLETED,
                max_listeners,
            )),
            save_error: Arc::new(EventChannel::with_max_listeners(
                channels::SAVE_ERROR,
                max_listeners,
            )),
            load_started: Arc::new(EventChannel::with_max_listeners(
                channels::LOAD_STARTED,
                max_listeners,
            )),
            load_completed: Arc::new(EventChannel::with_max_listeners(
                channels::LOAD_COMPLETED,
                max_listeners,
            )),
            load_error: Arc::new(EventChannel::with_max_listeners(
                channels::LOAD_ERROR,
                max_listeners,
            )),
            event_overflow: Arc::new(EventChannel::with_max_listeners(
                channels::EVENT_OVERFLOW,
                max_listeners,
            )),
        }
    }

    pub fn all(&self) -> Vec<Arc<dyn AnyChannel>> {
        let all: [Arc<dyn AnyChannel>; 8] = [
            self.state_changed.clone(),
            self.save_started.clone(),
            self.save_completed.clone(),
            self.save_error.clone(),
            self.load_started.clone(),
            self.load_completed.clone(),
            self.load_error.clone(),
            self.event_overflow.clone(),
        ];
        all.to_vec()
    }

    pub fn is_core_channel(id: &str) -> bool {
        matches!(
            id,
            channels::STATE_CHANGED
                | channels::SAVE_STARTED
                | channels::SAVE_COMPLETED
                | channels::SAVE_ERROR
                | channels::LOAD_STARTED
                | channels::LOAD_COMPLETED
                | channels::LOAD_ERROR
                | channels::EVENT_OVERFLOW
        )
    }
}
