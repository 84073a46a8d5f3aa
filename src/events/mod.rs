//! # Event System
//!
//! Typed publish/subscribe for decoupled communication between components.
//!
//! - [`EventChannel<T>`]: named broadcast point with weakly held listeners
//! - [`EventBus`]: channel registry, frame cap, metrics and diagnostic log
//! - [`CoreChannels`]: lifecycle and persistence notifications raised by the core

pub mod bus;
pub mod channel;
pub mod log;
pub mod metrics;
pub mod types;

pub use bus::EventBus;
pub use channel::{
    AnyChannel, ChannelDescriptor, DispatchOutcome, EventChannel, EventListener, EventPayload,
    ListenerRegistration, RaiseMonitor,
};
pub use log::{EventLog, EventLogEntry};
pub use metrics::{BusMetrics, ChannelMetrics};
pub use types::{
    CoreChannels, EventOverflow, LoadNotification, PersistenceFailure, PersistenceOperation,
    SaveNotification, StateTransition,
};
