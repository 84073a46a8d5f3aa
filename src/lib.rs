#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Chimera Core
//!
//! Runtime core for real-time simulations: component lifecycle, typed event
//! channels and slot-based save/load.
//!
//! ## Overview
//!
//! A single [`LifecycleOrchestrator`] owns the global run-state and a
//! registry of managed components. The host drives it by calling `tick`
//! once per frame; startup, saves and loads are spread across ticks so the
//! host loop never blocks on them.
//!
//! ## Key Features
//!
//! - **Ordered Lifecycle**: Event bus first, configured order next, then
//!   registration order; reverse-order shutdown with per-component isolation
//! - **Typed Event Channels**: Weakly held listeners, per-channel listener
//!   caps and a per-frame raise cap with overflow notification
//! - **Save Slots**: Atomic JSON documents per slot, rotating auto-saves and
//!   recovery of interrupted writes
//! - **Diagnostics**: Per-channel metrics, a bounded event log and structured
//!   `tracing` output
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Lifecycle orchestrator, cooperative steps, bootstrap
//! - [`component`] - Component trait, capabilities and registry
//! - [`events`] - Event channels, the bus and its diagnostics
//! - [`persistence`] - Save documents, slots and the coordinator
//! - [`state_machine`] - Global run-state
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Tracing setup and operation log helpers
//!
//! ## Quick Start
//!
//! ```rust
//! use chimera_core::config::CoreConfig;
//! use chimera_core::orchestration::LifecycleOrchestrator;
//! use chimera_core::state_machine::RunState;
//! use std::time::Duration;
//!
//! let mut config = CoreConfig::default();
//! config.persistence.enabled = false;
//!
//! let mut orchestrator = LifecycleOrchestrator::new(config);
//! orchestrator.initialize_all();
//! assert_eq!(orchestrator.state(), RunState::Running);
//!
//! orchestrator.tick(Duration::from_millis(16));
//! orchestrator.shutdown_all();
//! assert_eq!(orchestrator.state(), RunState::Shutdown);
//! ```

pub mod component;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod orchestration;
pub mod persistence;
pub mod state_machine;

pub use component::{
    ComponentCapabilities, ComponentKind, ComponentPriority, ComponentRegistry, CoreContext,
    ManagedComponent, TickContext,
};
pub use config::{ConfigManager, CoreConfig};
pub use error::{CoreError, EventError, PersistenceError, Result};
pub use events::{EventBus, EventChannel};
pub use orchestration::{
    BootstrapConfig, CoreBootstrap, CoreSystemHandle, LifecycleOrchestrator, ShutdownReport,
    StartupReport,
};
pub use persistence::{ComponentPayload, PersistenceCoordinator, SaveSlotInfo, Saveable};
pub use state_machine::RunState;
