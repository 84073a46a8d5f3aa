//! # Orchestration
//!
//! Lifecycle control for the simulation core.
//!
//! ## Core Components
//!
//! - **LifecycleOrchestrator**: Owns the run-state and component registry,
//!   sequences startup/shutdown and fans ticks out to components
//! - **StepSequence**: Queue of steps drained one per tick, shared by
//!   startup and the persistence coordinator's save/load tasks
//! - **CoreBootstrap**: Loads configuration and drives the orchestrator from
//!   a tokio tick loop

pub mod bootstrap;
pub mod orchestrator;
pub mod sequence;

pub use bootstrap::{BootstrapConfig, CoreBootstrap, CoreSystemHandle, SystemStatus};
pub use orchestrator::{ComponentFailure, LifecycleOrchestrator, ShutdownReport, StartupReport};
pub use sequence::StepSequence;
