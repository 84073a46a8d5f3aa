//! # Managed Components
//!
//! The behavioral contract every orchestrated subsystem implements, plus the
//! registry the orchestrator owns.
//!
//! A component is identified by a stable kind key ([`ComponentKind::KIND`])
//! rather than by its runtime type. Optional behavior (ticking, pause/resume,
//! state-change observation) is declared through [`ComponentCapabilities`];
//! the orchestrator only invokes the hooks a component declares.
//!
//! ```rust
//! use chimera_core::component::{
//!     ComponentCapabilities, ComponentKind, CoreContext, ManagedComponent, TickContext,
//! };
//!
//! #[derive(Default)]
//! struct Weather {
//!     initialized: bool,
//!     hours: f64,
//! }
//!
//! impl ComponentKind for Weather {
//!     const KIND: &'static str = "weather";
//! }
//!
//! impl ManagedComponent for Weather {
//!     fn name(&self) -> &str {
//!         "Weather"
//!     }
//!
//!     fn is_initialized(&self) -> bool {
//!         self.initialized
//!     }
//!
//!     fn capabilities(&self) -> ComponentCapabilities {
//!         ComponentCapabilities::default().with_ticks()
//!     }
//!
//!     fn initialize(&mut self, _ctx: &CoreContext) -> anyhow::Result<()> {
//!         self.initialized = true;
//!         Ok(())
//!     }
//!
//!     fn shutdown(&mut self) -> anyhow::Result<()> {
//!         self.initialized = false;
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, tick: &TickContext) {
//!         self.hours += tick.delta_seconds() / 3600.0;
//!     }
//! }
//! ```

pub mod registry;

use crate::events::{AnyChannel, EventBus};
use crate::persistence::Saveable;
use crate::state_machine::RunState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub use registry::{ComponentHandle, ComponentRegistry, RegistrationOutcome};

/// Relative importance of a component.
///
/// Purely a classification: startup order is the explicitly configured order,
/// never derived from this value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ComponentPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl fmt::Display for ComponentPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Optional hooks a component opts into
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentCapabilities {
    /// Receives `update` on every active tick
    pub ticks: bool,
    /// Keeps receiving `update` while the orchestrator is paused
    pub ticks_while_paused: bool,
    /// Receives `on_pause`/`on_resume`
    pub pausable: bool,
    /// Receives `on_state_changed`
    pub observes_state: bool,
}

impl ComponentCapabilities {
    pub fn with_ticks(mut self) -> Self {
        self.ticks = true;
        self
    }

    pub fn with_ticks_while_paused(mut self) -> Self {
        self.ticks = true;
        self.ticks_while_paused = true;
        self
    }

    pub fn with_pause(mut self) -> Self {
        self.pausable = true;
        self
    }

    pub fn with_state_observer(mut self) -> Self {
        self.observes_state = true;
        self
    }
}

/// Per-tick information handed to `update`
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    pub frame: u64,
    pub delta: Duration,
    pub state: RunState,
    /// Simulation time is frozen for this tick
    pub paused: bool,
}

impl TickContext {
    pub fn delta_seconds(&self) -> f64 {
        self.delta.as_secs_f64()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Explicit context handed to components during initialization.
///
/// Replaces global lookups: everything a component needs from the core is
/// reachable from here.
#[derive(Clone)]
pub struct CoreContext {
    instance_id: Uuid,
    registry: ComponentRegistry,
    event_bus: EventBus,
    state: RunState,
}

impl CoreContext {
    pub fn new(
        instance_id: Uuid,
        registry: ComponentRegistry,
        event_bus: EventBus,
        state: RunState,
    ) -> Self {
        Self {
            instance_id,
            registry,
            event_bus,
            state,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn state(&self) -> RunState {
        self.state
    }
}

/// Stable registry key for a component kind
pub trait ComponentKind {
    const KIND: &'static str;
}

/// Contract for every orchestrator-managed subsystem.
///
/// `initialize` and `shutdown` must be idempotent. A failed `initialize`
/// leaves the component uninitialized; the orchestrator logs the failure and
/// carries on with the next component.
pub trait ManagedComponent: Send + 'static {
    /// Human-readable name used in logs
    fn name(&self) -> &str;

    fn priority(&self) -> ComponentPriority {
        ComponentPriority::Normal
    }

    fn is_initialized(&self) -> bool;

    /// Survives a domain reset (informational for host layers)
    fn persist_across_reset(&self) -> bool {
        false
    }

    fn capabilities(&self) -> ComponentCapabilities {
        ComponentCapabilities::default()
    }

    fn initialize(&mut self, ctx: &CoreContext) -> anyhow::Result<()>;

    fn shutdown(&mut self) -> anyhow::Result<()>;

    fn update(&mut self, _tick: &TickContext) {}

    fn on_pause(&mut self) {}

    fn on_resume(&mut self) {}

    fn on_state_changed(&mut self, _previous: RunState, _current: RunState) {}

    /// Channels owned by this component, registered with the bus at startup
    fn event_channels(&self) -> Vec<Arc<dyn AnyChannel>> {
        Vec::new()
    }

    /// Saveable capability, discovered by the persistence coordinator
    fn as_saveable(&mut self) -> Option<&mut dyn Saveable> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_builders() {
        let caps = ComponentCapabilities::default()
            .with_ticks_while_paused()
            .with_state_observer();
        assert!(caps.ticks);
        assert!(caps.ticks_while_paused);
        assert!(caps.observes_state);
        assert!(!caps.pausable);
    }

    #[test]
    fn test_priority_is_ordered_classification() {
        assert!(ComponentPriority::Critical > ComponentPriority::High);
        assert!(ComponentPriority::Low < ComponentPriority::Normal);
        assert_eq!(ComponentPriority::default(), ComponentPriority::Normal);
        assert_eq!(ComponentPriority::High.to_string(), "high");
    }

    #[test]
    fn test_tick_context_seconds() {
        let tick = TickContext {
            frame: 3,
            delta: Duration::from_millis(500),
            state: RunState::Running,
            paused: false,
        };
        assert!((tick.delta_seconds() - 0.5).abs() < f64::EPSILON);
        assert!(!tick.is_paused());
    }
}
