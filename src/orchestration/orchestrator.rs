//! # Lifecycle Orchestrator
//!
//! Owns the global run-state and the component registry, drives startup and
//! shutdown, fans ticks out to components and fronts the persistence
//! coordinator.
//!
//! ## Startup
//!
//! The event bus initializes first, then the kinds listed in
//! `lifecycle.initialization_order`, then every other registered component
//! in registration order. A component failing to initialize is logged and
//! skipped; the orchestrator still reaches `Running`.
//!
//! [`LifecycleOrchestrator::start`] runs startup cooperatively, one
//! component per [`tick`](LifecycleOrchestrator::tick).
//! [`LifecycleOrchestrator::initialize_all`] drains it synchronously.
//!
//! ## Shutdown
//!
//! Components shut down in reverse registration order. Failures are logged
//! and do not stop the sequence. `Shutdown` is terminal.

use super::sequence::StepSequence;
use crate::component::{
    ComponentCapabilities, ComponentKind, ComponentRegistry, CoreContext, ManagedComponent,
    TickContext,
};
use crate::config::CoreConfig;
use crate::constants;
use crate::error::{CoreError, PersistenceError, Result};
use crate::events::{EventBus, StateTransition};
use crate::logging::{log_error, log_lifecycle_operation};
use crate::persistence::{
    LoadReport, PersistenceActivity, PersistenceCoordinator, PersistenceResult, SaveSlotInfo,
};
use crate::state_machine::RunState;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
enum StartupStep {
    Initialize(String),
    EnterRunning,
}

/// A component that failed a lifecycle call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentFailure {
    pub component: String,
    pub reason: String,
}

/// Outcome of the startup sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupReport {
    pub initialized: Vec<String>,
    pub already_initialized: Vec<String>,
    pub failed: Vec<ComponentFailure>,
}

impl StartupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of the shutdown sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    pub shut_down: Vec<String>,
    pub failed: Vec<ComponentFailure>,
}

pub struct LifecycleOrchestrator {
    instance_id: Uuid,
    config: CoreConfig,
    state: RunState,
    /// State to return to once a save/load finishes
    resume_state: Option<RunState>,
    registry: ComponentRegistry,
    event_bus: EventBus,
    startup: Option<StepSequence<StartupStep>>,
    startup_report: StartupReport,
    frame: u64,
    last_error: Option<String>,
}

impl LifecycleOrchestrator {
    /// Build an orchestrator with the event bus (and, when enabled, the
    /// persistence coordinator) already registered
    pub fn new(config: CoreConfig) -> Self {
        let instance_id = Uuid::new_v4();
        let registry = ComponentRegistry::new();
        let event_bus = EventBus::new(config.events.clone());
        registry.register_shared(Arc::new(Mutex::new(event_bus.clone())));
        if config.persistence.enabled {
            registry.register(PersistenceCoordinator::new(config.persistence.clone()));
        }

        info!(
            instance_id = %instance_id,
            persistence = config.persistence.enabled,
            "🚀 LIFECYCLE: Orchestrator created"
        );

        Self {
            instance_id,
            config,
            state: RunState::Uninitialized,
            resume_state: None,
            registry,
            event_bus,
            startup: None,
            startup_report: StartupReport::default(),
            frame: 0,
            last_error: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CoreConfig::default())
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn startup_report(&self) -> &StartupReport {
        &self.startup_report
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_starting(&self) -> bool {
        self.startup.is_some()
    }

    // ---------------------------------------------------------------------
    // Registry
    // ---------------------------------------------------------------------

    /// Register a component. Components registered after startup are not
    /// initialized automatically.
    pub fn register_component<T>(&self, component: T) -> Arc<Mutex<T>>
    where
        T: ManagedComponent + ComponentKind,
    {
        if self.state.is_terminal() {
            warn!(component = T::KIND, "Registering component after shutdown");
        }
        self.registry.register(component)
    }

    pub fn register_shared<T>(&self, component: Arc<Mutex<T>>)
    where
        T: ManagedComponent + ComponentKind,
    {
        self.registry.register_shared(component);
    }

    /// Exact-kind lookup; never constructs
    pub fn get_component<T>(&self) -> Option<Arc<Mutex<T>>>
    where
        T: ManagedComponent + ComponentKind,
    {
        self.registry.get::<T>()
    }

    pub fn set_initialization_order(&mut self, order: Vec<String>) {
        self.config.lifecycle.initialization_order = order;
    }

    /// Effective startup order for the currently registered components
    pub fn initialization_order(&self) -> Vec<String> {
        let registered = self.registry.kinds();
        for kind in &self.config.lifecycle.initialization_order {
            if !registered.contains(kind) {
                warn!(component = %kind, "Initialization order names an unregistered component");
            }
        }

        let candidates = std::iter::once(constants::components::EVENT_BUS.to_string())
            .chain(self.config.lifecycle.initialization_order.iter().cloned())
            .chain(registered.iter().cloned());

        let mut order: Vec<String> = Vec::with_capacity(registered.len());
        for kind in candidates {
            if registered.contains(&kind) && !order.contains(&kind) {
                order.push(kind);
            }
        }
        order
    }

    fn core_context(&self) -> CoreContext {
        CoreContext::new(
            self.instance_id,
            self.registry.clone(),
            self.event_bus.clone(),
            self.state,
        )
    }

    // ---------------------------------------------------------------------
    // Startup
    // ---------------------------------------------------------------------

    /// Begin cooperative startup. Returns false if startup already happened.
    pub fn start(&mut self) -> bool {
        if self.state != RunState::Uninitialized || self.startup.is_some() {
            warn!(state = %self.state, "Startup already performed - ignoring");
            return false;
        }

        let order = self.initialization_order();
        log_lifecycle_operation(
            "startup",
            None,
            "initializing",
            Some(&format!("order: {}", order.join(", "))),
        );

        self.startup_report = StartupReport::default();
        self.startup = Some(StepSequence::new(
            order
                .into_iter()
                .map(StartupStep::Initialize)
                .chain(std::iter::once(StartupStep::EnterRunning)),
        ));
        self.change_state(RunState::Initializing);
        true
    }

    /// Run the whole startup sequence now. Calling it again is a logged no-op.
    pub fn initialize_all(&mut self) -> &StartupReport {
        if self.startup.is_none() && !self.start() {
            return &self.startup_report;
        }
        while let Some(step) = self.startup.as_mut().and_then(StepSequence::next_step) {
            self.run_startup_step(step);
        }
        &self.startup_report
    }

    fn run_startup_step(&mut self, step: StartupStep) {
        match step {
            StartupStep::Initialize(kind) => self.initialize_component(&kind),
            StartupStep::EnterRunning => {
                self.startup = None;
                log_lifecycle_operation(
                    "startup",
                    None,
                    "complete",
                    Some(&format!(
                        "{} initialized, {} already initialized, {} failed",
                        self.startup_report.initialized.len(),
                        self.startup_report.already_initialized.len(),
                        self.startup_report.failed.len()
                    )),
                );
                if self.state == RunState::Initializing {
                    self.change_state(RunState::Running);
                }
            }
        }
    }

    fn initialize_component(&mut self, kind: &str) {
        let Some(handle) = self.registry.get_handle(kind) else {
            warn!(component = %kind, "Component removed before its initialization step");
            return;
        };
        let ctx = self.core_context();
        let mut component = handle.lock();

        if component.is_initialized() {
            debug!(component = %kind, "Already initialized - skipping");
            self.startup_report
                .already_initialized
                .push(kind.to_string());
            return;
        }

        let started = Instant::now();
        match component.initialize(&ctx) {
            Ok(()) => {
                log_lifecycle_operation(
                    "initialize",
                    Some(kind),
                    "initialized",
                    Some(&format!(
                        "{} ({} ms, priority {})",
                        component.name(),
                        started.elapsed().as_millis(),
                        component.priority()
                    )),
                );
                self.startup_report.initialized.push(kind.to_string());
            }
            Err(error) => {
                let failure = CoreError::InitializationFailure {
                    component: kind.to_string(),
                    reason: format!("{error:#}"),
                };
                log_error(kind, "initialize", &failure.to_string(), Some(component.name()));
                self.startup_report.failed.push(ComponentFailure {
                    component: kind.to_string(),
                    reason: format!("{error:#}"),
                });
            }
        }
    }

    // ---------------------------------------------------------------------
    // Ticking
    // ---------------------------------------------------------------------

    /// Advance one host tick
    pub fn tick(&mut self, delta: Duration) {
        if self.state.is_terminal() {
            return;
        }
        self.frame += 1;
        self.event_bus.begin_frame(self.frame);

        if let Some(step) = self.startup.as_mut().and_then(StepSequence::next_step) {
            self.run_startup_step(step);
            return;
        }
        if !self.state.is_started() {
            return;
        }

        self.update_components(delta);
        self.sync_persistence_state();
    }

    /// Simulation time is frozen: paused, errored, or a save/load started
    /// while paused
    fn simulation_paused(&self) -> bool {
        match self.state {
            RunState::Running => false,
            RunState::Saving | RunState::Loading => self.resume_state == Some(RunState::Paused),
            _ => true,
        }
    }

    fn update_components(&mut self, delta: Duration) {
        let tick = TickContext {
            frame: self.frame,
            delta,
            state: self.state,
            paused: self.simulation_paused(),
        };
        for (_, handle) in self.registry.handles() {
            let mut component = handle.lock();
            if !component.is_initialized() {
                continue;
            }
            let ComponentCapabilities {
                ticks,
                ticks_while_paused,
                ..
            } = component.capabilities();
            if !ticks || (tick.paused && !ticks_while_paused) {
                continue;
            }
            component.update(&tick);
        }
    }

    /// Mirror persistence activity into the Saving/Loading sub-states
    fn sync_persistence_state(&mut self) {
        let Some(persistence) = self.registry.get::<PersistenceCoordinator>() else {
            return;
        };
        let activity = persistence.lock().activity();

        let target = match activity {
            PersistenceActivity::Idle => {
                if self.state.is_persistence_state() {
                    let resume = self.resume_state.take().unwrap_or(RunState::Running);
                    self.change_state(resume);
                }
                return;
            }
            PersistenceActivity::Saving => RunState::Saving,
            PersistenceActivity::Loading => RunState::Loading,
        };

        match self.state {
            state if state == target => {}
            RunState::Running | RunState::Paused => {
                self.resume_state = Some(self.state);
                self.change_state(target);
            }
            RunState::Saving | RunState::Loading => {
                self.change_state(target);
            }
            _ => {}
        }
    }

    // ---------------------------------------------------------------------
    // State machine
    // ---------------------------------------------------------------------

    /// Transition to `new_state`, notifying state observers and raising
    /// `core.state_changed`. Returns false for no-op or refused transitions.
    pub fn change_state(&mut self, new_state: RunState) -> bool {
        if new_state == self.state {
            return false;
        }
        if self.state.is_terminal() {
            let refused = CoreError::InvalidStateTransition {
                from: self.state.to_string(),
                to: new_state.to_string(),
            };
            warn!(error = %refused, "Ignoring transition out of terminal state");
            return false;
        }

        let previous = self.state;
        self.state = new_state;
        log_lifecycle_operation(
            "state_change",
            None,
            &new_state.to_string(),
            Some(&format!("{previous} -> {new_state}")),
        );

        for (_, handle) in self.registry.handles() {
            let mut component = handle.lock();
            if component.capabilities().observes_state {
                component.on_state_changed(previous, new_state);
            }
        }

        self.event_bus
            .core_channels()
            .state_changed
            .raise(StateTransition {
                previous,
                current: new_state,
                frame: self.frame,
            });
        true
    }

    fn broadcast_pause(&self, paused: bool) {
        for (_, handle) in self.registry.handles() {
            let mut component = handle.lock();
            if !component.capabilities().pausable {
                continue;
            }
            if paused {
                component.on_pause();
            } else {
                component.on_resume();
            }
        }
    }

    /// Pause from `Running`. Idempotent; ignored from other states.
    pub fn pause(&mut self) -> bool {
        match self.state {
            RunState::Paused => {
                debug!("Already paused");
                false
            }
            RunState::Running => {
                self.broadcast_pause(true);
                self.change_state(RunState::Paused)
            }
            RunState::Saving | RunState::Loading
                if self.resume_state == Some(RunState::Running) =>
            {
                self.broadcast_pause(true);
                self.resume_state = Some(RunState::Paused);
                true
            }
            state => {
                warn!(state = %state, "Pause ignored in current state");
                false
            }
        }
    }

    /// Resume from `Paused`. Idempotent; ignored from other states.
    pub fn resume(&mut self) -> bool {
        match self.state {
            RunState::Running => {
                debug!("Already running");
                false
            }
            RunState::Paused => {
                self.broadcast_pause(false);
                self.change_state(RunState::Running)
            }
            RunState::Saving | RunState::Loading
                if self.resume_state == Some(RunState::Paused) =>
            {
                self.broadcast_pause(false);
                self.resume_state = Some(RunState::Running);
                true
            }
            state => {
                warn!(state = %state, "Resume ignored in current state");
                false
            }
        }
    }

    /// Map a host suspend/focus signal onto pause/resume
    pub fn handle_suspend(&mut self, suspended: bool) -> bool {
        if !self.config.lifecycle.pause_on_suspend {
            return false;
        }
        if suspended {
            self.pause()
        } else {
            self.resume()
        }
    }

    /// Enter the `Error` state
    pub fn report_error(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        log_error("lifecycle_orchestrator", "report_error", &reason, None);
        self.last_error = Some(reason);
        self.change_state(RunState::Error);
    }

    /// Leave the `Error` state back to `Running`
    pub fn recover(&mut self) -> bool {
        if self.state != RunState::Error {
            return false;
        }
        self.last_error = None;
        self.change_state(RunState::Running)
    }

    // ---------------------------------------------------------------------
    // Shutdown
    // ---------------------------------------------------------------------

    /// Shut every initialized component down in reverse registration order
    /// and clear the registry. Calling it again is a logged no-op.
    pub fn shutdown_all(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        if self.state == RunState::Shutdown {
            warn!("Shutdown already performed - ignoring");
            return report;
        }

        if let Some(mut startup) = self.startup.take() {
            startup.cancel();
            warn!(
                completed_steps = startup.step_index(),
                "Startup interrupted by shutdown"
            );
        }
        self.change_state(RunState::Shutdown);

        for (kind, handle) in self.registry.handles().into_iter().rev() {
            let mut component = handle.lock();
            if !component.is_initialized() {
                continue;
            }
            match component.shutdown() {
                Ok(()) => {
                    debug!(component = %kind, "Component shut down");
                    report.shut_down.push(kind);
                }
                Err(error) => {
                    let failure = CoreError::ShutdownFailure {
                        component: kind.clone(),
                        reason: format!("{error:#}"),
                    };
                    log_error(&kind, "shutdown", &failure.to_string(), Some(component.name()));
                    report.failed.push(ComponentFailure {
                        component: kind,
                        reason: format!("{error:#}"),
                    });
                }
            }
        }

        self.registry.clear();
        log_lifecycle_operation(
            "shutdown",
            None,
            "shutdown",
            Some(&format!(
                "{} shut down, {} failed",
                report.shut_down.len(),
                report.failed.len()
            )),
        );
        report
    }

    // ---------------------------------------------------------------------
    // Persistence facade
    // ---------------------------------------------------------------------

    pub fn persistence(&self) -> Result<Arc<Mutex<PersistenceCoordinator>>> {
        self.registry
            .get::<PersistenceCoordinator>()
            .ok_or_else(|| CoreError::ComponentNotFound(PersistenceCoordinator::KIND.to_string()))
    }

    /// Begin a cooperative save; progresses on subsequent ticks
    pub fn save_game(&mut self, slot: u32, description: impl Into<String>) -> Result<()> {
        let persistence = self.persistence()?;
        persistence.lock().save_game(slot, description)?;
        self.sync_persistence_state();
        Ok(())
    }

    /// Begin a cooperative auto-save, returning the rotated slot
    pub fn auto_save(&mut self) -> Result<u32> {
        let persistence = self.persistence()?;
        let slot = persistence.lock().auto_save()?;
        self.sync_persistence_state();
        Ok(slot)
    }

    /// Begin a cooperative load; progresses on subsequent ticks
    pub fn load_game(&mut self, slot: u32) -> Result<()> {
        let persistence = self.persistence()?;
        persistence.lock().load_game(slot)?;
        self.sync_persistence_state();
        Ok(())
    }

    /// Save and wait for completion
    pub fn save_game_now(
        &mut self,
        slot: u32,
        description: impl Into<String>,
    ) -> Result<SaveSlotInfo> {
        let persistence = self.persistence()?;
        persistence.lock().save_game(slot, description)?;
        self.sync_persistence_state();
        let result = Self::drive(&persistence, PersistenceCoordinator::take_save_result);
        self.sync_persistence_state();
        Ok(result?)
    }

    /// Auto-save and wait for completion
    pub fn auto_save_now(&mut self) -> Result<SaveSlotInfo> {
        let persistence = self.persistence()?;
        persistence.lock().auto_save()?;
        self.sync_persistence_state();
        let result = Self::drive(&persistence, PersistenceCoordinator::take_save_result);
        self.sync_persistence_state();
        Ok(result?)
    }

    /// Load and wait for completion
    pub fn load_game_now(&mut self, slot: u32) -> Result<LoadReport> {
        let persistence = self.persistence()?;
        persistence.lock().load_game(slot)?;
        self.sync_persistence_state();
        let result = Self::drive(&persistence, PersistenceCoordinator::take_load_result);
        self.sync_persistence_state();
        Ok(result?)
    }

    fn drive<R>(
        persistence: &Arc<Mutex<PersistenceCoordinator>>,
        take: impl Fn(&mut PersistenceCoordinator) -> Option<PersistenceResult<R>>,
    ) -> PersistenceResult<R> {
        let mut coordinator = persistence.lock();
        while coordinator.advance() {}
        take(&mut coordinator).unwrap_or(Err(PersistenceError::Cancelled))
    }

    pub fn get_save_slots(&self) -> Result<Vec<SaveSlotInfo>> {
        Ok(self.persistence()?.lock().get_save_slots())
    }

    pub fn delete_save_slot(&mut self, slot: u32) -> Result<()> {
        self.persistence()?.lock().delete_save_slot(slot)?;
        Ok(())
    }

    pub fn latest_save(&self) -> Result<Option<SaveSlotInfo>> {
        Ok(self.persistence()?.lock().latest_save())
    }
}

impl std::fmt::Debug for LifecycleOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleOrchestrator")
            .field("instance_id", &self.instance_id)
            .field("state", &self.state)
            .field("frame", &self.frame)
            .field("components", &self.registry.kinds())
            .finish()
    }
}
