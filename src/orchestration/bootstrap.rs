//! # Core Bootstrap
//!
//! Brings a [`LifecycleOrchestrator`] up inside a tokio runtime and drives it
//! from a fixed-interval tick loop.
//!
//! ## Key Features
//!
//! - **Environment-Aware Configuration**: Loads `CoreConfig` through
//!   [`ConfigManager`] with environment detection or an explicit override
//! - **Host Registration Hook**: Components are registered by a closure
//!   before the first tick
//! - **Lifecycle Management**: Start/stop/status through [`CoreSystemHandle`]
//! - **Graceful Shutdown**: A stop signal runs `shutdown_all` on the tick
//!   task and hands back the [`ShutdownReport`]

use super::orchestrator::{LifecycleOrchestrator, ShutdownReport};
use crate::config::{ConfigManager, CoreConfig};
use crate::error::Result;
use crate::logging;
use crate::state_machine::RunState;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Handle to a running core
pub struct CoreSystemHandle {
    /// The orchestrator driven by the tick task
    pub orchestrator: Arc<Mutex<LifecycleOrchestrator>>,
    /// Shutdown signal sender (Some when running, None when stopped)
    pub shutdown_sender: Option<oneshot::Sender<()>>,
    /// Runtime handle for async operations
    pub runtime_handle: tokio::runtime::Handle,
    /// System configuration manager
    pub config_manager: Arc<ConfigManager>,
    join_handle: Option<JoinHandle<ShutdownReport>>,
}

impl CoreSystemHandle {
    fn new(
        orchestrator: Arc<Mutex<LifecycleOrchestrator>>,
        shutdown_sender: oneshot::Sender<()>,
        join_handle: JoinHandle<ShutdownReport>,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            orchestrator,
            shutdown_sender: Some(shutdown_sender),
            runtime_handle: tokio::runtime::Handle::current(),
            config_manager,
            join_handle: Some(join_handle),
        }
    }

    /// Check if the tick loop is still expected to run
    pub fn is_running(&self) -> bool {
        self.shutdown_sender.is_some()
            && self
                .join_handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the tick loop to shut the core down
    pub fn stop(&mut self) {
        match self.shutdown_sender.take() {
            Some(sender) => {
                if sender.send(()).is_err() {
                    warn!("Tick loop already exited before shutdown signal");
                } else {
                    info!("🛑 Core system shutdown requested");
                }
            }
            None => warn!("Core system already stopped"),
        }
    }

    /// Stop and wait for the tick task to finish shutting components down
    pub async fn stop_and_wait(&mut self) -> Option<ShutdownReport> {
        self.stop();
        let join_handle = self.join_handle.take()?;
        match join_handle.await {
            Ok(report) => Some(report),
            Err(join_error) => {
                error!(error = %join_error, "❌ Tick loop task failed");
                None
            }
        }
    }

    pub fn status(&self) -> SystemStatus {
        let orchestrator = self.orchestrator.lock();
        SystemStatus {
            running: self.is_running(),
            environment: self.config_manager.environment().to_string(),
            instance_id: orchestrator.instance_id(),
            state: orchestrator.state(),
            frame: orchestrator.frame(),
            registered_components: orchestrator.registry().len(),
            tick_interval_ms: self.config_manager.config().lifecycle.tick_interval_ms,
        }
    }
}

/// System status information
#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub running: bool,
    pub environment: String,
    pub instance_id: Uuid,
    pub state: RunState,
    pub frame: u64,
    pub registered_components: usize,
    pub tick_interval_ms: u64,
}

/// Bootstrap configuration for the core system
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Begin startup on the first tick (vs manual `start()`)
    pub auto_start: bool,
    /// Install the global tracing subscriber from `[logging]`
    pub init_logging: bool,
    /// Custom configuration directory (None = auto-detect)
    pub config_directory: Option<PathBuf>,
    /// Environment override (None = auto-detect)
    pub environment_override: Option<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            init_logging: true,
            config_directory: None,
            environment_override: None,
        }
    }
}

impl BootstrapConfig {
    /// Reuse the directory and environment a manager was loaded with
    pub fn from_config_manager(config_manager: &ConfigManager) -> Self {
        Self {
            auto_start: true,
            init_logging: true,
            config_directory: Some(config_manager.config_directory().to_path_buf()),
            environment_override: Some(config_manager.environment().to_string()),
        }
    }

    pub fn for_testing() -> Self {
        Self {
            auto_start: true,
            init_logging: false,
            config_directory: None,
            environment_override: Some("test".to_string()),
        }
    }
}

/// Unified bootstrap for embedding and standalone hosts
pub struct CoreBootstrap;

impl CoreBootstrap {
    /// Load configuration, let the host register components, and start the
    /// tick loop
    pub async fn bootstrap<F>(config: BootstrapConfig, configure: F) -> Result<CoreSystemHandle>
    where
        F: FnOnce(&mut LifecycleOrchestrator),
    {
        info!("🚀 BOOTSTRAP: Starting core system bootstrap");

        let config_manager = match (&config.config_directory, &config.environment_override) {
            (dir, Some(environment)) => {
                ConfigManager::load_from_directory_with_env(dir.clone(), environment)?
            }
            (Some(dir), None) => ConfigManager::load_from_directory(Some(dir.clone()))?,
            (None, None) => ConfigManager::load()?,
        };

        Self::bootstrap_with_manager(config_manager, &config, configure).await
    }

    /// Bootstrap from an already-built configuration
    pub async fn bootstrap_with_config<F>(
        core_config: CoreConfig,
        config: BootstrapConfig,
        configure: F,
    ) -> Result<CoreSystemHandle>
    where
        F: FnOnce(&mut LifecycleOrchestrator),
    {
        let environment = config
            .environment_override
            .clone()
            .unwrap_or_else(ConfigManager::detect_environment);
        let config_manager = ConfigManager::from_config(core_config, &environment)?;
        Self::bootstrap_with_manager(config_manager, &config, configure).await
    }

    async fn bootstrap_with_manager<F>(
        config_manager: Arc<ConfigManager>,
        config: &BootstrapConfig,
        configure: F,
    ) -> Result<CoreSystemHandle>
    where
        F: FnOnce(&mut LifecycleOrchestrator),
    {
        if config.init_logging {
            logging::init_with_config(&config_manager.config().logging);
        }

        info!(
            environment = %config_manager.environment(),
            "✅ BOOTSTRAP: Configuration loaded"
        );

        let mut orchestrator = LifecycleOrchestrator::new(config_manager.config().clone());
        configure(&mut orchestrator);
        if config.auto_start {
            orchestrator.start();
        }

        let tick_interval = config_manager.config().lifecycle.tick_interval();
        let orchestrator = Arc::new(Mutex::new(orchestrator));
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let join_handle = tokio::spawn(run_tick_loop(
            Arc::clone(&orchestrator),
            tick_interval,
            shutdown_receiver,
        ));

        info!(
            tick_interval_ms = tick_interval.as_millis() as u64,
            auto_start = config.auto_start,
            "🎉 BOOTSTRAP: Core system bootstrap completed"
        );

        Ok(CoreSystemHandle::new(
            orchestrator,
            shutdown_sender,
            join_handle,
            config_manager,
        ))
    }

    /// Standalone host with auto-detected configuration
    pub async fn bootstrap_standalone() -> Result<CoreSystemHandle> {
        Self::bootstrap(BootstrapConfig::default(), |_| {}).await
    }

    /// Test host: `test` environment, logging left to the test harness
    pub async fn bootstrap_testing<F>(configure: F) -> Result<CoreSystemHandle>
    where
        F: FnOnce(&mut LifecycleOrchestrator),
    {
        Self::bootstrap(BootstrapConfig::for_testing(), configure).await
    }
}

async fn run_tick_loop(
    orchestrator: Arc<Mutex<LifecycleOrchestrator>>,
    tick_interval: Duration,
    mut shutdown_receiver: oneshot::Receiver<()>,
) -> ShutdownReport {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = Instant::now();

    loop {
        tokio::select! {
            _ = &mut shutdown_receiver => {
                info!("🛑 BOOTSTRAP: Shutdown signal received");
                break;
            }
            now = interval.tick() => {
                let delta = now.saturating_duration_since(last_tick);
                last_tick = now;

                let mut orchestrator = orchestrator.lock();
                orchestrator.tick(delta);
                if orchestrator.state().is_terminal() {
                    info!("Orchestrator shut down by host - leaving tick loop");
                    return ShutdownReport::default();
                }
            }
        }
    }

    orchestrator.lock().shutdown_all()
}
