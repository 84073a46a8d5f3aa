#![allow(dead_code)]

//! Shared fixtures for integration tests: recording components, a saveable
//! garden and configuration helpers.

use anyhow::Context;
use chimera_core::component::{
    ComponentCapabilities, ComponentKind, CoreContext, ManagedComponent, TickContext,
};
use chimera_core::config::CoreConfig;
use chimera_core::events::{AnyChannel, EventChannel};
use chimera_core::persistence::{ComponentPayload, Saveable};
use chimera_core::state_machine::RunState;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tempfile::TempDir;

/// Ordered record of lifecycle calls across components
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// Journal entries starting with `prefix`, prefix stripped
pub fn entries_with(journal: &Journal, prefix: &str) -> Vec<String> {
    journal
        .lock()
        .iter()
        .filter_map(|entry| entry.strip_prefix(prefix).map(str::to_string))
        .collect()
}

/// Configuration without persistence
pub fn core_config() -> CoreConfig {
    let mut config = CoreConfig::default();
    config.persistence.enabled = false;
    config
}

/// Configuration saving into `dir`, auto-save off unless a test enables it
pub fn persistent_config(dir: &TempDir) -> CoreConfig {
    let mut config = CoreConfig::default();
    config.persistence.save_directory = dir.path().to_path_buf();
    config.persistence.auto_save_enabled = false;
    config.persistence.pretty_print = false;
    config
}

macro_rules! recording_component {
    ($name:ident, $kind:literal) => {
        pub struct $name {
            pub journal: Journal,
            pub initialized: bool,
            pub fail_initialize: bool,
            pub fail_shutdown: bool,
            pub updates: u64,
            pub paused_updates: u64,
            pub capabilities: ComponentCapabilities,
        }

        impl $name {
            pub fn new(journal: &Journal) -> Self {
                Self {
                    journal: Arc::clone(journal),
                    initialized: false,
                    fail_initialize: false,
                    fail_shutdown: false,
                    updates: 0,
                    paused_updates: 0,
                    capabilities: ComponentCapabilities::default()
                        .with_ticks()
                        .with_pause()
                        .with_state_observer(),
                }
            }

            pub fn failing_initialize(mut self) -> Self {
                self.fail_initialize = true;
                self
            }

            pub fn failing_shutdown(mut self) -> Self {
                self.fail_shutdown = true;
                self
            }

            pub fn with_capabilities(mut self, capabilities: ComponentCapabilities) -> Self {
                self.capabilities = capabilities;
                self
            }

            fn record(&self, entry: String) {
                self.journal.lock().push(entry);
            }
        }

        impl ComponentKind for $name {
            const KIND: &'static str = $kind;
        }

        impl ManagedComponent for $name {
            fn name(&self) -> &str {
                stringify!($name)
            }

            fn is_initialized(&self) -> bool {
                self.initialized
            }

            fn capabilities(&self) -> ComponentCapabilities {
                self.capabilities
            }

            fn initialize(&mut self, _ctx: &CoreContext) -> anyhow::Result<()> {
                if self.fail_initialize {
                    anyhow::bail!("{} refused to start", $kind);
                }
                self.initialized = true;
                self.record(format!("init:{}", $kind));
                Ok(())
            }

            fn shutdown(&mut self) -> anyhow::Result<()> {
                self.record(format!("shutdown:{}", $kind));
                self.initialized = false;
                if self.fail_shutdown {
                    anyhow::bail!("{} failed to release resources", $kind);
                }
                Ok(())
            }

            fn update(&mut self, tick: &TickContext) {
                self.updates += 1;
                if tick.is_paused() {
                    self.paused_updates += 1;
                }
            }

            fn on_pause(&mut self) {
                self.record(format!("pause:{}", $kind));
            }

            fn on_resume(&mut self) {
                self.record(format!("resume:{}", $kind));
            }

            fn on_state_changed(&mut self, _previous: RunState, current: RunState) {
                self.record(format!("state:{}:{}", $kind, current));
            }
        }
    };
}

recording_component!(Alpha, "alpha");
recording_component!(Beta, "beta");
recording_component!(Gamma, "gamma");

/// Payload raised on the weather channel
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherChanged {
    pub condition: String,
    pub temperature_c: f32,
}

/// Component owning an event channel the bus discovers at startup
pub struct Weather {
    pub channel: Arc<EventChannel<WeatherChanged>>,
    initialized: bool,
}

impl Weather {
    pub const CHANNEL_ID: &'static str = "weather.changed";

    pub fn new() -> Self {
        Self {
            channel: Arc::new(EventChannel::new(Self::CHANNEL_ID)),
            initialized: false,
        }
    }
}

impl ComponentKind for Weather {
    const KIND: &'static str = "weather";
}

impl ManagedComponent for Weather {
    fn name(&self) -> &str {
        "Weather"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn initialize(&mut self, _ctx: &CoreContext) -> anyhow::Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.initialized = false;
        Ok(())
    }

    fn event_channels(&self) -> Vec<Arc<dyn AnyChannel>> {
        vec![self.channel.clone()]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GardenState {
    pub plants: Vec<String>,
    pub water_level: u32,
}

/// Saveable component stored under `plantData`
#[derive(Default)]
pub struct Garden {
    pub state: GardenState,
    pub reject_loads: bool,
    initialized: bool,
}

impl Garden {
    pub const SAVE_ID: &'static str = "plantData";

    pub fn with_plants(count: usize) -> Self {
        Self {
            state: GardenState {
                plants: (0..count).map(|i| format!("fern-{i}")).collect(),
                water_level: 40,
            },
            ..Self::default()
        }
    }
}

impl ComponentKind for Garden {
    const KIND: &'static str = "garden";
}

impl ManagedComponent for Garden {
    fn name(&self) -> &str {
        "Garden"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn initialize(&mut self, _ctx: &CoreContext) -> anyhow::Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.initialized = false;
        Ok(())
    }

    fn as_saveable(&mut self) -> Option<&mut dyn Saveable> {
        Some(self)
    }
}

impl Saveable for Garden {
    fn save_id(&self) -> &str {
        Self::SAVE_ID
    }

    fn save_data(&self) -> anyhow::Result<ComponentPayload> {
        Ok(ComponentPayload::from_state(1, &self.state)?)
    }

    fn load_save_data(&mut self, payload: &ComponentPayload) -> anyhow::Result<()> {
        if self.reject_loads {
            anyhow::bail!("garden is locked");
        }
        self.state = payload.to_state().context("decoding garden state")?;
        Ok(())
    }
}

/// Saveable living outside the orchestrator
pub struct Scoreboard {
    pub score: u64,
}

impl Saveable for Scoreboard {
    fn save_id(&self) -> &str {
        "scoreboard"
    }

    fn save_data(&self) -> anyhow::Result<ComponentPayload> {
        Ok(ComponentPayload::new(
            1,
            serde_json::json!({ "score": self.score }),
        ))
    }

    fn load_save_data(&mut self, payload: &ComponentPayload) -> anyhow::Result<()> {
        self.score = payload.data["score"].as_u64().context("score missing")?;
        Ok(())
    }
}
