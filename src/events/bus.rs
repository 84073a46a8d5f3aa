//! # Event Bus
//!
//! Process-wide registry of typed event channels with frame-level rate
//! limiting, per-channel metrics and a bounded diagnostic log.
//!
//! ## Overview
//!
//! The bus is a cheap-clone handle around shared state. Every channel it
//! tracks reports back through a [`RaiseMonitor`] hook, which lets the bus
//! enforce the per-frame cap and count raises without channels knowing about
//! the bus.
//!
//! ## Key Features
//!
//! - **Channel registry** keyed by id, with a secondary index by payload type
//! - **Frame cap**: once `max_events_per_frame` raises were admitted in the
//!   current tick, further raises are dropped with a warning and a single
//!   `core.event_overflow` notification
//! - **Metrics** per channel plus bus-wide totals, with events-per-minute
//!   computed over a rolling window of simulated time
//! - **Diagnostic log** ring buffer of recent raises
//!
//! ## Usage
//!
//! ```rust
//! use chimera_core::config::EventsConfig;
//! use chimera_core::events::EventBus;
//! use std::sync::Arc;
//!
//! let bus = EventBus::new(EventsConfig::default());
//! let harvests = bus.create_channel::<u32>("garden.harvest").unwrap();
//!
//! let listener = Arc::new(|yield_grams: &u32| println!("harvested {yield_grams}g"));
//! harvests.register_listener(&listener);
//!
//! bus.begin_frame(1);
//! bus.raise("garden.harvest", 250u32).unwrap();
//! assert_eq!(bus.get_channel_metrics("garden.harvest").unwrap().total_raised, 1);
//! ```

use super::channel::{
    AnyChannel, ChannelDescriptor, DispatchOutcome, EventChannel, EventPayload, RaiseMonitor,
};
use super::log::{EventLog, EventLogEntry};
use super::metrics::{per_minute, BusMetrics, ChannelCounters, ChannelMetrics};
use super::types::{CoreChannels, EventOverflow};
use crate::component::{
    ComponentCapabilities, ComponentKind, ComponentPriority, CoreContext, ManagedComponent,
    RegistrationOutcome, TickContext,
};
use crate::config::EventsConfig;
use crate::constants;
use crate::error::EventError;
use crate::logging::{log_event_operation, log_lifecycle_operation};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

#[derive(Debug)]
struct BusState {
    frame: u64,
    events_this_frame: usize,
    overflow_notified: bool,
    total_events: u64,
    dropped_events: u64,
    overflow_frames: u64,
    raised_in_window: u64,
    events_per_minute: f64,
    window_elapsed: f64,
    counters: HashMap<String, ChannelCounters>,
    log: EventLog,
}

struct BusCore {
    config: EventsConfig,
    channels: DashMap<String, Arc<dyn AnyChannel>>,
    channels_by_type: DashMap<&'static str, Vec<String>>,
    core_channels: CoreChannels,
    state: Mutex<BusState>,
    initialized: AtomicBool,
}

impl RaiseMonitor for BusCore {
    fn admit(&self, channel: &ChannelDescriptor) -> bool {
        let now = Utc::now();
        let overflow = {
            let mut state = self.state.lock();
            if state.events_this_frame >= self.config.max_events_per_frame {
                state.dropped_events += 1;
                let first = !state.overflow_notified;
                if first {
                    state.overflow_notified = true;
                    state.overflow_frames += 1;
                }
                Some((state.frame, first))
            } else {
                state.events_this_frame += 1;
                state.total_events += 1;
                state.raised_in_window += 1;
                match state.counters.get_mut(&channel.id) {
                    Some(counters) => counters.record(now),
                    None => {
                        let mut counters = ChannelCounters::default();
                        counters.record(now);
                        state.counters.insert(channel.id.clone(), counters);
                    }
                }
                None
            }
        };

        let Some((frame, first_in_frame)) = overflow else {
            return true;
        };

        let error = EventError::EventRateExceeded {
            channel: channel.id.clone(),
            frame,
            max_events_per_frame: self.config.max_events_per_frame,
        };
        warn!(channel = %channel.id, frame = frame, error = %error, "⚠️ EVENT RATE EXCEEDED - dropping event");

        if first_in_frame {
            self.core_channels.event_overflow.raise_unmetered(EventOverflow {
                channel_id: channel.id.clone(),
                frame,
                max_events_per_frame: self.config.max_events_per_frame,
            });
        }
        false
    }

    fn logs_all_events(&self) -> bool {
        self.config.log_all_events
    }

    fn record(&self, channel: &ChannelDescriptor, payload: String) {
        let mut state = self.state.lock();
        let frame = state.frame;
        state.log.push(EventLogEntry {
            timestamp: Utc::now(),
            channel_id: channel.id.clone(),
            channel_type: channel.type_name.to_string(),
            payload,
            frame,
        });
    }
}

/// Shared handle to the event bus
#[derive(Clone)]
pub struct EventBus {
    core: Arc<BusCore>,
}

impl EventBus {
    pub fn new(config: EventsConfig) -> Self {
        let core_channels = CoreChannels::new(config.max_listeners);
        let state = BusState {
            frame: 0,
            events_this_frame: 0,
            overflow_notified: false,
            total_events: 0,
            dropped_events: 0,
            overflow_frames: 0,
            raised_in_window: 0,
            events_per_minute: 0.0,
            window_elapsed: 0.0,
            counters: HashMap::new(),
            log: EventLog::new(config.event_log_capacity),
        };
        let bus = Self {
            core: Arc::new(BusCore {
                config,
                channels: DashMap::new(),
                channels_by_type: DashMap::new(),
                core_channels,
                state: Mutex::new(state),
                initialized: AtomicBool::new(false),
            }),
        };
        for channel in bus.core.core_channels.all() {
            bus.register_event_channel(channel);
        }
        bus
    }

    pub fn config(&self) -> &EventsConfig {
        &self.core.config
    }

    /// Built-in lifecycle and persistence notification channels
    pub fn core_channels(&self) -> &CoreChannels {
        &self.core.core_channels
    }

    /// Create (or fetch) a channel carrying `T`, capped at the configured
    /// listener limit
    pub fn create_channel<T: EventPayload>(
        &self,
        id: impl Into<String>,
    ) -> Result<Arc<EventChannel<T>>, EventError> {
        let id = id.into();
        if self.core.channels.contains_key(&id) {
            return self.typed_channel::<T>(&id);
        }
        let channel = Arc::new(EventChannel::<T>::with_max_listeners(
            id,
            self.core.config.max_listeners,
        ));
        self.register_channel(&channel);
        Ok(channel)
    }

    /// Typed convenience over [`EventBus::register_event_channel`]
    pub fn register_channel<T: EventPayload>(
        &self,
        channel: &Arc<EventChannel<T>>,
    ) -> RegistrationOutcome {
        let erased: Arc<dyn AnyChannel> = channel.clone();
        self.register_event_channel(erased)
    }

    /// Track a channel. A second channel with the same id replaces the first.
    pub fn register_event_channel(&self, channel: Arc<dyn AnyChannel>) -> RegistrationOutcome {
        let descriptor = channel.descriptor().clone();
        let weak_core: Weak<BusCore> = Arc::downgrade(&self.core);
        let monitor: Weak<dyn RaiseMonitor> = weak_core;
        channel.attach_monitor(monitor);

        let previous = self
            .core
            .channels
            .insert(descriptor.id.clone(), channel.clone());

        let outcome = match previous {
            Some(previous) if Arc::ptr_eq(&previous, &channel) => {
                return RegistrationOutcome::Replaced;
            }
            Some(previous) => {
                previous.detach_monitor();
                self.remove_type_index(previous.descriptor());
                info!(channel = %descriptor.id, "Duplicate channel id - replacing existing channel");
                RegistrationOutcome::Replaced
            }
            None => RegistrationOutcome::Inserted,
        };

        self.core
            .channels_by_type
            .entry(descriptor.type_name)
            .or_default()
            .push(descriptor.id.clone());
        self.core
            .state
            .lock()
            .counters
            .entry(descriptor.id.clone())
            .or_default();

        log_event_operation("register", &descriptor.id, "registered", Some(descriptor.type_name));
        outcome
    }

    /// Stop tracking a channel; its listeners stay attached to the instance
    pub fn unregister_event_channel(&self, id: &str) -> Option<Arc<dyn AnyChannel>> {
        let (_, channel) = self.core.channels.remove(id)?;
        channel.detach_monitor();
        self.remove_type_index(channel.descriptor());
        self.core.state.lock().counters.remove(id);
        log_event_operation("unregister", id, "unregistered", None);
        Some(channel)
    }

    fn remove_type_index(&self, descriptor: &ChannelDescriptor) {
        if let Some(mut ids) = self.core.channels_by_type.get_mut(descriptor.type_name) {
            ids.retain(|id| id != &descriptor.id);
        }
        self.core
            .channels_by_type
            .remove_if(descriptor.type_name, |_, ids| ids.is_empty());
    }

    /// Register every channel in `channels`, returning how many were new
    pub fn discover_channels(
        &self,
        channels: impl IntoIterator<Item = Arc<dyn AnyChannel>>,
    ) -> usize {
        channels
            .into_iter()
            .map(|channel| self.register_event_channel(channel))
            .filter(|outcome| *outcome == RegistrationOutcome::Inserted)
            .count()
    }

    pub fn channel(&self, id: &str) -> Option<Arc<dyn AnyChannel>> {
        self.core
            .channels
            .get(id)
            .map(|entry| entry.value().clone())
    }

    /// Typed lookup; `None` when absent or carrying another payload type
    pub fn get_event_channel<T: EventPayload>(&self, id: &str) -> Option<Arc<EventChannel<T>>> {
        self.typed_channel(id).ok()
    }

    fn typed_channel<T: EventPayload>(&self, id: &str) -> Result<Arc<EventChannel<T>>, EventError> {
        let channel = self
            .channel(id)
            .ok_or_else(|| EventError::ChannelNotFound(id.to_string()))?;
        let actual = channel.descriptor().type_name;
        channel
            .into_any()
            .downcast::<EventChannel<T>>()
            .map_err(|_| EventError::ChannelTypeMismatch {
                channel: id.to_string(),
                requested: std::any::type_name::<T>(),
                actual,
            })
    }

    /// Every registered channel carrying `T`
    pub fn channels_of_type<T: EventPayload>(&self) -> Vec<Arc<EventChannel<T>>> {
        let ids = self
            .core
            .channels_by_type
            .get(std::any::type_name::<T>())
            .map(|ids| ids.value().clone())
            .unwrap_or_default();
        ids.iter()
            .filter_map(|id| self.get_event_channel::<T>(id))
            .collect()
    }

    /// Registered channel ids, sorted
    pub fn channel_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .core
            .channels
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn channel_count(&self) -> usize {
        self.core.channels.len()
    }

    /// Raise on a registered channel by id
    pub fn raise<T: EventPayload>(
        &self,
        channel_id: &str,
        payload: T,
    ) -> Result<DispatchOutcome, EventError> {
        let channel = self.typed_channel::<T>(channel_id)?;
        Ok(channel.raise(payload))
    }

    pub fn set_channel_logging(&self, channel_id: &str, enabled: bool) -> Result<(), EventError> {
        let channel = self
            .channel(channel_id)
            .ok_or_else(|| EventError::ChannelNotFound(channel_id.to_string()))?;
        channel.set_logging_enabled(enabled);
        Ok(())
    }

    /// Start a new frame, resetting the per-frame admission counter
    pub fn begin_frame(&self, frame: u64) {
        let mut state = self.core.state.lock();
        state.frame = frame;
        state.events_this_frame = 0;
        state.overflow_notified = false;
    }

    /// Advance the metrics window by `delta_seconds` of simulated time.
    /// Returns true when the window closed and rates were recomputed.
    pub fn poll_metrics(&self, delta_seconds: f64) -> bool {
        let window = self.core.config.metrics_window_seconds;
        let mut state = self.core.state.lock();
        state.window_elapsed += delta_seconds;
        if state.window_elapsed < window {
            return false;
        }

        let elapsed = state.window_elapsed;
        for counters in state.counters.values_mut() {
            counters.close_window(elapsed);
        }
        state.events_per_minute = per_minute(state.raised_in_window, elapsed);
        state.raised_in_window = 0;
        state.window_elapsed = 0.0;
        debug!(
            events_per_minute = state.events_per_minute,
            "Event metrics window closed"
        );
        true
    }

    pub fn get_channel_metrics(&self, channel_id: &str) -> Option<ChannelMetrics> {
        let channel = self.channel(channel_id)?;
        let counters = self
            .core
            .state
            .lock()
            .counters
            .get(channel_id)
            .cloned()
            .unwrap_or_default();
        Some(ChannelMetrics {
            channel_id: channel_id.to_string(),
            channel_type: channel.descriptor().type_name.to_string(),
            total_raised: counters.total_raised,
            raised_this_session: counters.raised_this_session,
            events_per_minute: counters.events_per_minute,
            listener_count: channel.listener_count(),
            last_raised_at: counters.last_raised_at,
        })
    }

    /// Metrics for every registered channel, sorted by id
    pub fn all_channel_metrics(&self) -> Vec<ChannelMetrics> {
        self.channel_ids()
            .iter()
            .filter_map(|id| self.get_channel_metrics(id))
            .collect()
    }

    pub fn metrics(&self) -> BusMetrics {
        let registered_channels = self.core.channels.len();
        let state = self.core.state.lock();
        BusMetrics {
            frame: state.frame,
            registered_channels,
            total_events: state.total_events,
            events_this_frame: state.events_this_frame,
            dropped_events: state.dropped_events,
            overflow_frames: state.overflow_frames,
            events_per_minute: state.events_per_minute,
            log_entries: state.log.len(),
        }
    }

    /// Zero the session counters; lifetime totals are kept
    pub fn reset_session_metrics(&self) {
        let mut state = self.core.state.lock();
        for counters in state.counters.values_mut() {
            counters.reset_session();
        }
        state.raised_in_window = 0;
        state.events_per_minute = 0.0;
        state.window_elapsed = 0.0;
    }

    /// Up to `max` most recent log entries, oldest first
    pub fn get_recent_event_log(&self, max: usize) -> Vec<EventLogEntry> {
        self.core.state.lock().log.recent(max)
    }

    pub fn clear_event_log(&self) {
        self.core.state.lock().log.clear();
    }

    /// Detach every listener from every registered channel
    pub fn clear_all_listeners(&self) {
        for entry in self.core.channels.iter() {
            entry.value().clear_listeners();
        }
        debug!("Cleared listeners on all channels");
    }

    pub fn is_initialized(&self) -> bool {
        self.core.initialized.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.core.channels.len())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl ComponentKind for EventBus {
    const KIND: &'static str = constants::components::EVENT_BUS;
}

impl ManagedComponent for EventBus {
    fn name(&self) -> &str {
        "EventBus"
    }

    fn priority(&self) -> ComponentPriority {
        ComponentPriority::Critical
    }

    fn is_initialized(&self) -> bool {
        EventBus::is_initialized(self)
    }

    fn persist_across_reset(&self) -> bool {
        true
    }

    fn capabilities(&self) -> ComponentCapabilities {
        ComponentCapabilities::default().with_ticks()
    }

    /// Discover the channels owned by every other registered component
    fn initialize(&mut self, ctx: &CoreContext) -> anyhow::Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let mut discovered = 0;
        for (kind, handle) in ctx.registry().handles() {
            if kind == Self::KIND {
                continue;
            }
            let channels = handle.lock().event_channels();
            discovered += self.discover_channels(channels);
        }

        self.core.initialized.store(true, Ordering::Release);
        log_lifecycle_operation(
            "initialize",
            Some(Self::KIND),
            "initialized",
            Some(&format!(
                "{discovered} channels discovered, {} registered",
                self.channel_count()
            )),
        );
        Ok(())
    }

    /// Clear all listeners and drop every non-core channel
    fn shutdown(&mut self) -> anyhow::Result<()> {
        if !self.is_initialized() {
            return Ok(());
        }
        self.clear_all_listeners();
        for id in self.channel_ids() {
            if !CoreChannels::is_core_channel(&id) {
                self.unregister_event_channel(&id);
            }
        }
        self.core.initialized.store(false, Ordering::Release);
        log_lifecycle_operation("shutdown", Some(Self::KIND), "shutdown", None);
        Ok(())
    }

    fn update(&mut self, tick: &TickContext) {
        self.poll_metrics(tick.delta_seconds());
    }
}
