//! # Typed Event Channels
//!
//! An [`EventChannel<T>`] is a named broadcast point carrying payloads of one
//! type. Listeners are held weakly: a dropped listener is skipped and pruned
//! instead of keeping its owner alive.
//!
//! Dispatch works on a snapshot of the listener list taken before any
//! callback runs and no channel lock is held while callbacks execute. A
//! listener may therefore unregister itself (or others), register new
//! listeners, or raise further events from inside its callback without
//! corrupting the pass in progress.

use crate::constants::events::DEFAULT_MAX_LISTENERS;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Bound for channel payloads
pub trait EventPayload: Debug + Send + Sync + 'static {}

impl<T: Debug + Send + Sync + 'static> EventPayload for T {}

/// Receiver of events from an [`EventChannel<T>`]
pub trait EventListener<T>: Send + Sync {
    fn on_event(&self, payload: &T);
}

impl<T, F> EventListener<T> for F
where
    F: Fn(&T) + Send + Sync,
{
    fn on_event(&self, payload: &T) {
        self(payload)
    }
}

/// Result of [`EventChannel::register_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerRegistration {
    Registered,
    /// The listener was already present; nothing changed
    AlreadyRegistered,
    /// The channel is at capacity
    Rejected { max_listeners: usize },
}

impl ListenerRegistration {
    /// True when the listener is subscribed after the call
    pub fn is_subscribed(&self) -> bool {
        matches!(self, Self::Registered | Self::AlreadyRegistered)
    }
}

/// Result of a raise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { listeners: usize },
    /// Rejected by the bus frame cap
    Dropped,
}

impl DispatchOutcome {
    pub fn was_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Identity of a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDescriptor {
    pub id: String,
    pub type_name: &'static str,
}

/// Hook a bus installs on the channels it tracks.
///
/// `admit` runs before dispatch and may veto the raise; `record` receives the
/// rendered payload of admitted raises that are being logged.
pub trait RaiseMonitor: Send + Sync {
    fn admit(&self, channel: &ChannelDescriptor) -> bool;

    fn logs_all_events(&self) -> bool;

    fn record(&self, channel: &ChannelDescriptor, payload: String);
}

type InlineHandler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ChannelState<T> {
    listeners: Vec<Weak<dyn EventListener<T>>>,
    raise_count: u64,
    last_raised_at: Option<DateTime<Utc>>,
}

/// Named broadcast point for payloads of type `T`
pub struct EventChannel<T: EventPayload> {
    descriptor: ChannelDescriptor,
    max_listeners: usize,
    logging_enabled: AtomicBool,
    state: Mutex<ChannelState<T>>,
    inline_handler: RwLock<Option<InlineHandler<T>>>,
    monitor: RwLock<Option<Weak<dyn RaiseMonitor>>>,
}

impl<T: EventPayload> EventChannel<T> {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_max_listeners(id, DEFAULT_MAX_LISTENERS)
    }

    pub fn with_max_listeners(id: impl Into<String>, max_listeners: usize) -> Self {
        Self {
            descriptor: ChannelDescriptor {
                id: id.into(),
                type_name: std::any::type_name::<T>(),
            },
            max_listeners,
            logging_enabled: AtomicBool::new(false),
            state: Mutex::new(ChannelState {
                listeners: Vec::new(),
                raise_count: 0,
                last_raised_at: None,
            }),
            inline_handler: RwLock::new(None),
            monitor: RwLock::new(None),
        }
    }

    /// Builder form of [`EventChannel::set_logging_enabled`]
    pub fn with_logging(self, enabled: bool) -> Self {
        self.logging_enabled.store(enabled, Ordering::Relaxed);
        self
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &ChannelDescriptor {
        &self.descriptor
    }

    pub fn max_listeners(&self) -> usize {
        self.max_listeners
    }

    /// Subscribe a listener; the channel keeps only a weak reference
    pub fn register_listener<L>(&self, listener: &Arc<L>) -> ListenerRegistration
    where
        L: EventListener<T> + 'static,
    {
        let listener: Arc<dyn EventListener<T>> = listener.clone();
        self.register_dyn(&listener)
    }

    pub fn register_dyn(&self, listener: &Arc<dyn EventListener<T>>) -> ListenerRegistration {
        let mut state = self.state.lock();
        state.listeners.retain(|weak| weak.strong_count() > 0);

        if state
            .listeners
            .iter()
            .any(|weak| std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(listener)))
        {
            return ListenerRegistration::AlreadyRegistered;
        }

        if state.listeners.len() >= self.max_listeners {
            warn!(
                channel = %self.descriptor.id,
                max_listeners = self.max_listeners,
                "Listener rejected - channel at capacity"
            );
            return ListenerRegistration::Rejected {
                max_listeners: self.max_listeners,
            };
        }

        state.listeners.push(Arc::downgrade(listener));
        ListenerRegistration::Registered
    }

    /// Unsubscribe a listener. Returns false when it was not registered.
    pub fn unregister_listener<L>(&self, listener: &Arc<L>) -> bool
    where
        L: EventListener<T> + 'static,
    {
        let target = Arc::as_ptr(listener);
        let mut state = self.state.lock();
        let before = state.listeners.len();
        state
            .listeners
            .retain(|weak| !std::ptr::addr_eq(weak.as_ptr(), target));
        state.listeners.len() != before
    }

    pub fn has_listener<L>(&self, listener: &Arc<L>) -> bool
    where
        L: EventListener<T> + 'static,
    {
        let target = Arc::as_ptr(listener);
        self.state
            .lock()
            .listeners
            .iter()
            .any(|weak| weak.strong_count() > 0 && std::ptr::addr_eq(weak.as_ptr(), target))
    }

    /// Install the handler invoked before listeners on every dispatch
    pub fn set_inline_handler<F>(&self, handler: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        *self.inline_handler.write() = Some(Arc::new(handler));
    }

    pub fn clear_inline_handler(&self) {
        *self.inline_handler.write() = None;
    }

    /// Broadcast a payload, subject to the owning bus' admission checks
    pub fn raise(&self, payload: T) -> DispatchOutcome {
        let monitor = self.current_monitor();
        if let Some(monitor) = &monitor {
            if !monitor.admit(&self.descriptor) {
                return DispatchOutcome::Dropped;
            }
        }
        self.dispatch(payload, monitor.as_deref())
    }

    /// Broadcast without consulting the frame cap
    pub(crate) fn raise_unmetered(&self, payload: T) -> DispatchOutcome {
        let monitor = self.current_monitor();
        self.dispatch(payload, monitor.as_deref())
    }

    fn dispatch(&self, payload: T, monitor: Option<&dyn RaiseMonitor>) -> DispatchOutcome {
        let snapshot = {
            let mut state = self.state.lock();
            state.raise_count += 1;
            state.last_raised_at = Some(Utc::now());
            state.listeners.clone()
        };

        let logging = self.logging_enabled.load(Ordering::Relaxed)
            || monitor.is_some_and(|m| m.logs_all_events());
        if logging {
            let rendered = format!("{payload:?}");
            debug!(channel = %self.descriptor.id, payload = %rendered, "📡 EVENT RAISED");
            if let Some(monitor) = monitor {
                monitor.record(&self.descriptor, rendered);
            }
        }

        let inline = self.inline_handler.read().clone();
        if let Some(handler) = inline {
            handler(&payload);
        }

        let mut delivered = 0;
        let mut dead = 0;
        for weak in &snapshot {
            match weak.upgrade() {
                Some(listener) => {
                    listener.on_event(&payload);
                    delivered += 1;
                }
                None => dead += 1,
            }
        }

        if dead > 0 {
            self.state
                .lock()
                .listeners
                .retain(|weak| weak.strong_count() > 0);
        }

        DispatchOutcome::Delivered {
            listeners: delivered,
        }
    }

    fn current_monitor(&self) -> Option<Arc<dyn RaiseMonitor>> {
        self.monitor.read().as_ref().and_then(Weak::upgrade)
    }
}

impl<T: EventPayload> Debug for EventChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("id", &self.descriptor.id)
            .field("type", &self.descriptor.type_name)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Type-erased view of a channel, used by the bus registry
pub trait AnyChannel: Send + Sync {
    fn descriptor(&self) -> &ChannelDescriptor;

    fn listener_count(&self) -> usize;

    fn raise_count(&self) -> u64;

    fn last_raised_at(&self) -> Option<DateTime<Utc>>;

    fn clear_listeners(&self);

    fn logging_enabled(&self) -> bool;

    fn set_logging_enabled(&self, enabled: bool);

    fn attach_monitor(&self, monitor: Weak<dyn RaiseMonitor>);

    fn detach_monitor(&self);

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: EventPayload> AnyChannel for EventChannel<T> {
    fn descriptor(&self) -> &ChannelDescriptor {
        &self.descriptor
    }

    /// Live listeners only
    fn listener_count(&self) -> usize {
        self.state
            .lock()
            .listeners
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn raise_count(&self) -> u64 {
        self.state.lock().raise_count
    }

    fn last_raised_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_raised_at
    }

    fn clear_listeners(&self) {
        self.state.lock().listeners.clear();
    }

    fn logging_enabled(&self) -> bool {
        self.logging_enabled.load(Ordering::Relaxed)
    }

    fn set_logging_enabled(&self, enabled: bool) {
        self.logging_enabled.store(enabled, Ordering::Relaxed);
    }

    fn attach_monitor(&self, monitor: Weak<dyn RaiseMonitor>) {
        *self.monitor.write() = Some(monitor);
    }

    fn detach_monitor(&self) {
        *self.monitor.write() = None;
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
