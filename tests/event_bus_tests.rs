mod common;

use chimera_core::config::EventsConfig;
use chimera_core::constants::channels;
use chimera_core::error::EventError;
use chimera_core::events::{
    DispatchOutcome, EventBus, EventChannel, EventListener, EventLog, EventLogEntry,
    EventOverflow, ListenerRegistration,
};
use chimera_core::orchestration::LifecycleOrchestrator;
use common::*;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

fn counting_listener(counter: &Arc<AtomicUsize>) -> Arc<impl Fn(&u32) + Send + Sync> {
    let counter = Arc::clone(counter);
    Arc::new(move |_: &u32| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn test_component_channels_are_discovered_at_startup() {
    let mut orchestrator = LifecycleOrchestrator::new(core_config());
    let weather = orchestrator.register_component(Weather::new());
    assert!(orchestrator.event_bus().channel(Weather::CHANNEL_ID).is_none());

    orchestrator.initialize_all();

    let bus = orchestrator.event_bus().clone();
    let channel = bus
        .get_event_channel::<WeatherChanged>(Weather::CHANNEL_ID)
        .expect("weather channel discovered");
    assert!(Arc::ptr_eq(&channel, &weather.lock().channel));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener = Arc::new(move |event: &WeatherChanged| sink.lock().push(event.clone()));
    channel.register_listener(&listener);

    bus.begin_frame(1);
    weather.lock().channel.raise(WeatherChanged {
        condition: "fog".to_string(),
        temperature_c: 4.5,
    });
    assert_eq!(seen.lock().len(), 1);
    assert_eq!(
        bus.get_channel_metrics(Weather::CHANNEL_ID)
            .map(|metrics| metrics.total_raised),
        Some(1)
    );

    orchestrator.shutdown_all();
    assert!(bus.channel(Weather::CHANNEL_ID).is_none());
    assert!(bus.channel(channels::STATE_CHANGED).is_some());
}

#[test]
fn test_dropped_listener_is_skipped() {
    let channel = EventChannel::<u32>::new("test.weak");
    let kept_count = Arc::new(AtomicUsize::new(0));
    let dropped_count = Arc::new(AtomicUsize::new(0));

    let kept = counting_listener(&kept_count);
    let dropped = counting_listener(&dropped_count);
    channel.register_listener(&kept);
    channel.register_listener(&dropped);
    drop(dropped);

    assert_eq!(
        channel.raise(7),
        DispatchOutcome::Delivered { listeners: 1 }
    );
    assert_eq!(kept_count.load(Ordering::SeqCst), 1);
    assert_eq!(dropped_count.load(Ordering::SeqCst), 0);
}

/// Listener that unsubscribes itself on its first event
struct OneShot {
    channel: Arc<EventChannel<u32>>,
    me: Weak<OneShot>,
    hits: AtomicUsize,
}

impl EventListener<u32> for OneShot {
    fn on_event(&self, _payload: &u32) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        if let Some(me) = self.me.upgrade() {
            self.channel.unregister_listener(&me);
        }
    }
}

#[test]
fn test_listener_can_unregister_during_dispatch() {
    let channel = Arc::new(EventChannel::<u32>::new("test.one_shot"));
    let before = Arc::new(AtomicUsize::new(0));
    let after = Arc::new(AtomicUsize::new(0));
    let first = counting_listener(&before);
    let one_shot = Arc::new_cyclic(|me| OneShot {
        channel: Arc::clone(&channel),
        me: me.clone(),
        hits: AtomicUsize::new(0),
    });
    let last = counting_listener(&after);

    channel.register_listener(&first);
    channel.register_listener(&one_shot);
    channel.register_listener(&last);

    channel.raise(1);
    channel.raise(2);

    assert_eq!(before.load(Ordering::SeqCst), 2);
    assert_eq!(after.load(Ordering::SeqCst), 2);
    assert_eq!(one_shot.hits.load(Ordering::SeqCst), 1);
    assert!(!channel.has_listener(&one_shot));
}

#[test]
fn test_listener_cap_rejects_extra_listeners() {
    let bus = EventBus::new(EventsConfig {
        max_listeners: 2,
        ..EventsConfig::default()
    });
    let channel = bus.create_channel::<u32>("test.capped").unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    let listeners: Vec<_> = (0..3).map(|_| counting_listener(&counter)).collect();

    assert_eq!(
        channel.register_listener(&listeners[0]),
        ListenerRegistration::Registered
    );
    assert_eq!(
        channel.register_listener(&listeners[0]),
        ListenerRegistration::AlreadyRegistered
    );
    assert_eq!(
        channel.register_listener(&listeners[1]),
        ListenerRegistration::Registered
    );
    assert_eq!(
        channel.register_listener(&listeners[2]),
        ListenerRegistration::Rejected { max_listeners: 2 }
    );

    channel.raise(1);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_frame_cap_drops_and_notifies_once() {
    let mut config = core_config();
    config.events.max_events_per_frame = 3;
    let mut orchestrator = LifecycleOrchestrator::new(config);
    orchestrator.initialize_all();
    let bus = orchestrator.event_bus().clone();

    let channel = bus.create_channel::<u32>("test.burst").unwrap();
    let delivered = Arc::new(AtomicUsize::new(0));
    let listener = counting_listener(&delivered);
    channel.register_listener(&listener);

    let overflows = Arc::new(Mutex::new(Vec::<EventOverflow>::new()));
    let sink = Arc::clone(&overflows);
    let overflow_listener = Arc::new(move |event: &EventOverflow| sink.lock().push(event.clone()));
    bus.core_channels()
        .event_overflow
        .register_listener(&overflow_listener);

    orchestrator.tick(Duration::from_millis(16));
    let frame = orchestrator.frame();
    for value in 0..5 {
        channel.raise(value);
    }

    assert_eq!(delivered.load(Ordering::SeqCst), 3);
    assert_eq!(overflows.lock().len(), 1);
    assert_eq!(overflows.lock()[0].frame, frame);
    assert_eq!(overflows.lock()[0].channel_id, "test.burst");
    assert_eq!(bus.metrics().dropped_events, 2);

    orchestrator.tick(Duration::from_millis(16));
    channel.raise(99);
    assert_eq!(delivered.load(Ordering::SeqCst), 4);
}

#[test]
fn test_raise_by_id_checks_type() {
    let bus = EventBus::new(EventsConfig::default());
    bus.create_channel::<u32>("test.typed").unwrap();

    assert!(matches!(
        bus.raise("test.typed", "not a number".to_string()),
        Err(EventError::ChannelTypeMismatch { .. })
    ));
    assert!(matches!(
        bus.raise("test.unknown", 1u32),
        Err(EventError::ChannelNotFound(_))
    ));
    assert!(bus.raise("test.typed", 1u32).unwrap().was_delivered());
}

#[test]
fn test_state_changes_are_logged_when_logging_all_events() {
    let mut config = core_config();
    config.events.log_all_events = true;
    let mut orchestrator = LifecycleOrchestrator::new(config);
    orchestrator.initialize_all();

    let log = orchestrator.event_bus().get_recent_event_log(10);
    let state_entries: Vec<_> = log
        .iter()
        .filter(|entry| entry.channel_id == channels::STATE_CHANGED)
        .collect();
    assert_eq!(state_entries.len(), 2);
    assert!(state_entries[1].payload.contains("Running"));
}

#[test]
fn test_metrics_window_follows_tick_time() {
    let mut config = core_config();
    config.events.metrics_window_seconds = 1.0;
    let mut orchestrator = LifecycleOrchestrator::new(config);
    orchestrator.initialize_all();
    let bus = orchestrator.event_bus().clone();
    let channel = bus.create_channel::<u32>("test.rate").unwrap();

    orchestrator.tick(Duration::from_millis(500));
    for value in 0..6 {
        channel.raise(value);
    }
    orchestrator.tick(Duration::from_millis(500));

    let metrics = bus.get_channel_metrics("test.rate").unwrap();
    assert_eq!(metrics.total_raised, 6);
    assert!((metrics.events_per_minute - 360.0).abs() < 1e-6);
}

fn log_entry(frame: u64) -> EventLogEntry {
    EventLogEntry {
        timestamp: chrono::Utc::now(),
        channel_id: "prop.log".to_string(),
        channel_type: "u32".to_string(),
        payload: frame.to_string(),
        frame,
    }
}

proptest! {
    /// Property: the ring buffer keeps the newest entries, oldest first
    #[test]
    fn event_log_keeps_newest_entries(capacity in 0usize..32, pushed in 0u64..80) {
        let mut log = EventLog::new(capacity);
        for frame in 0..pushed {
            log.push(log_entry(frame));
        }

        let kept = (pushed as usize).min(capacity);
        let frames: Vec<u64> = log.recent(usize::MAX).iter().map(|entry| entry.frame).collect();
        let expected: Vec<u64> = (pushed - kept as u64..pushed).collect();
        prop_assert_eq!(log.len(), kept);
        prop_assert_eq!(frames, expected);
        prop_assert_eq!(log.evicted(), pushed - kept as u64);
    }

    /// Property: a raise reaches every live listener under the cap
    #[test]
    fn raise_reaches_every_registered_listener(cap in 1usize..20, registered in 0usize..30) {
        let channel = EventChannel::<u32>::with_max_listeners("prop.listeners", cap);
        let counter = Arc::new(AtomicUsize::new(0));
        let listeners: Vec<_> = (0..registered).map(|_| counting_listener(&counter)).collect();
        for listener in &listeners {
            channel.register_listener(listener);
        }

        channel.raise(0);
        prop_assert_eq!(counter.load(Ordering::SeqCst), registered.min(cap));
    }

    /// Property: per frame, admitted raises never exceed the cap
    #[test]
    fn frame_cap_bounds_admitted_raises(cap in 1usize..16, raises in 0usize..40) {
        let bus = EventBus::new(EventsConfig {
            max_events_per_frame: cap,
            ..EventsConfig::default()
        });
        let channel = bus.create_channel::<u32>("prop.burst").unwrap();
        bus.begin_frame(1);

        let delivered = (0..raises)
            .map(|value| channel.raise(value as u32))
            .filter(DispatchOutcome::was_delivered)
            .count();

        let metrics = bus.metrics();
        prop_assert_eq!(delivered, raises.min(cap));
        prop_assert_eq!(metrics.dropped_events as usize, raises.saturating_sub(cap));
        prop_assert_eq!(metrics.overflow_frames, u64::from(raises > cap));
    }
}
