use chimera_core::config::{CoreConfig, EventsConfig};
use chimera_core::events::EventBus;
use chimera_core::orchestration::LifecycleOrchestrator;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn benchmark_raise(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_raise");
    for listener_count in [1usize, 10, 100] {
        let bus = EventBus::new(EventsConfig {
            max_events_per_frame: usize::MAX,
            ..EventsConfig::default()
        });
        let channel = bus.create_channel::<u64>("bench.raise").unwrap();
        let total = Arc::new(AtomicU64::new(0));
        let listeners: Vec<_> = (0..listener_count)
            .map(|_| {
                let total = Arc::clone(&total);
                Arc::new(move |value: &u64| {
                    total.fetch_add(*value, Ordering::Relaxed);
                })
            })
            .collect();
        for listener in &listeners {
            channel.register_listener(listener);
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(listener_count),
            &listener_count,
            |b, _| b.iter(|| channel.raise(black_box(1))),
        );
    }
    group.finish();
}

fn benchmark_tick(c: &mut Criterion) {
    let mut config = CoreConfig::default();
    config.persistence.enabled = false;
    let mut orchestrator = LifecycleOrchestrator::new(config);
    orchestrator.initialize_all();

    c.bench_function("orchestrator_tick", |b| {
        b.iter(|| orchestrator.tick(black_box(Duration::from_millis(16))))
    });
}

criterion_group!(benches, benchmark_raise, benchmark_tick);
criterion_main!(benches);
