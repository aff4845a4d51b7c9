use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;
use worboo_relayer::app::RetryPolicy;
use worboo_relayer::domain::{EventStore, ProcessedEventKey, ProcessedEventMetadata, RelayerStatus};
use worboo_relayer::infra::JsonFileEventStore;

fn bench_dedup_lookup(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let store = runtime.block_on(async {
        let store = JsonFileEventStore::open(dir.path().join("processed-events.json"), None).await;
        for i in 0..1_000u64 {
            store
                .mark_processed(
                    ProcessedEventKey::new(&format!("0x{:064x}", i), 0),
                    ProcessedEventMetadata::default(),
                )
                .await
                .unwrap();
        }
        store
    });

    let hit = ProcessedEventKey::new(&format!("0x{:064x}", 500), 0);
    let miss = ProcessedEventKey::new(&format!("0x{:064x}", 5_000), 0);

    c.bench_function("has_processed_hit", |b| {
        b.iter(|| store.has_processed(black_box(&hit)))
    });
    c.bench_function("has_processed_miss", |b| {
        b.iter(|| store.has_processed(black_box(&miss)))
    });
}

fn bench_event_key(c: &mut Criterion) {
    let tx = format!("0x{:064x}", 42);
    c.bench_function("event_key_new", |b| {
        b.iter(|| ProcessedEventKey::new(black_box(&tx), black_box(7)))
    });
}

fn bench_retry_delay(c: &mut Criterion) {
    let policy = RetryPolicy::new(10, Duration::from_millis(2_000));
    c.bench_function("retry_delay_before", |b| {
        b.iter(|| {
            for attempt in 1..=black_box(policy.max_attempts) {
                black_box(policy.delay_before(attempt));
            }
        })
    });
}

fn bench_status(c: &mut Criterion) {
    c.bench_function("status_from_counters", |b| {
        b.iter(|| RelayerStatus::from_counters(black_box(3), black_box(1)))
    });
}

criterion_group!(
    benches,
    bench_dedup_lookup,
    bench_event_key,
    bench_retry_delay,
    bench_status
);
criterion_main!(benches);
