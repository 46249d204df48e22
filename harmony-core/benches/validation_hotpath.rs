use chrono::{DateTime, Duration as ChronoDuration, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use harmony_core::vastra::{ReachabilityFlag, ReachabilityStrategy};
use harmony_core::{ObjectValidation, Time, TimestampStrategy, Timestamped, ValidationService};
use std::hint::black_box;

struct Cached {
    updated: Option<DateTime<Utc>>,
}

impl Timestamped for Cached {
    fn last_update(&self) -> Option<DateTime<Utc>> {
        self.updated
    }
}

fn bench_validation_chain(c: &mut Criterion) {
    let service = ValidationService::new(false)
        .with_strategy(ReachabilityStrategy::new(ReachabilityFlag::new(true)))
        .with_strategy(TimestampStrategy::new(Time::Minutes(5)));

    let now = Utc::now();
    let objects: Vec<Cached> = (0..1_000)
        .map(|i| Cached {
            updated: Some(now - ChronoDuration::seconds(i % 200)),
        })
        .collect();

    c.bench_function("vastra/is_object_valid", |b| {
        b.iter(|| black_box(service.is_object_valid(black_box(&objects[0]))));
    });

    c.bench_function("vastra/is_array_valid_1k", |b| {
        b.iter(|| black_box(service.is_array_valid(black_box(&objects))));
    });
}

criterion_group!(benches, bench_validation_chain);
criterion_main!(benches);
