//! Benchmarks for flight execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flightdeck::prelude::*;
use flightdeck::store::NewResource;
use flightdeck::testing::MockStep;
use std::sync::Arc;
use uuid::Uuid;

fn flight_of(steps: usize) -> Flight {
    (0..steps)
        .fold(FlightBuilder::new("bench"), |builder, i| {
            builder.step(MockStep::new(format!("step_{i}")))
        })
        .build()
        .unwrap()
}

fn executor_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let executor = FlightExecutor::new();

    let short = flight_of(3);
    c.bench_function("execute_3_steps", |b| {
        b.iter(|| {
            let mut ctx = FlightContext::new("bench", FlightMap::new());
            black_box(rt.block_on(executor.run(&short, &mut ctx)))
        });
    });

    let long = flight_of(20);
    c.bench_function("execute_20_steps", |b| {
        b.iter(|| {
            let mut ctx = FlightContext::new("bench", FlightMap::new());
            black_box(rt.block_on(executor.run(&long, &mut ctx)))
        });
    });

    let unwinding = FlightBuilder::new("bench")
        .step(NoOpStep::new("a"))
        .step(NoOpStep::new("b"))
        .step(MockStep::new("c").failing("stop"))
        .build()
        .unwrap();
    c.bench_function("execute_and_undo", |b| {
        b.iter(|| {
            let mut ctx = FlightContext::new("bench", FlightMap::new());
            black_box(rt.block_on(executor.run(&unwinding, &mut ctx)))
        });
    });
}

fn lock_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(InMemoryResourceStore::new());
    let resource = ResourceId::dataset(Uuid::new_v4());
    store
        .insert(
            &NewResource {
                id: resource,
                name: "bench".to_string(),
                description: None,
                parent: None,
            },
            &FlightId::new("creator"),
        )
        .unwrap();

    let locks: Arc<dyn LockStore> = store;
    let flight = FlightBuilder::new("bench.lock")
        .step(LockResourceStep::exclusive(resource, Arc::clone(&locks)))
        .step(UnlockResourceStep::exclusive(resource, locks))
        .build()
        .unwrap();
    let executor = FlightExecutor::new();

    c.bench_function("lock_unlock_exclusive", |b| {
        b.iter(|| {
            let mut ctx = FlightContext::new("bench.lock", FlightMap::new());
            black_box(rt.block_on(executor.run(&flight, &mut ctx)))
        });
    });
}

criterion_group!(benches, executor_benchmark, lock_benchmark);
criterion_main!(benches);
