//! Routing benchmarks — measures per-decision overhead of the router.
//!
//! Targets:
//! - route_request over 3 components:   P99 <5μs
//! - route_request over 100 components: P99 <50μs
//! - start + end lifecycle pair:        P99 <5μs
//! - monitor tick with 1k active:       P99 <1ms

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio_healing_router::{Component, RouterConfig, SelfHealingRouter};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_router(components: usize) -> SelfHealingRouter {
    let router = SelfHealingRouter::new(RouterConfig::default());
    for i in 0..components {
        let priority = u32::try_from(i % 5).unwrap_or(0) + 1;
        router.register_component(Component::new(format!("comp-{i}"), "", priority, 10));
    }
    router
}

// ---------------------------------------------------------------------------
// Bench: route_request scaling with registry size
// ---------------------------------------------------------------------------

fn bench_route_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("route_request");
    for size in [3usize, 10, 100] {
        let router = make_router(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(router.route_request(black_box("work"), None)));
        });
    }
    group.finish();
}

fn bench_route_preferred(c: &mut Criterion) {
    let router = make_router(100);
    c.bench_function("route_request_preferred", |b| {
        b.iter(|| black_box(router.route_request("work", Some(black_box("comp-42")))));
    });
}

// ---------------------------------------------------------------------------
// Bench: lifecycle hooks
// ---------------------------------------------------------------------------

fn bench_lifecycle_pair(c: &mut Criterion) {
    let router = make_router(3);
    c.bench_function("start_end_pair", |b| {
        b.iter(|| {
            router.record_request_start_on("req", "comp-1");
            router.record_request_end("req", "comp-1", true, Duration::from_millis(3));
        });
    });
}

// ---------------------------------------------------------------------------
// Bench: one monitor tick with many active requests
// ---------------------------------------------------------------------------

fn bench_health_check(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let router = make_router(10);
    for i in 0..1_000 {
        router.record_request_start(format!("req-{i}"));
    }

    c.bench_function("run_health_check_1k_active", |b| {
        b.to_async(&rt).iter(|| async { black_box(router.run_health_check().await) });
    });
}

criterion_group!(
    benches,
    bench_route_request,
    bench_route_preferred,
    bench_lifecycle_pair,
    bench_health_check
);
criterion_main!(benches);
