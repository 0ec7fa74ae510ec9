//! Performance benchmarks for layerconf read paths.
//!
//! Reads through a `ConfigHandle` are a single atomic pointer load and
//! should stay flat under concurrent readers; registry `value` reads pay
//! the lock for name resolution on every call.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use layerconf::prelude::*;
use serde_json::json;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn bench_registry() -> (TempDir, Arc<ConfigRegistry>) {
    let dir = TempDir::new().unwrap();
    let document = json!({
        "value": 42,
        "name": "benchmark",
        "flag": true,
        "items": ["a", "b", "c"],
        "nested": {"deep": {"leaf": 1.5}},
    });
    fs::write(
        dir.path().join("bench.json"),
        serde_json::to_string(&document).unwrap(),
    )
    .unwrap();

    let registry = ConfigRegistry::new();
    registry
        .load(dir.path(), "bench.json", LoadOptions::default())
        .unwrap();
    (dir, registry)
}

/// Benchmark lock-free handle reads.
fn benchmark_handle_read(c: &mut Criterion) {
    let (_dir, registry) = bench_registry();
    let handle = registry.handle(None).unwrap();

    let mut group = c.benchmark_group("read_latency");
    group.bench_function("handle_document", |b| {
        b.iter(|| {
            let document = handle.document();
            black_box(document.get("value"));
        });
    });
    group.bench_function("handle_dotted_value", |b| {
        b.iter(|| {
            black_box(handle.value("nested.deep.leaf").unwrap());
        });
    });
    group.finish();
}

/// Benchmark lock-taking registry reads for comparison.
fn benchmark_registry_read(c: &mut Criterion) {
    let (_dir, registry) = bench_registry();

    let mut group = c.benchmark_group("registry_read");
    group.bench_function("value", |b| {
        b.iter(|| {
            black_box(registry.value("value").unwrap());
        });
    });
    group.finish();
}

/// Benchmark handle cloning.
fn benchmark_clone(c: &mut Criterion) {
    let (_dir, registry) = bench_registry();
    let handle = registry.handle(None).unwrap();

    let mut group = c.benchmark_group("clone");
    group.bench_function("handle_clone", |b| {
        b.iter(|| {
            black_box(handle.clone());
        });
    });
    group.finish();
}

/// Benchmark concurrent handle readers.
fn benchmark_concurrent_reads(c: &mut Criterion) {
    let (_dir, registry) = bench_registry();

    let mut group = c.benchmark_group("concurrent_reads");
    for readers in [2usize, 4, 8] {
        group.bench_function(format!("{readers}_readers"), |b| {
            b.iter(|| {
                let barrier = Arc::new(Barrier::new(readers));
                let threads: Vec<_> = (0..readers)
                    .map(|_| {
                        let handle = registry.handle(None).unwrap();
                        let barrier = Arc::clone(&barrier);
                        thread::spawn(move || {
                            barrier.wait();
                            for _ in 0..1000 {
                                let document = handle.document();
                                black_box(document.get("value"));
                            }
                        })
                    })
                    .collect();
                for thread in threads {
                    thread.join().unwrap();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_handle_read,
    benchmark_registry_read,
    benchmark_clone,
    benchmark_concurrent_reads
);
criterion_main!(benches);
