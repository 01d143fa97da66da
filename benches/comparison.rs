use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rayon::prelude::*;
use ring_pool::{PoolConfig, QueueKind, RingBuffer, ThreadPool};

const KINDS: [(&str, QueueKind); 2] = [
    ("lock_free", QueueKind::LockFree),
    ("locked", QueueKind::Locked),
];

fn simple_work(iterations: u64) -> u64 {
    let mut sum = 0u64;
    for i in 0..iterations {
        sum = sum.wrapping_add(i * 17);
    }
    sum
}

fn complex_work(size: usize) -> f64 {
    let mut result = 0.0;
    for i in 0..size {
        for j in 0..size {
            result += ((i * j) as f64).sqrt().sin();
        }
    }
    result
}

fn pool_for(kind: QueueKind) -> ThreadPool {
    ThreadPool::with_config(PoolConfig::default().with_queue_capacity(256).with_queue_kind(kind))
        .unwrap()
}

// Submit-and-wait throughput of small tasks through each queue backend
fn bench_simple(c: &mut Criterion) {
    for tasks in [100u64, 10_000] {
        let mut group = c.benchmark_group(format!("simple_{tasks}"));
        if tasks > 1000 {
            group.sample_size(50);
        }

        for (name, kind) in KINDS {
            let pool = pool_for(kind);
            group.bench_function(name, |b| {
                b.iter(|| {
                    let handles: Vec<_> = (0..tasks)
                        .map(|_| pool.submit(|| simple_work(100)))
                        .collect();
                    let results: Vec<u64> =
                        handles.into_iter().map(|h| h.wait().unwrap()).collect();
                    black_box(results);
                });
            });
        }

        group.bench_function("rayon", |b| {
            b.iter(|| {
                let results: Vec<u64> = (0..tasks)
                    .into_par_iter()
                    .map(|_| simple_work(100))
                    .collect();
                black_box(results);
            });
        });

        group.finish();
    }
}

// Heavier tasks, where queue overhead should vanish
fn bench_complex(c: &mut Criterion) {
    let mut group = c.benchmark_group("complex_1k");
    group.sample_size(20);
    group.measurement_time(std::time::Duration::from_secs(10));

    for (name, kind) in KINDS {
        let pool = pool_for(kind);
        group.bench_function(name, |b| {
            b.iter(|| {
                let handles: Vec<_> = (0..1000).map(|_| pool.submit(|| complex_work(50))).collect();
                let results: Vec<f64> = handles.into_iter().map(|h| h.wait().unwrap()).collect();
                black_box(results);
            });
        });
    }

    group.bench_function("rayon", |b| {
        b.iter(|| {
            let results: Vec<f64> = (0..1000).into_par_iter().map(|_| complex_work(50)).collect();
            black_box(results);
        });
    });

    group.finish();
}

// Raw ring buffer hand-off, one consumer and a varying number of producers
fn bench_ring_producers(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer_handoff_10k");
    const ITEMS: u64 = 10_000;

    for producers in [1u64, 2, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(producers),
            &producers,
            |b, &producers| {
                b.iter(|| {
                    let ring = Arc::new(RingBuffer::<u64>::new(1024).unwrap());
                    let per_producer = ITEMS / producers;
                    let threads: Vec<_> = (0..producers)
                        .map(|_| {
                            let ring = ring.clone();
                            thread::spawn(move || {
                                for i in 0..per_producer {
                                    let mut value = i;
                                    while let Err(v) = ring.try_push(value) {
                                        value = v;
                                        std::hint::spin_loop();
                                    }
                                }
                            })
                        })
                        .collect();

                    let mut received = 0;
                    let mut sum = 0u64;
                    while received < per_producer * producers {
                        match ring.try_pop() {
                            Some(v) => {
                                sum = sum.wrapping_add(v);
                                received += 1;
                            }
                            None => std::hint::spin_loop(),
                        }
                    }
                    for t in threads {
                        t.join().unwrap();
                    }
                    black_box(sum);
                });
            },
        );
    }

    group.finish();
}

// Minimal task overhead - submitting empty tasks
fn bench_minimal_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("minimal_task_overhead");

    for (name, kind) in KINDS {
        let pool = pool_for(kind);
        group.bench_function(name, |b| {
            b.iter(|| {
                let handles: Vec<_> = (0..1000).map(|_| pool.submit(|| 1u64)).collect();
                for h in handles {
                    black_box(h.wait().unwrap());
                }
            });
        });
    }

    group.bench_function("rayon", |b| {
        b.iter(|| {
            let results: Vec<u64> = (0..1000).into_par_iter().map(|_| 1u64).collect();
            black_box(results);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_simple,
    bench_complex,
    bench_ring_producers,
    bench_minimal_overhead
);
criterion_main!(benches);
