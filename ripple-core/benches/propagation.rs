//! Benchmarks for write propagation through the dependency graph.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ripple_core::reactive::{batch, Computed, Effect, Runtime, Signal};

/// One signal feeding a chain of `depth` computeds and an effect at the end.
fn build_chain(depth: usize) -> (Signal<u64>, Computed<u64>, Effect) {
    let source = Signal::new(0u64);
    let s = source.clone();
    let mut tail = Computed::new(move || s.get());
    for _ in 1..depth {
        let previous = tail.clone();
        tail = Computed::new(move || previous.get() + 1);
    }
    let last = tail.clone();
    let effect = Effect::new(move || {
        black_box(last.get());
    });
    (source, tail, effect)
}

/// Benchmark a write plus its notification pass through chains of
/// increasing depth
fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_write");

    for depth in [1, 10, 50] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let (source, _tail, _effect) = build_chain(depth);
            let mut value = 0;
            b.iter(|| {
                value += 1;
                source.set(value).unwrap();
                Runtime::run_until_idle();
            });
        });
    }

    group.finish();
}

/// Benchmark many writes coalesced by a batch versus one pass each
fn bench_fan_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_in");

    for n in [10, 100] {
        let signals: Vec<Signal<u64>> = (0..n).map(|_| Signal::new(0)).collect();
        let inputs = signals.clone();
        let _effect = Effect::new(move || {
            black_box(inputs.iter().map(Signal::get).sum::<u64>());
        });

        group.bench_with_input(BenchmarkId::new("batched", n), &n, |b, _| {
            let mut value = 0;
            b.iter(|| {
                value += 1;
                batch(|| {
                    for signal in &signals {
                        signal.set(value).unwrap();
                    }
                });
                Runtime::run_until_idle();
            });
        });

        group.bench_with_input(BenchmarkId::new("unbatched", n), &n, |b, _| {
            let mut value = 0;
            b.iter(|| {
                value += 1;
                for signal in &signals {
                    signal.set(value + 1_000_000).unwrap();
                }
                Runtime::run_until_idle();
            });
        });
    }

    group.finish();
}

/// Benchmark repeated reads of a clean computed
fn bench_cached_read(c: &mut Criterion) {
    let (_source, tail, _effect) = build_chain(10);
    c.bench_function("cached_read", |b| b.iter(|| black_box(tail.get())));
}

criterion_group!(benches, bench_chain, bench_fan_in, bench_cached_read);
criterion_main!(benches);
