//! Thread-group runner benchmarks: spawn + join overhead.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use plasma_sync::alloc::CountingAlloc;
use plasma_sync::{ThreadGroup, run_threads};

fn bench_run_threads(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_threads");

    for &n in &[1_usize, 4, 16, 64] {
        let args: Vec<u64> = (0..n as u64).collect();
        group.bench_with_input(BenchmarkId::new("workers", n), &args, |b, args| {
            b.iter(|| {
                let results = run_threads(|x: u64| x * 2, args.clone()).unwrap();
                black_box(results);
            });
        });
    }
    group.finish();
}

fn bench_phased(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_phased");

    for &n in &[2_usize, 8, 32] {
        let tg = ThreadGroup::new(n)
            .unwrap()
            .alloc_context(Arc::new(CountingAlloc::new()));
        group.bench_with_input(BenchmarkId::new("workers", n), &n, |b, &n| {
            b.iter(|| {
                let results = tg
                    .run_phased(
                        |ctx, x: usize| {
                            ctx.barrier_wait();
                            x + ctx.index()
                        },
                        vec![0; n],
                    )
                    .unwrap();
                black_box(results);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_run_threads, bench_phased);
criterion_main!(benches);
