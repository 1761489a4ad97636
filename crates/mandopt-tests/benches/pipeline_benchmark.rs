use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use mandopt::{optimize_module, OptimizerOptions};
use mandopt_tests::*;
use std::hint::black_box;

fn global_init_bench(c: &mut Criterion) {
    let options = OptimizerOptions::default();
    c.bench_function("global initializer", |b| {
        b.iter_batched(
            || global_init().module,
            |mut module| optimize_module(black_box(&mut module), &options).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

fn devirtualization_bench(c: &mut Criterion) {
    let options = OptimizerOptions::default();
    c.bench_function("devirtualize and inline", |b| {
        b.iter_batched(
            || shapes().module,
            |mut module| optimize_module(black_box(&mut module), &options).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

// ─── Whole-module scaling ────────────────────────────────────────────────────

fn wide_module_bench(c: &mut Criterion) {
    let options = OptimizerOptions::default();
    c.bench_function("64 roots x 8 transparent helpers", |b| {
        b.iter_batched(
            || wide_module(64, 8),
            |mut module| optimize_module(black_box(&mut module), &options).unwrap(),
            BatchSize::LargeInput,
        )
    });
}

fn wide_module_unverified_bench(c: &mut Criterion) {
    let options = OptimizerOptions { verify: false };
    c.bench_function("64 roots x 8 transparent helpers, no verifier", |b| {
        b.iter_batched(
            || wide_module(64, 8),
            |mut module| optimize_module(black_box(&mut module), &options).unwrap(),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    global_init_bench,
    devirtualization_bench,
    wide_module_bench,
    wide_module_unverified_bench
);
criterion_main!(benches);
