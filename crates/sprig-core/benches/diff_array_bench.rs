//! Benchmarks for the edit-script diff over keyed sibling lists.
//!
//! Run with: cargo bench -p sprig-core --bench diff_array_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sprig_core::{Element, VTree, diff_array};
use std::hint::black_box;

/// Keyed list items `0..len`.
fn keyed_list(len: usize) -> Vec<VTree> {
    (0..len)
        .map(|i| {
            Element::build("li")
                .key(format!("item-{i}"))
                .child(format!("row {i}"))
                .finish()
        })
        .collect()
}

/// Same list with every `stride`-th item dropped and a fresh item appended.
fn churned(len: usize, stride: usize) -> Vec<VTree> {
    let mut items: Vec<VTree> = keyed_list(len)
        .into_iter()
        .enumerate()
        .filter(|(i, _)| i % stride != 0)
        .map(|(_, item)| item)
        .collect();
    items.push(Element::build("li").key("fresh").child("new").finish());
    items
}

fn bench_identical(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_array/identical");

    for len in [10usize, 100, 500] {
        group.throughput(Throughput::Elements((len * len) as u64));
        let old = keyed_list(len);
        let new = keyed_list(len);
        group.bench_with_input(BenchmarkId::new("keyed", len), &(), |b, _| {
            b.iter(|| black_box(diff_array(&old, &new, VTree::key_eq)))
        });
    }

    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_array/churn");

    for len in [10usize, 100, 500] {
        group.throughput(Throughput::Elements((len * len) as u64));
        let old = keyed_list(len);
        let new = churned(len, 7);
        group.bench_with_input(BenchmarkId::new("keyed", len), &(), |b, _| {
            b.iter(|| black_box(diff_array(&old, &new, VTree::key_eq)))
        });
    }

    group.finish();
}

fn bench_chars(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff_array/chars");
    let a: Vec<char> = "the quick brown fox jumps over the lazy dog".chars().collect();
    let b: Vec<char> = "a quick brown cat leaps over one lazy dog".chars().collect();
    group.bench_function("sentence", |bench| {
        bench.iter(|| black_box(diff_array(&a, &b, |x, y| x == y)))
    });
    group.finish();
}

criterion_group!(benches, bench_identical, bench_churn, bench_chars);
criterion_main!(benches);
