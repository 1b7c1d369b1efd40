//! Benchmarks for patching a headless document.
//!
//! Run with: cargo bench -p sprig-web --bench patch_bench

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sprig_core::{Element, VTree};
use sprig_web::{MemoryDocument, Renderer};
use std::hint::black_box;

fn table(rows: usize, selected: usize) -> VTree {
    Element::build("table")
        .children((0..rows).map(|i| {
            let row = Element::build("tr").key(format!("row-{i}"));
            let row = if i == selected {
                row.class("selected")
            } else {
                row
            };
            row.child(Element::build("td").child(format!("cell {i}")))
                .finish()
        }))
        .finish()
}

fn rotated(rows: usize) -> VTree {
    Element::build("table")
        .children((0..rows).map(|i| {
            let i = (i + 1) % rows;
            Element::build("tr")
                .key(format!("row-{i}"))
                .child(Element::build("td").child(format!("cell {i}")))
                .finish()
        }))
        .finish()
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("patch/select_row");

    for rows in [10usize, 100, 1000] {
        let before = table(rows, 0);
        let after = table(rows, rows / 2);
        group.bench_with_input(BenchmarkId::new("rows", rows), &(), |b, _| {
            let mut doc = MemoryDocument::new();
            let root = doc.root();
            let mut renderer = Renderer::new();
            let _ = renderer.mount(&mut doc, root, &before);
            let mut flip = false;
            b.iter(|| {
                let (old, new) = if flip { (&after, &before) } else { (&before, &after) };
                flip = !flip;
                black_box(renderer.patch(&mut doc, root, Some(old), Some(new), 0))
            })
        });
    }

    group.finish();
}

fn bench_rotate(c: &mut Criterion) {
    let mut group = c.benchmark_group("patch/rotate_keyed");

    for rows in [10usize, 100, 300] {
        let before = table(rows, usize::MAX);
        let after = rotated(rows);
        group.bench_with_input(BenchmarkId::new("rows", rows), &(), |b, _| {
            b.iter(|| {
                let mut doc = MemoryDocument::new();
                let root = doc.root();
                let mut renderer = Renderer::new();
                let _ = renderer.mount(&mut doc, root, &before);
                black_box(renderer.patch(&mut doc, root, Some(&before), Some(&after), 0))
            })
        });
    }

    group.finish();
}

fn bench_mount(c: &mut Criterion) {
    let mut group = c.benchmark_group("patch/mount");

    for rows in [100usize, 1000] {
        let tree = table(rows, 0);
        group.bench_with_input(BenchmarkId::new("rows", rows), &(), |b, _| {
            b.iter(|| {
                let mut doc = MemoryDocument::new();
                let root = doc.root();
                let mut renderer = Renderer::new();
                black_box(renderer.mount(&mut doc, root, &tree))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_select, bench_rotate, bench_mount);
criterion_main!(benches);
