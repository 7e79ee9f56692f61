//! Benchmarks the two retrieval lanes `recall` fans out to:
//! `Storage::search_dense`'s brute-force cosine scan and
//! `Storage::search_sparse`'s BM25 lookup, at a size representative of
//! a single-session hot tier (spec.md §4.D's 10k default capacity).

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use mneme_core::node::{Node, NodeType};
use mneme_core::storage::Storage;
use mneme_core::vector::Vector;

const DIM: usize = 384;
const WORDS: &[&str] = &[
    "ownership", "borrow", "lifetime", "trait", "async", "mutex", "channel", "closure", "generic",
    "pattern",
];

fn seed_storage(n: usize) -> Storage {
    let storage = Storage::open_in_memory(n + 1).unwrap();
    for i in 0..n {
        let text = format!(
            "{} {} discussion {}",
            WORDS[i % WORDS.len()],
            WORDS[(i * 7) % WORDS.len()],
            i
        );
        let mut node = Node::new(NodeType::Episode, text.into_bytes(), 0);
        let raw: Vec<f32> = (0..DIM).map(|d| ((i * 31 + d) as f32 * 0.017).sin()).collect();
        node.nu = Some(Vector(raw).fit_to_dim(DIM));
        storage.insert(node).unwrap();
    }
    storage
}

fn bench_dense_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_dense");
    for size in [100usize, 1_000, 10_000] {
        let storage = seed_storage(size);
        let query = Vector((0..DIM).map(|d| (d as f32 * 0.013).cos()).collect()).fit_to_dim(DIM);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| storage.search_dense(&query, 10).unwrap());
        });
    }
    group.finish();
}

fn bench_sparse_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_sparse");
    for size in [100usize, 1_000, 10_000] {
        let storage = seed_storage(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| storage.search_sparse("ownership borrow lifetime", 10));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dense_search, bench_sparse_search);
criterion_main!(benches);
