use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use hybrag_core::candidate::{CandidateList, SourceKind, SourceLists};
use hybrag_core::fusion::{explain, fuse};
use hybrag_core::weights::WeightConfig;

/// Pool sizes a hybrid call sees for `top_k` 5, 50, and 500 with the default
/// multiplier.
const POOLS: [usize; 3] = [10, 100, 1000];

/// Overlapping synthetic lists: each source sees about two thirds of the pool.
fn synthetic_lists(pool: usize) -> SourceLists {
    let list = |kind: SourceKind, offset: usize, scale: f64| {
        let pairs = (0..pool).map(|i| {
            let id = (i * 3 + offset) % (pool + pool / 2);
            let score = ((i * 7919 + offset) % 1000) as f64 / 1000.0 * scale;
            (format!("doc-{id:06}"), score)
        });
        let mut seen = std::collections::HashSet::new();
        let unique: Vec<_> = pairs.filter(|(id, _)| seen.insert(id.clone())).collect();
        CandidateList::from_pairs(kind, unique).expect("synthetic ids are unique")
    };

    SourceLists::new()
        .with(list(SourceKind::Vector, 0, 2.0))
        .with(list(SourceKind::Fulltext, 1, 40.0))
        .with(list(SourceKind::Semantic, 2, 1.0))
}

fn bench_fusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("fusion");
    let weights = WeightConfig::default();

    for pool in POOLS {
        let lists = synthetic_lists(pool);
        let top_k = pool / 2;
        group.throughput(Throughput::Elements(lists.distinct_doc_count() as u64));

        group.bench_with_input(BenchmarkId::new("fuse", pool), &lists, |b, lists| {
            b.iter(|| black_box(fuse(lists, &weights, top_k)));
        });

        group.bench_with_input(BenchmarkId::new("explain", pool), &lists, |b, lists| {
            b.iter(|| black_box(explain("bench", lists, &weights, top_k)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fusion);
criterion_main!(benches);
