//! # Graph Benchmarks
//!
//! Performance benchmarks for castgraph-core relationship operations.
//!
//! Run with: `cargo bench -p castgraph-core`

use castgraph_core::{
    CancelToken, CastGraph, CharacterId, NewCharacter, NewRelationship, RelationshipType, WorkId,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn create_cast(engine: &CastGraph, size: usize) -> Vec<CharacterId> {
    (0..size)
        .map(|i| {
            engine
                .create_character(NewCharacter::new(WorkId(1), format!("C{}", i)))
                .expect("create")
                .id
        })
        .collect()
}

/// A chain of non-directional friendships.
fn create_chain(size: usize) -> (CastGraph, Vec<CharacterId>) {
    let engine = CastGraph::new();
    let ids = create_cast(&engine, size);
    for pair in ids.windows(2) {
        engine
            .add_relationship(NewRelationship::new(
                pair[0],
                pair[1],
                RelationshipType::Friendship,
                "",
            ))
            .expect("add");
    }
    (engine, ids)
}

/// A hub related to every other character.
fn create_star(size: usize) -> (CastGraph, Vec<CharacterId>) {
    let engine = CastGraph::new();
    let ids = create_cast(&engine, size);
    for spoke in ids.iter().skip(1) {
        engine
            .add_relationship(NewRelationship::new(
                ids[0],
                *spoke,
                RelationshipType::Colleague,
                "",
            ))
            .expect("add");
    }
    (engine, ids)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_add_relationship(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_relationship");

    for size in [100, 500].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(create_chain(size)));
        });
    }

    group.finish();
}

fn bench_expand_network(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand_network");

    for size in [100, 500, 1000].iter() {
        let (engine, ids) = create_chain(*size);
        let token = CancelToken::new();

        group.bench_with_input(BenchmarkId::new("chain_depth_10", size), &ids[0], |b, &root| {
            b.iter(|| black_box(engine.expand_network(root, Some(10), &token)));
        });

        let (star, star_ids) = create_star(*size);
        group.bench_with_input(BenchmarkId::new("star_depth_2", size), &star_ids[1], |b, &root| {
            b.iter(|| black_box(star.expand_network(root, None, &token)));
        });
    }

    group.finish();
}

fn bench_shortest_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("shortest_path");

    for size in [100, 500, 1000].iter() {
        let (engine, ids) = create_chain(*size);
        let token = CancelToken::new();
        let ends = (ids[0], ids[*size - 1]);

        group.bench_with_input(BenchmarkId::from_parameter(size), &ends, |b, &(from, to)| {
            b.iter(|| black_box(engine.find_shortest_path(from, to, &token)));
        });
    }

    group.finish();
}

fn bench_compute_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_stats");

    for size in [100, 1000].iter() {
        let (engine, ids) = create_star(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &ids[0], |b, &hub| {
            b.iter(|| black_box(engine.compute_stats(hub)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_add_relationship,
    bench_expand_network,
    bench_shortest_path,
    bench_compute_stats,
);
criterion_main!(benches);
