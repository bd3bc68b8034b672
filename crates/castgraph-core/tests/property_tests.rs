//! # Property-Based Tests
//!
//! Random mutation sequences must never break the edge invariants, and the
//! two breadth-first readers must agree on distances.

use castgraph_core::{
    CancelToken, CastGraph, Character, CharacterId, NewCharacter, NewRelationship,
    RelationshipType, WorkId,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;

const CAST_SIZE: usize = 6;

#[derive(Debug, Clone)]
enum Op {
    Add {
        source: usize,
        target: usize,
        kind: usize,
        directional: bool,
    },
    Remove {
        source: usize,
        edge: usize,
    },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..CAST_SIZE, 0..CAST_SIZE, 0usize..3, any::<bool>()).prop_map(
            |(source, target, kind, directional)| Op::Add {
                source,
                target,
                kind,
                directional,
            }
        ),
        1 => (0..CAST_SIZE, 0usize..8).prop_map(|(source, edge)| Op::Remove { source, edge }),
    ]
}

fn build(ops: &[Op]) -> (CastGraph, Vec<CharacterId>) {
    let engine = CastGraph::new();
    let ids: Vec<CharacterId> = (0..CAST_SIZE)
        .map(|i| {
            engine
                .create_character(NewCharacter::new(WorkId(1), format!("C{}", i)))
                .expect("create")
                .id
        })
        .collect();

    for op in ops {
        match *op {
            Op::Add {
                source,
                target,
                kind,
                directional,
            } => {
                // Rejections are expected; only the invariants matter.
                let _ = engine.add_relationship(
                    NewRelationship::new(ids[source], ids[target], RelationshipType::ALL[kind], "")
                        .directional(directional),
                );
            }
            Op::Remove { source, edge } => {
                let node = engine.get_character(ids[source]).expect("get");
                if node.relationships.is_empty() {
                    continue;
                }
                let edge_id = node.relationships[edge % node.relationships.len()].id;
                engine
                    .remove_relationship(ids[source], edge_id)
                    .expect("remove existing edge");
            }
        }
    }
    (engine, ids)
}

fn snapshot(engine: &CastGraph, ids: &[CharacterId]) -> Vec<Character> {
    ids.iter()
        .map(|id| engine.get_character(*id).expect("get"))
        .collect()
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Every non-directional edge has exactly one mirror on its target.
    #[test]
    fn symmetric_edges_stay_mirrored(ops in vec(op_strategy(), 1..60)) {
        let (engine, ids) = build(&ops);
        let cast = snapshot(&engine, &ids);

        for owner in &cast {
            for edge in owner.relationships.iter().filter(|e| !e.is_directional) {
                let target = cast.iter().find(|c| c.id == edge.target);
                prop_assert!(target.is_some());
                let mirrors = target
                    .map(|t| t.relationships.iter().filter(|e| e.mirrors(owner.id, edge)).count())
                    .unwrap_or_default();
                prop_assert_eq!(mirrors, 1);
            }
        }
    }

    /// No self-loops and no duplicate `(target, type)` pairs.
    #[test]
    fn no_self_loops_or_duplicates(ops in vec(op_strategy(), 1..60)) {
        let (engine, ids) = build(&ops);

        for owner in snapshot(&engine, &ids) {
            let mut seen = BTreeSet::new();
            for edge in &owner.relationships {
                prop_assert_ne!(edge.target, owner.id);
                prop_assert!(seen.insert((edge.target, edge.kind)));
            }
        }
    }

    /// Stats totals always match the stored edge lists.
    #[test]
    fn stats_match_edge_lists(ops in vec(op_strategy(), 1..60)) {
        let (engine, ids) = build(&ops);

        let mut total = 0usize;
        for id in &ids {
            let stats = engine.compute_stats(*id).expect("stats");
            let edges = engine.get_character(*id).expect("get").relationships.len();
            prop_assert_eq!(stats.total_relationships, edges);
            prop_assert_eq!(stats.by_type.values().sum::<usize>(), edges);
            total += edges;
        }
        prop_assert_eq!(engine.edge_count().expect("count"), total);
    }

    /// Shortest-path degrees equal the depth at which network expansion
    /// first reaches the target.
    #[test]
    fn path_and_network_agree(ops in vec(op_strategy(), 1..60), from in 0..CAST_SIZE, to in 0..CAST_SIZE) {
        let (engine, ids) = build(&ops);
        let token = CancelToken::new();

        let outcome = engine
            .find_shortest_path(ids[from], ids[to], &token)
            .expect("path");
        let network = engine
            .expand_network(ids[from], Some(CAST_SIZE as i64), &token)
            .expect("expand");

        prop_assert_eq!(outcome.degrees(), network.depth_of(ids[to]));
    }

    /// Same operations produce the same graph.
    #[test]
    fn replay_is_deterministic(ops in vec(op_strategy(), 1..40)) {
        let (first, ids) = build(&ops);
        let (second, _) = build(&ops);

        prop_assert_eq!(snapshot(&first, &ids), snapshot(&second, &ids));
    }
}
