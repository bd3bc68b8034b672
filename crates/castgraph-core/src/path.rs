//! # Shortest Path Finder
//!
//! Unweighted BFS shortest path ("degrees of separation") between two
//! characters of the same work.

use crate::cancel::CancelToken;
use crate::store::NodeStore;
use crate::traversal::{load_required, neighbors};
use crate::{CastError, CharacterId, CharacterSummary};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A path found between two characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub source: CharacterSummary,
    pub target: CharacterSummary,
    /// Number of hops; `path.len() - 1`.
    pub degrees: usize,
    /// Characters from source to target, both inclusive.
    pub path: Vec<CharacterSummary>,
}

/// Result of a shortest-path query.
///
/// An unreachable target is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PathOutcome {
    Connected(Connection),
    NoConnection {
        source: CharacterSummary,
        target: CharacterSummary,
    },
}

impl PathOutcome {
    /// Hop count, if connected.
    #[must_use]
    pub fn degrees(&self) -> Option<usize> {
        match self {
            Self::Connected(connection) => Some(connection.degrees),
            Self::NoConnection { .. } => None,
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

/// Breadth-first reader computing shortest paths.
pub struct ShortestPathFinder<'a, S: NodeStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: NodeStore + ?Sized> ShortestPathFinder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Find the shortest path from `source_id` to `target_id`.
    ///
    /// Only characters of the source's work are entered. Neighbours are
    /// visited in stored edge order and the first discovered parent wins,
    /// so ties resolve to the first path BFS finds.
    pub fn find_shortest_path(
        &self,
        source_id: CharacterId,
        target_id: CharacterId,
        cancel: &CancelToken,
    ) -> Result<PathOutcome, CastError> {
        let source = load_required(self.store, source_id)?;
        let target = load_required(self.store, target_id)?;

        if source.work != target.work {
            return Err(CastError::GroupMismatch {
                source_work: source.work,
                target_work: target.work,
            });
        }

        if source.id == target.id {
            let summary = source.summary();
            return Ok(PathOutcome::Connected(Connection {
                source: summary.clone(),
                target: summary.clone(),
                degrees: 0,
                path: vec![summary],
            }));
        }

        let work = source.work;
        let mut summaries = BTreeMap::from([(source.id, source.summary())]);
        let mut parents: BTreeMap<CharacterId, CharacterId> = BTreeMap::new();
        let mut visited = BTreeSet::from([source.id]);
        let mut queue = VecDeque::from([source.clone()]);

        while let Some(current) = queue.pop_front() {
            cancel.check()?;

            for next in neighbors(&current) {
                if !visited.insert(next) {
                    continue;
                }
                let Some(node) = self.store.get_character(next)? else {
                    continue;
                };
                if node.work != work {
                    continue;
                }

                parents.insert(next, current.id);
                summaries.insert(next, node.summary());

                if next == target.id {
                    let path = trace_back(target.id, &parents, &summaries)?;
                    let degrees = path.len().saturating_sub(1);
                    tracing::debug!(
                        source = %source_id,
                        target = %target_id,
                        degrees,
                        "path found"
                    );
                    return Ok(PathOutcome::Connected(Connection {
                        source: source.summary(),
                        target: target.summary(),
                        degrees,
                        path,
                    }));
                }
                queue.push_back(node);
            }
        }

        tracing::debug!(source = %source_id, target = %target_id, "no connection");
        Ok(PathOutcome::NoConnection {
            source: source.summary(),
            target: target.summary(),
        })
    }
}

/// Walk the parent map from `end` back to the BFS root.
fn trace_back(
    end: CharacterId,
    parents: &BTreeMap<CharacterId, CharacterId>,
    summaries: &BTreeMap<CharacterId, CharacterSummary>,
) -> Result<Vec<CharacterSummary>, CastError> {
    let mut path = Vec::new();
    let mut cursor = Some(end);
    while let Some(id) = cursor {
        let summary = summaries.get(&id).cloned().ok_or_else(|| {
            CastError::ConsistencyFault(format!("path reconstruction lost character {}", id))
        })?;
        path.push(summary);
        cursor = parents.get(&id).copied();
    }
    path.reverse();
    Ok(path)
}

// =============================================================================
// TESTS
// =============================================================================
