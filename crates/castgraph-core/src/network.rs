//! # Network Expander
//!
//! Bounded-depth breadth-first expansion from a root character.
//!
//! - Edges are followed in their stored direction only; non-directional
//!   relationships are reachable both ways through their stored mirrors
//! - Each character is visited once, at its shallowest depth
//! - Expansion stops at the requested depth, capped by `MAX_TRAVERSAL_DEPTH`

use crate::cancel::CancelToken;
use crate::primitives::{DEFAULT_NETWORK_DEPTH, MAX_TRAVERSAL_DEPTH};
use crate::store::NodeStore;
use crate::traversal::{load_required, neighbors};
use crate::{CastError, Character, CharacterId, RelationshipEdge};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

/// Resolve a caller-supplied depth.
///
/// `None` and zero mean `DEFAULT_NETWORK_DEPTH`; values above
/// `MAX_TRAVERSAL_DEPTH` are clamped. Negative depths are rejected with
/// `InvalidArgument`.
pub fn resolve_depth(requested: Option<i64>) -> Result<usize, CastError> {
    match requested {
        None | Some(0) => Ok(DEFAULT_NETWORK_DEPTH),
        Some(depth) if depth < 0 => Err(CastError::InvalidArgument(format!(
            "max depth must not be negative, got {}",
            depth
        ))),
        Some(depth) => Ok(usize::try_from(depth)
            .unwrap_or(MAX_TRAVERSAL_DEPTH)
            .min(MAX_TRAVERSAL_DEPTH)),
    }
}

/// A character discovered by expansion, with its hop count from the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMember {
    pub character: Character,
    pub depth: usize,
}

/// Result of a network expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub root: Character,
    /// Discovered characters in BFS order, root excluded.
    pub members: Vec<NetworkMember>,
    /// The depth bound actually applied.
    pub max_depth: usize,
}

impl Network {
    /// Whether a character is the root or one of the members.
    #[must_use]
    pub fn contains(&self, id: CharacterId) -> bool {
        self.root.id == id || self.members.iter().any(|m| m.character.id == id)
    }

    /// Depth of a character in this network (root = 0).
    #[must_use]
    pub fn depth_of(&self, id: CharacterId) -> Option<usize> {
        if self.root.id == id {
            return Some(0);
        }
        self.members
            .iter()
            .find(|m| m.character.id == id)
            .map(|m| m.depth)
    }

    /// Edges whose two endpoints are both inside the network, as
    /// `(owner, edge)` pairs.
    pub fn internal_edges(&self) -> impl Iterator<Item = (CharacterId, &RelationshipEdge)> + '_ {
        let ids: BTreeSet<CharacterId> = std::iter::once(self.root.id)
            .chain(self.members.iter().map(|m| m.character.id))
            .collect();
        std::iter::once(&self.root)
            .chain(self.members.iter().map(|m| &m.character))
            .flat_map(|character| {
                character
                    .relationships
                    .iter()
                    .map(move |edge| (character.id, edge))
            })
            .filter(move |(_, edge)| ids.contains(&edge.target))
    }
}

/// Breadth-first reader producing bounded networks.
pub struct NetworkExpander<'a, S: NodeStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: NodeStore + ?Sized> NetworkExpander<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Expand the network around `root_id`.
    ///
    /// Edge targets that no longer resolve are skipped. Fails with
    /// `Cancelled` if `cancel` fires before the traversal completes.
    pub fn expand_network(
        &self,
        root_id: CharacterId,
        max_depth: Option<i64>,
        cancel: &CancelToken,
    ) -> Result<Network, CastError> {
        let max_depth = resolve_depth(max_depth)?;
        let root = load_required(self.store, root_id)?;

        let mut members: Vec<NetworkMember> = Vec::new();
        let mut visited = BTreeSet::from([root.id]);
        // `None` is the root, `Some(i)` is `members[i]`.
        let mut queue: VecDeque<(Option<usize>, usize)> = VecDeque::from([(None, 0)]);

        while let Some((slot, depth)) = queue.pop_front() {
            cancel.check()?;

            if depth >= max_depth {
                continue;
            }

            let current = match slot {
                None => &root,
                Some(index) => &members[index].character,
            };

            for target in neighbors(current) {
                if !visited.insert(target) {
                    continue;
                }
                let Some(character) = self.store.get_character(target)? else {
                    tracing::debug!(root = %root_id, target = %target, "skipping dangling edge");
                    continue;
                };
                let next_depth = depth.saturating_add(1);
                members.push(NetworkMember {
                    character,
                    depth: next_depth,
                });
                queue.push_back((Some(members.len() - 1), next_depth));
            }
        }

        tracing::debug!(
            root = %root_id,
            max_depth,
            members = members.len(),
            "network expanded"
        );

        Ok(Network {
            root,
            members,
            max_depth,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
