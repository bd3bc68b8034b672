//! # Traversal Primitives
//!
//! Helpers shared by the breadth-first readers (`network`, `path`).

use crate::store::NodeStore;
use crate::{CastError, Character, CharacterId};
use std::collections::BTreeSet;

/// Load a character or fail with `CharacterNotFound`.
pub(crate) fn load_required<S: NodeStore + ?Sized>(
    store: &S,
    id: CharacterId,
) -> Result<Character, CastError> {
    store
        .get_character(id)?
        .ok_or(CastError::CharacterNotFound(id))
}

/// Distinct edge targets of a character, in stored edge order.
///
/// A pair related by several types yields the target once, at the position
/// of its first edge, so BFS discovery order follows insertion order.
pub(crate) fn neighbors(character: &Character) -> Vec<CharacterId> {
    let mut seen = BTreeSet::new();
    character
        .relationships
        .iter()
        .map(|edge| edge.target)
        .filter(|target| seen.insert(*target))
        .collect()
}
