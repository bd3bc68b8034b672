//! # Relationship Stats
//!
//! Per-character aggregation of outgoing edges by relationship type.

use crate::store::NodeStore;
use crate::traversal::load_required;
use crate::{
    CastError, CharacterId, CharacterSummary, Intensity, RelationshipStatus, RelationshipType,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Edge totals of one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterStats {
    pub character: CharacterSummary,
    pub total_relationships: usize,
    /// Only types with at least one edge appear.
    pub by_type: BTreeMap<RelationshipType, usize>,
}

/// One outgoing edge of a given type, resolved to its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedCharacter {
    pub character: CharacterSummary,
    pub kind: RelationshipType,
    pub description: String,
    pub status: RelationshipStatus,
    pub intensity: Intensity,
}

/// Characters reached from one character through a single relationship type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedCharacters {
    pub character: CharacterSummary,
    pub kind: RelationshipType,
    pub related: Vec<RelatedCharacter>,
}

/// Read-only aggregation over a character's edge list.
pub struct RelationshipStats<'a, S: NodeStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: NodeStore + ?Sized> RelationshipStats<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Count a character's outgoing edges, grouped by type.
    pub fn compute_stats(&self, id: CharacterId) -> Result<CharacterStats, CastError> {
        let character = load_required(self.store, id)?;

        let mut by_type: BTreeMap<RelationshipType, usize> = BTreeMap::new();
        for edge in &character.relationships {
            let count = by_type.entry(edge.kind).or_insert(0);
            *count = count.saturating_add(1);
        }

        Ok(CharacterStats {
            character: character.summary(),
            total_relationships: character.relationships.len(),
            by_type,
        })
    }

    /// Resolve every outgoing edge of type `kind`, in edge order.
    ///
    /// Edges whose target no longer exists are skipped.
    pub fn related_by_type(
        &self,
        id: CharacterId,
        kind: RelationshipType,
    ) -> Result<RelatedCharacters, CastError> {
        let character = load_required(self.store, id)?;

        let mut related = Vec::new();
        for edge in character.relationships.iter().filter(|e| e.kind == kind) {
            match self.store.get_character(edge.target)? {
                Some(target) => related.push(RelatedCharacter {
                    character: target.summary(),
                    kind: edge.kind,
                    description: edge.description.clone(),
                    status: edge.status,
                    intensity: edge.intensity,
                }),
                None => {
                    tracing::debug!(character = %id, target = %edge.target, "skipping dangling edge");
                }
            }
        }

        Ok(RelatedCharacters {
            character: character.summary(),
            kind,
            related,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
