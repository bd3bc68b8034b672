//! # Node Store
//!
//! The storage collaborator consumed by the engine.
//!
//! This module defines the `NodeStore` trait and its in-memory
//! implementation. All data structures use `BTreeMap` for deterministic
//! ordering.

use crate::{CastError, Character, CharacterId, NewCharacter, WorkId};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

// =============================================================================
// NODESTORE TRAIT
// =============================================================================

/// Durable lookup and save of characters.
///
/// Methods take `&self` so one store can serve concurrent requests; the
/// engine serializes conflicting mutations itself (see `locks`).
///
/// All fallible operations return `Result<T, CastError>` so in-memory and
/// persistent backends behave uniformly.
pub trait NodeStore: Send + Sync {
    /// Fetch a point-in-time copy of a character.
    fn get_character(&self, id: CharacterId) -> Result<Option<Character>, CastError>;

    /// Overwrite an existing character record.
    ///
    /// Fails with `CharacterNotFound` if the character was deleted.
    fn save_character(&self, character: &Character) -> Result<(), CastError>;

    /// Save two characters as one unit.
    ///
    /// The default implementation is two sequential saves and is only atomic
    /// for backends that override it and report `supports_transactions`.
    fn save_pair(&self, first: &Character, second: &Character) -> Result<(), CastError> {
        self.save_character(first)?;
        self.save_character(second)
    }

    /// Whether `save_pair` and `delete_edges_referencing` are atomic.
    fn supports_transactions(&self) -> bool {
        false
    }

    /// All characters of a work, in identifier order.
    fn find_by_work(&self, work: WorkId) -> Result<Vec<Character>, CastError>;

    /// Remove every edge that targets `id` from the other characters of its
    /// work, and clear `id`'s own edge list. Returns the number of edges
    /// removed.
    fn delete_edges_referencing(&self, id: CharacterId) -> Result<usize, CastError>;

    /// Create a character with a store-assigned identifier.
    fn insert_character(&self, draft: NewCharacter) -> Result<Character, CastError>;

    /// Delete a character record. Returns whether it existed.
    fn delete_character(&self, id: CharacterId) -> Result<bool, CastError>;

    /// Total number of characters.
    fn character_count(&self) -> Result<usize, CastError>;

    /// Total number of stored edges, mirrors included.
    fn edge_count(&self) -> Result<usize, CastError>;
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

#[derive(Debug, Default)]
struct MemoryState {
    characters: BTreeMap<CharacterId, Character>,
    next_character_id: u64,
}

/// In-memory node store.
///
/// Every operation runs under one `RwLock`, so pair saves and purges are
/// atomic and the store reports `supports_transactions`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load characters with their existing identifiers.
    ///
    /// Used to seed a store from a snapshot; identifier assignment resumes
    /// after the highest imported id.
    #[must_use]
    pub fn with_characters(characters: impl IntoIterator<Item = Character>) -> Self {
        let mut state = MemoryState::default();
        for character in characters {
            if character.id.0 >= state.next_character_id {
                state.next_character_id = character.id.0.saturating_add(1);
            }
            state.characters.insert(character.id, character);
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// Every character in identifier order.
    pub fn characters(&self) -> Vec<Character> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.characters.values().cloned().collect()
    }
}

impl NodeStore for MemoryStore {
    fn get_character(&self, id: CharacterId) -> Result<Option<Character>, CastError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.characters.get(&id).cloned())
    }

    fn save_character(&self, character: &Character) -> Result<(), CastError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.characters.get_mut(&character.id) {
            Some(slot) => {
                *slot = character.clone();
                Ok(())
            }
            None => Err(CastError::CharacterNotFound(character.id)),
        }
    }

    fn save_pair(&self, first: &Character, second: &Character) -> Result<(), CastError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for character in [first, second] {
            if !state.characters.contains_key(&character.id) {
                return Err(CastError::CharacterNotFound(character.id));
            }
        }
        state.characters.insert(first.id, first.clone());
        state.characters.insert(second.id, second.clone());
        Ok(())
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn find_by_work(&self, work: WorkId) -> Result<Vec<Character>, CastError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .characters
            .values()
            .filter(|character| character.work == work)
            .cloned()
            .collect())
    }

    fn delete_edges_referencing(&self, id: CharacterId) -> Result<usize, CastError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let Some(work) = state.characters.get(&id).map(|c| c.work) else {
            return Err(CastError::CharacterNotFound(id));
        };

        let mut removed = 0usize;
        for character in state.characters.values_mut() {
            if character.id == id {
                removed = removed.saturating_add(character.relationships.len());
                character.relationships.clear();
            } else if character.work == work {
                removed = removed.saturating_add(character.drop_edges_to(id));
            }
        }
        Ok(removed)
    }

    fn insert_character(&self, draft: NewCharacter) -> Result<Character, CastError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let id = CharacterId(state.next_character_id);
        state.next_character_id = state.next_character_id.saturating_add(1);

        let character = Character::from_draft(id, draft);
        state.characters.insert(id, character.clone());
        Ok(character)
    }

    fn delete_character(&self, id: CharacterId) -> Result<bool, CastError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        Ok(state.characters.remove(&id).is_some())
    }

    fn character_count(&self) -> Result<usize, CastError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.characters.len())
    }

    fn edge_count(&self) -> Result<usize, CastError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .characters
            .values()
            .map(|character| character.relationships.len())
            .sum())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EdgeDraft, Intensity, RelationshipStatus, RelationshipType};

    fn edge_to(target: CharacterId) -> EdgeDraft {
        EdgeDraft {
            target,
            kind: RelationshipType::Friendship,
            description: String::new(),
            status: RelationshipStatus::Active,
            is_directional: false,
            intensity: Intensity::default(),
        }
    }

    #[test]
    fn insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let a = store
            .insert_character(NewCharacter::new(WorkId(1), "Alice"))
            .expect("insert");
        let b = store
            .insert_character(NewCharacter::new(WorkId(1), "Bob"))
            .expect("insert");

        assert_eq!(a.id, CharacterId(0));
        assert_eq!(b.id, CharacterId(1));
        assert_eq!(store.character_count().expect("count"), 2);
    }

    #[test]
    fn save_missing_character_fails() {
        let store = MemoryStore::new();
        let ghost = Character::from_draft(CharacterId(9), NewCharacter::new(WorkId(1), "Ghost"));

        let result = store.save_character(&ghost);
        assert!(matches!(result, Err(CastError::CharacterNotFound(_))));
    }

    #[test]
    fn save_pair_is_all_or_nothing() {
        let store = MemoryStore::new();
        let mut a = store
            .insert_character(NewCharacter::new(WorkId(1), "Alice"))
            .expect("insert");
        let ghost = Character::from_draft(CharacterId(9), NewCharacter::new(WorkId(1), "Ghost"));

        a.push_edge(edge_to(ghost.id));
        assert!(store.save_pair(&a, &ghost).is_err());

        let stored = store.get_character(a.id).expect("get").expect("exists");
        assert!(stored.relationships.is_empty());
    }

    #[test]
    fn find_by_work_filters() {
        let store = MemoryStore::new();
        store
            .insert_character(NewCharacter::new(WorkId(1), "Alice"))
            .expect("insert");
        store
            .insert_character(NewCharacter::new(WorkId(2), "Zed"))
            .expect("insert");

        let cast = store.find_by_work(WorkId(1)).expect("find");
        assert_eq!(cast.len(), 1);
        assert_eq!(cast[0].name, "Alice");
    }

    #[test]
    fn delete_edges_referencing_strips_both_directions() {
        let store = MemoryStore::new();
        let mut a = store
            .insert_character(NewCharacter::new(WorkId(1), "Alice"))
            .expect("insert");
        let mut b = store
            .insert_character(NewCharacter::new(WorkId(1), "Bob"))
            .expect("insert");
        a.push_edge(edge_to(b.id));
        b.push_edge(edge_to(a.id));
        store.save_pair(&a, &b).expect("save");

        let removed = store.delete_edges_referencing(b.id).expect("purge");

        assert_eq!(removed, 2);
        assert_eq!(store.edge_count().expect("count"), 0);
    }

    #[test]
    fn with_characters_resumes_id_assignment() {
        let seeded = Character::from_draft(CharacterId(7), NewCharacter::new(WorkId(1), "Seed"));
        let store = MemoryStore::with_characters([seeded]);

        let next = store
            .insert_character(NewCharacter::new(WorkId(1), "Next"))
            .expect("insert");
        assert_eq!(next.id, CharacterId(8));
    }
}
