//! # Cast Graph Engine
//!
//! The facade wiring a `NodeStore`, the node lock table and the
//! relationship components together.
//!
//! ## Storage Backends
//!
//! `CastGraph` is generic over its store and defaults to `StorageBackend`:
//! - `InMemory`: `MemoryStore` (fast, volatile)
//! - `Persistent`: `RedbStore` (disk-backed, transactional)

use crate::cancel::CancelToken;
use crate::locks::NodeLocks;
use crate::network::{Network, NetworkExpander};
use crate::path::{PathOutcome, ShortestPathFinder};
use crate::primitives::{MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH};
use crate::relationship::{NewRelationship, RelationshipManager, RemovalReport};
use crate::stats::{CharacterStats, RelatedCharacters, RelationshipStats};
use crate::storage::RedbStore;
use crate::store::{MemoryStore, NodeStore};
use crate::traversal::load_required;
use crate::{CastError, Character, CharacterId, EdgeId, NewCharacter, RelationshipType, WorkId};
use std::path::Path;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend for a `CastGraph`.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    fn inner(&self) -> &dyn NodeStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }
}

impl NodeStore for StorageBackend {
    fn get_character(&self, id: CharacterId) -> Result<Option<Character>, CastError> {
        self.inner().get_character(id)
    }

    fn save_character(&self, character: &Character) -> Result<(), CastError> {
        self.inner().save_character(character)
    }

    fn save_pair(&self, first: &Character, second: &Character) -> Result<(), CastError> {
        self.inner().save_pair(first, second)
    }

    fn supports_transactions(&self) -> bool {
        self.inner().supports_transactions()
    }

    fn find_by_work(&self, work: WorkId) -> Result<Vec<Character>, CastError> {
        self.inner().find_by_work(work)
    }

    fn delete_edges_referencing(&self, id: CharacterId) -> Result<usize, CastError> {
        self.inner().delete_edges_referencing(id)
    }

    fn insert_character(&self, draft: NewCharacter) -> Result<Character, CastError> {
        self.inner().insert_character(draft)
    }

    fn delete_character(&self, id: CharacterId) -> Result<bool, CastError> {
        self.inner().delete_character(id)
    }

    fn character_count(&self) -> Result<usize, CastError> {
        self.inner().character_count()
    }

    fn edge_count(&self) -> Result<usize, CastError> {
        self.inner().edge_count()
    }
}

// =============================================================================
// CAST GRAPH
// =============================================================================

/// A relationship graph over a node store.
///
/// All methods take `&self`; a `CastGraph` can be shared between threads
/// (e.g. behind an `Arc`) and serializes conflicting mutations internally.
#[derive(Debug, Default)]
pub struct CastGraph<S: NodeStore = StorageBackend> {
    store: S,
    locks: NodeLocks,
}

impl CastGraph<StorageBackend> {
    /// Create an engine with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, CastError> {
        Ok(Self::with_store(StorageBackend::Persistent(RedbStore::open(
            path,
        )?)))
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.store, StorageBackend::Persistent(_))
    }
}

impl<S: NodeStore> CastGraph<S> {
    /// Create an engine over any store.
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            locks: NodeLocks::new(),
        }
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn relationships(&self) -> RelationshipManager<'_, S> {
        RelationshipManager::new(&self.store, &self.locks)
    }

    // =========================================================================
    // CHARACTERS
    // =========================================================================

    /// Create a character with no relationships.
    pub fn create_character(&self, draft: NewCharacter) -> Result<Character, CastError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(CastError::InvalidArgument(
                "character name must not be empty".to_string(),
            ));
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(CastError::InvalidArgument(format!(
                "name length {} exceeds maximum {} bytes",
                name.len(),
                MAX_NAME_LENGTH
            )));
        }
        if let Some(description) = &draft.description
            && description.len() > MAX_DESCRIPTION_LENGTH
        {
            return Err(CastError::InvalidArgument(format!(
                "description length {} exceeds maximum {} bytes",
                description.len(),
                MAX_DESCRIPTION_LENGTH
            )));
        }

        let draft = NewCharacter {
            name: name.to_string(),
            ..draft
        };
        let character = self.store.insert_character(draft)?;
        tracing::debug!(character = %character.id, work = %character.work, "character created");
        Ok(character)
    }

    /// Fetch a character with its edges.
    pub fn get_character(&self, id: CharacterId) -> Result<Character, CastError> {
        load_required(&self.store, id)
    }

    /// Every character of a work, in identifier order.
    pub fn cast_of(&self, work: WorkId) -> Result<Vec<Character>, CastError> {
        self.store.find_by_work(work)
    }

    /// Delete a character after purging every edge that references it.
    ///
    /// Returns the number of edges removed.
    pub fn delete_character(&self, id: CharacterId) -> Result<usize, CastError> {
        self.relationships().delete_character(id)
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// See [`RelationshipManager::add_relationship`].
    pub fn add_relationship(&self, request: NewRelationship) -> Result<Character, CastError> {
        self.relationships().add_relationship(request)
    }

    /// See [`RelationshipManager::remove_relationship`].
    pub fn remove_relationship(
        &self,
        source: CharacterId,
        edge: EdgeId,
    ) -> Result<RemovalReport, CastError> {
        self.relationships().remove_relationship(source, edge)
    }

    /// See [`RelationshipManager::purge_references`].
    pub fn purge_references(&self, id: CharacterId) -> Result<usize, CastError> {
        self.relationships().purge_references(id)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// See [`NetworkExpander::expand_network`].
    pub fn expand_network(
        &self,
        root: CharacterId,
        max_depth: Option<i64>,
        cancel: &CancelToken,
    ) -> Result<Network, CastError> {
        NetworkExpander::new(&self.store).expand_network(root, max_depth, cancel)
    }

    /// See [`ShortestPathFinder::find_shortest_path`].
    pub fn find_shortest_path(
        &self,
        source: CharacterId,
        target: CharacterId,
        cancel: &CancelToken,
    ) -> Result<PathOutcome, CastError> {
        ShortestPathFinder::new(&self.store).find_shortest_path(source, target, cancel)
    }

    /// See [`RelationshipStats::compute_stats`].
    pub fn compute_stats(&self, id: CharacterId) -> Result<CharacterStats, CastError> {
        RelationshipStats::new(&self.store).compute_stats(id)
    }

    /// See [`RelationshipStats::related_by_type`].
    pub fn related_by_type(
        &self,
        id: CharacterId,
        kind: RelationshipType,
    ) -> Result<RelatedCharacters, CastError> {
        RelationshipStats::new(&self.store).related_by_type(id, kind)
    }

    /// Total number of characters.
    pub fn character_count(&self) -> Result<usize, CastError> {
        self.store.character_count()
    }

    /// Total number of stored edges, mirrors included.
    pub fn edge_count(&self) -> Result<usize, CastError> {
        self.store.edge_count()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn new_engine_is_in_memory() {
        let engine = CastGraph::new();
        assert!(!engine.is_persistent());
        assert_eq!(engine.character_count().expect("count"), 0);
    }

    #[test]
    fn create_character_trims_and_validates_name() {
        let engine = CastGraph::new();

        let alice = engine
            .create_character(NewCharacter::new(WorkId(1), "  Alice "))
            .expect("create");
        assert_eq!(alice.name, "Alice");

        let blank = engine.create_character(NewCharacter::new(WorkId(1), "   "));
        assert!(matches!(blank, Err(CastError::InvalidArgument(_))));

        let long = engine.create_character(NewCharacter::new(WorkId(1), "x".repeat(300)));
        assert!(matches!(long, Err(CastError::InvalidArgument(_))));
    }

    #[test]
    fn facade_round_trip_on_redb() {
        let dir = TempDir::new().expect("tempdir");
        let engine = CastGraph::with_redb(dir.path().join("cast.redb")).expect("open");
        assert!(engine.is_persistent());

        let a = engine
            .create_character(NewCharacter::new(WorkId(1), "A"))
            .expect("create");
        let b = engine
            .create_character(NewCharacter::new(WorkId(1), "B"))
            .expect("create");
        engine
            .add_relationship(NewRelationship::new(
                a.id,
                b.id,
                RelationshipType::Friendship,
                "",
            ))
            .expect("add");

        assert_eq!(engine.edge_count().expect("count"), 2);
        assert_eq!(engine.cast_of(WorkId(1)).expect("cast").len(), 2);

        let outcome = engine
            .find_shortest_path(b.id, a.id, &CancelToken::new())
            .expect("path");
        assert_eq!(outcome.degrees(), Some(1));

        assert_eq!(engine.delete_character(b.id).expect("delete"), 2);
        assert!(matches!(
            engine.get_character(b.id),
            Err(CastError::CharacterNotFound(_))
        ));
        assert_eq!(engine.edge_count().expect("count"), 0);
    }
}
