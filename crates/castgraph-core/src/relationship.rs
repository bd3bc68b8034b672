//! # Relationship Manager
//!
//! The only component that mutates relationship edges.
//!
//! Every mutation:
//! - Locks every character it will rewrite before reading them
//! - Validates against the locked snapshot (no self-loops, same work,
//!   no duplicate `(target, type)` pair)
//! - Applies both sides of a non-directional pair as one unit: a single
//!   `save_pair` when the store is transactional, otherwise primary save,
//!   mirror save, and restoration of the primary if the mirror fails

use crate::locks::NodeLocks;
use crate::primitives::{MAX_DESCRIPTION_LENGTH, MAX_EDGES_PER_CHARACTER, ROLLBACK_ATTEMPTS};
use crate::store::NodeStore;
use crate::traversal::load_required;
use crate::{
    CastError, Character, CharacterId, EdgeDraft, EdgeId, Intensity, RelationshipEdge,
    RelationshipStatus, RelationshipType,
};
use std::collections::BTreeSet;

// =============================================================================
// REQUESTS & REPORTS
// =============================================================================

/// Parameters of an AddRelationship call.
///
/// Optional fields fall back to the documented defaults: status `active`,
/// non-directional, intensity 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelationship {
    pub source: CharacterId,
    pub target: CharacterId,
    pub kind: RelationshipType,
    pub description: String,
    pub status: Option<RelationshipStatus>,
    pub is_directional: Option<bool>,
    pub intensity: Option<u8>,
}

impl NewRelationship {
    /// A non-directional, active relationship of default intensity.
    #[must_use]
    pub fn new(
        source: CharacterId,
        target: CharacterId,
        kind: RelationshipType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            source,
            target,
            kind,
            description: description.into(),
            status: None,
            is_directional: None,
            intensity: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: RelationshipStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn directional(mut self, is_directional: bool) -> Self {
        self.is_directional = Some(is_directional);
        self
    }

    #[must_use]
    pub fn with_intensity(mut self, intensity: u8) -> Self {
        self.intensity = Some(intensity);
        self
    }
}

/// Outcome of a RemoveRelationship call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalReport {
    /// The source character after the removal.
    pub source: Character,
    /// The edge that was removed from the source.
    pub removed: RelationshipEdge,
    /// Whether a mirror edge was found and removed from the target.
    pub mirror_removed: bool,
    /// Pre-existing inconsistencies that were tolerated.
    pub warnings: Vec<String>,
}

// =============================================================================
// RELATIONSHIP MANAGER
// =============================================================================

/// Validates and applies edge mutations on one or two characters.
pub struct RelationshipManager<'a, S: NodeStore + ?Sized> {
    store: &'a S,
    locks: &'a NodeLocks,
}

impl<'a, S: NodeStore + ?Sized> RelationshipManager<'a, S> {
    /// Create a manager over a store and the lock table guarding it.
    pub fn new(store: &'a S, locks: &'a NodeLocks) -> Self {
        Self { store, locks }
    }

    /// Add a relationship from `request.source` to `request.target`.
    ///
    /// Non-directional relationships also get a mirror edge on the target.
    /// Returns the updated source character.
    pub fn add_relationship(&self, request: NewRelationship) -> Result<Character, CastError> {
        if request.source == request.target {
            return Err(CastError::InvalidArgument(format!(
                "character {} cannot be related to itself",
                request.source
            )));
        }
        if request.description.len() > MAX_DESCRIPTION_LENGTH {
            return Err(CastError::InvalidArgument(format!(
                "description length {} exceeds maximum {} bytes",
                request.description.len(),
                MAX_DESCRIPTION_LENGTH
            )));
        }
        let intensity = match request.intensity {
            Some(value) => Intensity::new(value)?,
            None => Intensity::default(),
        };
        let status = request.status.unwrap_or_default();
        let is_directional = request.is_directional.unwrap_or(false);

        let _guard = self.locks.acquire([request.source, request.target]);

        let mut source = self.load(request.source)?;
        let mut target = self.load(request.target)?;

        if source.work != target.work {
            return Err(CastError::GroupMismatch {
                source_work: source.work,
                target_work: target.work,
            });
        }
        if source.has_edge_to(target.id, request.kind) {
            return Err(CastError::AlreadyExists {
                owner: source.id,
                target: target.id,
                kind: request.kind,
            });
        }
        if !is_directional && target.has_edge_to(source.id, request.kind) {
            return Err(CastError::AlreadyExists {
                owner: target.id,
                target: source.id,
                kind: request.kind,
            });
        }
        ensure_capacity(&source)?;
        if !is_directional {
            ensure_capacity(&target)?;
        }

        let before = source.clone();
        let edge_id = source.push_edge(EdgeDraft {
            target: target.id,
            kind: request.kind,
            description: request.description.clone(),
            status,
            is_directional,
            intensity,
        });

        if is_directional {
            self.store.save_character(&source)?;
        } else {
            target.push_edge(EdgeDraft {
                target: source.id,
                kind: request.kind,
                description: request.description,
                status,
                is_directional: false,
                intensity,
            });
            self.commit_pair(&before, &source, &target)?;
        }

        tracing::debug!(
            source = %source.id,
            target = %target.id,
            edge = %edge_id,
            kind = %request.kind,
            directional = is_directional,
            "relationship added"
        );
        Ok(source)
    }

    /// Remove edge `edge_id` from `source_id`, and its mirror if the edge
    /// was non-directional.
    ///
    /// A missing mirror is tolerated and reported through
    /// `RemovalReport::warnings`.
    pub fn remove_relationship(
        &self,
        source_id: CharacterId,
        edge_id: EdgeId,
    ) -> Result<RemovalReport, CastError> {
        // Edge targets never change, so the unlocked peek names the right pair.
        let peek = self.load(source_id)?;
        let target_id = peek
            .edge(edge_id)
            .map(|edge| edge.target)
            .ok_or(CastError::EdgeNotFound(source_id, edge_id))?;

        let _guard = self.locks.acquire([source_id, target_id]);

        let mut source = self.load(source_id)?;
        let before = source.clone();
        let removed = source
            .take_edge(edge_id)
            .ok_or(CastError::EdgeNotFound(source_id, edge_id))?;

        let mut warnings = Vec::new();
        let mut mirror_removed = false;

        if removed.is_directional {
            self.store.save_character(&source)?;
        } else {
            match self.store.get_character(removed.target)? {
                Some(mut target) => {
                    let reverse: Vec<&RelationshipEdge> = target
                        .relationships
                        .iter()
                        .filter(|edge| edge.target == source_id && !edge.is_directional)
                        .collect();
                    let mirror = reverse
                        .iter()
                        .find(|edge| edge.kind == removed.kind)
                        .or(reverse.first())
                        .map(|edge| edge.id);

                    match mirror.and_then(|id| target.take_edge(id)) {
                        Some(_) => {
                            self.commit_pair(&before, &source, &target)?;
                            mirror_removed = true;
                        }
                        None => {
                            warnings.push(format!(
                                "mirror of relationship {} ({}) missing on character {}",
                                edge_id, removed.kind, target.id
                            ));
                            self.store.save_character(&source)?;
                        }
                    }
                }
                None => {
                    warnings.push(format!(
                        "target character {} of relationship {} no longer exists",
                        removed.target, edge_id
                    ));
                    self.store.save_character(&source)?;
                }
            }
        }

        for warning in &warnings {
            tracing::warn!(source = %source_id, edge = %edge_id, "{}", warning);
        }
        tracing::debug!(
            source = %source_id,
            edge = %edge_id,
            mirror_removed,
            "relationship removed"
        );

        Ok(RemovalReport {
            source,
            removed,
            mirror_removed,
            warnings,
        })
    }

    /// Remove every edge that references `id`, and `id`'s own edges.
    ///
    /// Returns the number of edges removed.
    pub fn purge_references(&self, id: CharacterId) -> Result<usize, CastError> {
        self.purge(id, false)
    }

    /// Purge every edge referencing `id`, then delete the record.
    ///
    /// The record is dropped while the purge locks are still held, so no
    /// concurrent add can attach a new edge to it in between. Returns the
    /// number of edges removed.
    pub fn delete_character(&self, id: CharacterId) -> Result<usize, CastError> {
        self.purge(id, true)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn load(&self, id: CharacterId) -> Result<Character, CastError> {
        load_required(self.store, id)
    }

    fn purge(&self, id: CharacterId, delete_record: bool) -> Result<usize, CastError> {
        let mut lock_set = self.referrers(id)?;
        loop {
            let _guard = self.locks.acquire(lock_set.iter().copied());

            // A relationship added between the scan and the lock would be
            // missed; rescan under the lock and widen the set if needed.
            let current = self.referrers(id)?;
            if current.is_subset(&lock_set) {
                let removed = self.store.delete_edges_referencing(id)?;
                if delete_record {
                    self.store.delete_character(id)?;
                }
                tracing::debug!(character = %id, removed, deleted = delete_record, "references purged");
                return Ok(removed);
            }
            lock_set.extend(current);
        }
    }

    /// `id` plus every character of its work holding an edge to it.
    fn referrers(&self, id: CharacterId) -> Result<BTreeSet<CharacterId>, CastError> {
        let character = self.load(id)?;
        let mut ids: BTreeSet<CharacterId> = self
            .store
            .find_by_work(character.work)?
            .into_iter()
            .filter(|other| other.relationships.iter().any(|edge| edge.target == id))
            .map(|other| other.id)
            .collect();
        ids.insert(id);
        Ok(ids)
    }

    /// Persist a primary/secondary pair as one logical unit.
    ///
    /// `primary_before` is the stored state of the primary, restored if the
    /// secondary cannot be written.
    fn commit_pair(
        &self,
        primary_before: &Character,
        primary: &Character,
        secondary: &Character,
    ) -> Result<(), CastError> {
        if self.store.supports_transactions() {
            return self.store.save_pair(primary, secondary);
        }

        self.store.save_character(primary)?;
        if let Err(err) = self.store.save_character(secondary) {
            tracing::warn!(
                primary = %primary.id,
                secondary = %secondary.id,
                error = %err,
                "mirror write failed, rolling back primary"
            );
            self.restore(primary_before)?;
            return Err(err);
        }
        Ok(())
    }

    /// Write back a pre-image, retrying up to `ROLLBACK_ATTEMPTS` times.
    fn restore(&self, before: &Character) -> Result<(), CastError> {
        let mut last_error = None;
        for attempt in 1..=ROLLBACK_ATTEMPTS {
            match self.store.save_character(before) {
                Ok(()) => {
                    tracing::info!(character = %before.id, attempt, "rollback applied");
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(
                        character = %before.id,
                        attempt,
                        error = %err,
                        "rollback attempt failed"
                    );
                    last_error = Some(err);
                }
            }
        }

        let reason = last_error.map_or_else(String::new, |err| err.to_string());
        tracing::error!(
            character = %before.id,
            attempts = ROLLBACK_ATTEMPTS,
            "rollback exhausted, relationship pair left asymmetric"
        );
        Err(CastError::ConsistencyFault(format!(
            "could not restore character {} after a failed mirror write: {}",
            before.id, reason
        )))
    }
}

fn ensure_capacity(character: &Character) -> Result<(), CastError> {
    if character.relationships.len() >= MAX_EDGES_PER_CHARACTER {
        return Err(CastError::InvalidArgument(format!(
            "character {} already holds the maximum of {} relationships",
            character.id, MAX_EDGES_PER_CHARACTER
        )));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::{NewCharacter, WorkId};

    struct Fixture {
        store: MemoryStore,
        locks: NodeLocks,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MemoryStore::new(),
                locks: NodeLocks::new(),
            }
        }

        fn manager(&self) -> RelationshipManager<'_, MemoryStore> {
            RelationshipManager::new(&self.store, &self.locks)
        }

        fn character(&self, work: u64, name: &str) -> CharacterId {
            self.store
                .insert_character(NewCharacter::new(WorkId(work), name))
                .expect("insert")
                .id
        }

        fn get(&self, id: CharacterId) -> Character {
            self.store.get_character(id).expect("get").expect("exists")
        }
    }

    #[test]
    fn add_non_directional_creates_mirror() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");
        let b = fx.character(1, "Bob");

        let updated = fx
            .manager()
            .add_relationship(
                NewRelationship::new(a, b, RelationshipType::Family, "cousins")
                    .with_status(RelationshipStatus::Complicated),
            )
            .expect("add");

        assert_eq!(updated.relationships.len(), 1);
        let forward = &updated.relationships[0];
        let mirror = &fx.get(b).relationships[0];
        assert_eq!(mirror.target, a);
        assert!(mirror.mirrors(a, forward));
        assert!(forward.mirrors(b, mirror));
        assert_eq!(mirror.status, RelationshipStatus::Complicated);
        assert_eq!(mirror.description, "cousins");
    }

    #[test]
    fn add_directional_has_no_mirror() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");
        let b = fx.character(1, "Bob");

        fx.manager()
            .add_relationship(
                NewRelationship::new(a, b, RelationshipType::Unrequited, "").directional(true),
            )
            .expect("add");

        assert_eq!(fx.get(a).relationships.len(), 1);
        assert!(fx.get(b).relationships.is_empty());
    }

    #[test]
    fn self_loop_rejected() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");

        let result = fx
            .manager()
            .add_relationship(NewRelationship::new(a, a, RelationshipType::Other, ""));
        assert!(matches!(result, Err(CastError::InvalidArgument(_))));
    }

    #[test]
    fn missing_target_is_not_found() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");

        let result = fx.manager().add_relationship(NewRelationship::new(
            a,
            CharacterId(42),
            RelationshipType::Other,
            "",
        ));
        assert!(matches!(
            result,
            Err(CastError::CharacterNotFound(CharacterId(42)))
        ));
    }

    #[test]
    fn intensity_out_of_range_rejected() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");
        let b = fx.character(1, "Bob");

        let result = fx.manager().add_relationship(
            NewRelationship::new(a, b, RelationshipType::Rivalry, "").with_intensity(9),
        );
        assert!(matches!(result, Err(CastError::InvalidArgument(_))));
        assert!(fx.get(a).relationships.is_empty());
    }

    #[test]
    fn oversized_description_rejected() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");
        let b = fx.character(1, "Bob");

        let description = "x".repeat(MAX_DESCRIPTION_LENGTH + 1);
        let result = fx.manager().add_relationship(NewRelationship::new(
            a,
            b,
            RelationshipType::Friendship,
            description,
        ));
        assert!(matches!(result, Err(CastError::InvalidArgument(_))));
        assert!(fx.get(a).relationships.is_empty());
        assert!(fx.get(b).relationships.is_empty());

        let at_limit = "x".repeat(MAX_DESCRIPTION_LENGTH);
        fx.manager()
            .add_relationship(NewRelationship::new(
                a,
                b,
                RelationshipType::Friendship,
                at_limit,
            ))
            .expect("description at the limit");
    }

    /// Give `id` exactly `MAX_EDGES_PER_CHARACTER` directional edges to a
    /// character that is never loaded.
    fn fill_to_capacity(fx: &Fixture, id: CharacterId) {
        let mut character = fx.get(id);
        while character.relationships.len() < MAX_EDGES_PER_CHARACTER {
            character.push_edge(EdgeDraft {
                target: CharacterId(u64::MAX),
                kind: RelationshipType::Other,
                description: String::new(),
                status: RelationshipStatus::default(),
                is_directional: true,
                intensity: Intensity::default(),
            });
        }
        fx.store.save_character(&character).expect("save");
    }

    #[test]
    fn full_source_rejects_add_without_mutation() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");
        let b = fx.character(1, "Bob");
        fill_to_capacity(&fx, a);

        let result = fx
            .manager()
            .add_relationship(NewRelationship::new(a, b, RelationshipType::Family, ""));
        assert!(matches!(result, Err(CastError::InvalidArgument(_))));
        assert_eq!(fx.get(a).relationships.len(), MAX_EDGES_PER_CHARACTER);
        assert!(fx.get(b).relationships.is_empty());
    }

    #[test]
    fn full_target_rejects_only_mirrored_adds() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");
        let b = fx.character(1, "Bob");
        fill_to_capacity(&fx, b);

        let result = fx
            .manager()
            .add_relationship(NewRelationship::new(a, b, RelationshipType::Family, ""));
        assert!(matches!(result, Err(CastError::InvalidArgument(_))));
        assert!(fx.get(a).relationships.is_empty());
        assert_eq!(fx.get(b).relationships.len(), MAX_EDGES_PER_CHARACTER);

        // A directional edge writes nothing to the target.
        let source = fx
            .manager()
            .add_relationship(
                NewRelationship::new(a, b, RelationshipType::Family, "").directional(true),
            )
            .expect("directional add");
        assert_eq!(source.relationships.len(), 1);
        assert_eq!(fx.get(b).relationships.len(), MAX_EDGES_PER_CHARACTER);
    }

    #[test]
    fn mirror_conflict_rejected_without_mutation() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");
        let b = fx.character(1, "Bob");

        fx.manager()
            .add_relationship(
                NewRelationship::new(b, a, RelationshipType::Mentor, "").directional(true),
            )
            .expect("add");

        let result = fx
            .manager()
            .add_relationship(NewRelationship::new(a, b, RelationshipType::Mentor, ""));
        assert!(matches!(
            result,
            Err(CastError::AlreadyExists { owner, .. }) if owner == b
        ));
        assert!(fx.get(a).relationships.is_empty());
    }

    #[test]
    fn same_pair_different_types_allowed() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");
        let b = fx.character(1, "Bob");

        fx.manager()
            .add_relationship(NewRelationship::new(a, b, RelationshipType::Family, ""))
            .expect("add");
        fx.manager()
            .add_relationship(NewRelationship::new(a, b, RelationshipType::Rivalry, ""))
            .expect("add");

        assert_eq!(fx.get(a).relationships.len(), 2);
        assert_eq!(fx.get(b).relationships.len(), 2);
    }

    #[test]
    fn remove_picks_mirror_of_same_type() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");
        let b = fx.character(1, "Bob");

        fx.manager()
            .add_relationship(NewRelationship::new(a, b, RelationshipType::Family, ""))
            .expect("add");
        let updated = fx
            .manager()
            .add_relationship(NewRelationship::new(a, b, RelationshipType::Rivalry, ""))
            .expect("add");
        let rivalry = updated.relationships[1].id;

        let report = fx.manager().remove_relationship(a, rivalry).expect("remove");

        assert!(report.mirror_removed);
        assert!(report.warnings.is_empty());
        let remaining = fx.get(b).relationships;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].kind, RelationshipType::Family);
    }

    #[test]
    fn remove_tolerates_missing_mirror() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");
        let b = fx.character(1, "Bob");

        let updated = fx
            .manager()
            .add_relationship(NewRelationship::new(a, b, RelationshipType::Friendship, ""))
            .expect("add");

        // Break the pair behind the manager's back.
        let mut target = fx.get(b);
        target.relationships.clear();
        fx.store.save_character(&target).expect("save");

        let report = fx
            .manager()
            .remove_relationship(a, updated.relationships[0].id)
            .expect("remove");

        assert!(!report.mirror_removed);
        assert_eq!(report.warnings.len(), 1);
        assert!(fx.get(a).relationships.is_empty());
    }

    #[test]
    fn remove_falls_back_to_any_reverse_edge() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");
        let b = fx.character(1, "Bob");

        let updated = fx
            .manager()
            .add_relationship(NewRelationship::new(a, b, RelationshipType::Friendship, ""))
            .expect("add");

        let mut target = fx.get(b);
        target.relationships[0].kind = RelationshipType::Rivalry;
        fx.store.save_character(&target).expect("save");

        let report = fx
            .manager()
            .remove_relationship(a, updated.relationships[0].id)
            .expect("remove");

        assert!(report.mirror_removed);
        assert!(report.warnings.is_empty());
        assert!(fx.get(b).relationships.is_empty());
    }

    #[test]
    fn remove_unknown_edge_is_not_found() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");

        let result = fx.manager().remove_relationship(a, EdgeId(7));
        assert!(matches!(result, Err(CastError::EdgeNotFound(_, EdgeId(7)))));
    }

    #[test]
    fn purge_removes_all_references() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");
        let b = fx.character(1, "Bob");
        let c = fx.character(1, "Carol");

        fx.manager()
            .add_relationship(NewRelationship::new(a, b, RelationshipType::Family, ""))
            .expect("add");
        fx.manager()
            .add_relationship(
                NewRelationship::new(c, b, RelationshipType::Enemy, "").directional(true),
            )
            .expect("add");
        fx.manager()
            .add_relationship(NewRelationship::new(a, c, RelationshipType::Colleague, ""))
            .expect("add");

        let removed = fx.manager().purge_references(b).expect("purge");

        assert_eq!(removed, 3);
        assert!(fx.get(b).relationships.is_empty());
        assert!(fx.get(a).relationships.iter().all(|e| e.target != b));
        assert!(fx.get(c).relationships.iter().all(|e| e.target != b));
        // Unrelated pair survives.
        assert_eq!(fx.get(a).relationships.len(), 1);
        assert!(!fx.locks.is_held(b));
    }

    #[test]
    fn delete_character_purges_then_drops_record() {
        let fx = Fixture::new();
        let a = fx.character(1, "Alice");
        let b = fx.character(1, "Bob");

        fx.manager()
            .add_relationship(NewRelationship::new(a, b, RelationshipType::Lovers, ""))
            .expect("add");

        assert_eq!(fx.manager().delete_character(b).expect("delete"), 2);
        assert!(fx.store.get_character(b).expect("get").is_none());
        assert!(fx.get(a).relationships.is_empty());

        let result = fx
            .manager()
            .add_relationship(NewRelationship::new(a, b, RelationshipType::Lovers, ""));
        assert!(matches!(result, Err(CastError::CharacterNotFound(_))));
    }
}
