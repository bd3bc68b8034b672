//! # Core Type Definitions
//!
//! This module contains all core types for the Castgraph relationship engine:
//! - Identifiers (`CharacterId`, `WorkId`, `EdgeId`)
//! - Relationship vocabulary (`RelationshipType`, `RelationshipStatus`, `Intensity`)
//! - Graph records (`Character`, `RelationshipEdge`, `NewCharacter`)
//! - Error types (`CastError`, `ErrorKind`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they are used as `BTreeMap`/`BTreeSet` keys
//! - Use saturating arithmetic for counters to prevent overflow

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::primitives::{DEFAULT_INTENSITY, MAX_INTENSITY, MIN_INTENSITY};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier for a character (graph node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub u64);

/// Identifier of the work (book, series, film...) a character belongs to.
/// Every relationship stays inside one work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkId(pub u64);

/// Identifier of an edge, unique only within the character that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// RELATIONSHIP VOCABULARY
// =============================================================================

/// The fixed set of relationship kinds an edge may carry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipType {
    Family,
    Romantic,
    Friendship,
    Rivalry,
    Enemy,
    Mentor,
    Colleague,
    Alliance,
    Conflict,
    MasterApprentice,
    ParentChild,
    Siblings,
    Lovers,
    ExLovers,
    Unrequited,
    #[default]
    Other,
}

impl RelationshipType {
    /// Every relationship type, in declaration order.
    pub const ALL: [Self; 16] = [
        Self::Family,
        Self::Romantic,
        Self::Friendship,
        Self::Rivalry,
        Self::Enemy,
        Self::Mentor,
        Self::Colleague,
        Self::Alliance,
        Self::Conflict,
        Self::MasterApprentice,
        Self::ParentChild,
        Self::Siblings,
        Self::Lovers,
        Self::ExLovers,
        Self::Unrequited,
        Self::Other,
    ];

    /// Wire name of the type (matches the serde representation).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Family => "family",
            Self::Romantic => "romantic",
            Self::Friendship => "friendship",
            Self::Rivalry => "rivalry",
            Self::Enemy => "enemy",
            Self::Mentor => "mentor",
            Self::Colleague => "colleague",
            Self::Alliance => "alliance",
            Self::Conflict => "conflict",
            Self::MasterApprentice => "master-apprentice",
            Self::ParentChild => "parent-child",
            Self::Siblings => "siblings",
            Self::Lovers => "lovers",
            Self::ExLovers => "ex-lovers",
            Self::Unrequited => "unrequited",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = CastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                CastError::InvalidArgument(format!("unknown relationship type '{}'", s))
            })
    }
}

/// Lifecycle status of a relationship.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipStatus {
    #[default]
    Active,
    Past,
    Complicated,
}

impl RelationshipStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Past => "past",
            Self::Complicated => "complicated",
        }
    }
}

impl fmt::Display for RelationshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipStatus {
    type Err = CastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "past" => Ok(Self::Past),
            "complicated" => Ok(Self::Complicated),
            _ => Err(CastError::InvalidArgument(format!(
                "unknown relationship status '{}'",
                s
            ))),
        }
    }
}

/// Strength of a relationship on a 1..=5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Intensity(u8);

impl Intensity {
    /// Validate and wrap an intensity value.
    pub fn new(value: u8) -> Result<Self, CastError> {
        if (MIN_INTENSITY..=MAX_INTENSITY).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CastError::InvalidArgument(format!(
                "intensity {} outside {}..={}",
                value, MIN_INTENSITY, MAX_INTENSITY
            )))
        }
    }

    /// Get the raw intensity value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for Intensity {
    fn default() -> Self {
        Self(DEFAULT_INTENSITY)
    }
}

impl TryFrom<u8> for Intensity {
    type Error = CastError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Intensity> for u8 {
    fn from(intensity: Intensity) -> Self {
        intensity.0
    }
}

// =============================================================================
// RELATIONSHIP EDGE
// =============================================================================

/// A directed arc stored on its source character.
///
/// Non-directional relationships are stored twice: once on each endpoint,
/// the second copy being the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    /// Node-local edge identifier.
    pub id: EdgeId,
    /// The character this edge points at.
    pub target: CharacterId,
    pub kind: RelationshipType,
    pub description: String,
    pub status: RelationshipStatus,
    pub is_directional: bool,
    pub intensity: Intensity,
}

impl RelationshipEdge {
    /// Whether this edge is the reverse counterpart of `other`, which lives on
    /// `other_owner`. Intensity is not compared.
    #[must_use]
    pub fn mirrors(&self, other_owner: CharacterId, other: &RelationshipEdge) -> bool {
        !self.is_directional
            && !other.is_directional
            && self.target == other_owner
            && self.kind == other.kind
            && self.description == other.description
            && self.status == other.status
    }
}

// =============================================================================
// CHARACTER
// =============================================================================

/// A character: one node of a work's relationship graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    /// Owning work. Never changes after creation.
    pub work: WorkId,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub aliases: Vec<String>,
    /// Narrative status ("alive", "missing"...), free text.
    pub status: Option<String>,
    /// Default display color used by chart renderers.
    pub color: Option<String>,
    /// Outgoing edges in insertion order.
    pub relationships: Vec<RelationshipEdge>,
    /// Next edge identifier to hand out. Never decreases.
    pub next_edge_id: u64,
}

impl Character {
    /// Build a character record with no edges.
    #[must_use]
    pub fn from_draft(id: CharacterId, draft: NewCharacter) -> Self {
        Self {
            id,
            work: draft.work,
            name: draft.name,
            description: draft.description,
            image: draft.image,
            aliases: draft.aliases,
            status: draft.status,
            color: draft.color,
            relationships: Vec::new(),
            next_edge_id: 0,
        }
    }

    /// Summary view used in query results.
    #[must_use]
    pub fn summary(&self) -> CharacterSummary {
        CharacterSummary {
            id: self.id,
            name: self.name.clone(),
            image: self.image.clone(),
        }
    }

    /// Find an edge by its node-local identifier.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&RelationshipEdge> {
        self.relationships.iter().find(|edge| edge.id == id)
    }

    /// Whether an edge with this `(target, kind)` pair already exists.
    #[must_use]
    pub fn has_edge_to(&self, target: CharacterId, kind: RelationshipType) -> bool {
        self.relationships
            .iter()
            .any(|edge| edge.target == target && edge.kind == kind)
    }

    /// Append a new edge, assigning it the next node-local identifier.
    pub fn push_edge(&mut self, edge: EdgeDraft) -> EdgeId {
        let id = EdgeId(self.next_edge_id);
        self.next_edge_id = self.next_edge_id.saturating_add(1);
        self.relationships.push(RelationshipEdge {
            id,
            target: edge.target,
            kind: edge.kind,
            description: edge.description,
            status: edge.status,
            is_directional: edge.is_directional,
            intensity: edge.intensity,
        });
        id
    }

    /// Remove an edge by identifier, returning it.
    pub fn take_edge(&mut self, id: EdgeId) -> Option<RelationshipEdge> {
        let index = self.relationships.iter().position(|edge| edge.id == id)?;
        Some(self.relationships.remove(index))
    }

    /// Drop every edge pointing at `target`. Returns how many were removed.
    pub fn drop_edges_to(&mut self, target: CharacterId) -> usize {
        let before = self.relationships.len();
        self.relationships.retain(|edge| edge.target != target);
        before - self.relationships.len()
    }
}

/// Fields of an edge before it receives its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeDraft {
    pub target: CharacterId,
    pub kind: RelationshipType,
    pub description: String,
    pub status: RelationshipStatus,
    pub is_directional: bool,
    pub intensity: Intensity,
}

/// Input for creating a character. The store assigns the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCharacter {
    pub work: WorkId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl NewCharacter {
    /// Minimal draft: a name inside a work.
    #[must_use]
    pub fn new(work: WorkId, name: impl Into<String>) -> Self {
        Self {
            work,
            name: name.into(),
            description: None,
            image: None,
            aliases: Vec::new(),
            status: None,
            color: None,
        }
    }
}

/// Lightweight character reference carried by query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSummary {
    pub id: CharacterId,
    pub name: String,
    pub image: Option<String>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Category of a [`CastError`], for callers that dispatch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    GroupMismatch,
    AlreadyExists,
    ConsistencyFault,
    Cancelled,
    Storage,
}

/// Errors that can occur in the Castgraph engine.
///
/// - No silent failures
/// - Use `Result<T, CastError>` for fallible operations
/// - The engine never panics; all errors are returned to the caller
#[derive(Debug, Error)]
pub enum CastError {
    /// The requested character does not exist.
    #[error("Character not found: {0}")]
    CharacterNotFound(CharacterId),

    /// The requested edge does not exist on the character.
    #[error("Relationship {1} not found on character {0}")]
    EdgeNotFound(CharacterId, EdgeId),

    /// Malformed input: self-loop, unknown enum value, out-of-range intensity.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The two characters belong to different works.
    #[error("Characters belong to different works ({source_work} vs {target_work})")]
    GroupMismatch {
        source_work: WorkId,
        target_work: WorkId,
    },

    /// An edge with the same `(target, type)` pair already exists.
    #[error("Relationship already exists: {owner} -> {target} ({kind})")]
    AlreadyExists {
        owner: CharacterId,
        target: CharacterId,
        kind: RelationshipType,
    },

    /// A two-sided mutation could not be rolled back. The symmetric-edge
    /// invariant may be violated and needs operator attention.
    #[error("Consistency fault: {0}")]
    ConsistencyFault(String),

    /// A traversal was cancelled or ran past its deadline.
    #[error("Operation cancelled")]
    Cancelled,

    /// The storage collaborator failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CastError {
    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CharacterNotFound(_) | Self::EdgeNotFound(..) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::GroupMismatch { .. } => ErrorKind::GroupMismatch,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::ConsistencyFault(_) => ErrorKind::ConsistencyFault,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Storage(_) | Self::Serialization(_) => ErrorKind::Storage,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(target: u64, kind: RelationshipType) -> EdgeDraft {
        EdgeDraft {
            target: CharacterId(target),
            kind,
            description: String::new(),
            status: RelationshipStatus::Active,
            is_directional: false,
            intensity: Intensity::default(),
        }
    }

    #[test]
    fn relationship_type_parses_wire_names() {
        for kind in RelationshipType::ALL {
            assert_eq!(kind.as_str().parse::<RelationshipType>().ok(), Some(kind));
        }
        assert_eq!(
            "Master-Apprentice".parse::<RelationshipType>().ok(),
            Some(RelationshipType::MasterApprentice)
        );
    }

    #[test]
    fn unknown_relationship_type_is_invalid_argument() {
        let err = "nemesis".parse::<RelationshipType>();
        assert!(matches!(err, Err(CastError::InvalidArgument(_))));
    }

    #[test]
    fn status_defaults_to_active() {
        assert_eq!(RelationshipStatus::default(), RelationshipStatus::Active);
        assert!("unknown".parse::<RelationshipStatus>().is_err());
        assert_eq!(
            "Past".parse::<RelationshipStatus>().ok(),
            Some(RelationshipStatus::Past)
        );
    }

    #[test]
    fn intensity_bounds() {
        assert_eq!(Intensity::default().value(), 3);
        assert!(Intensity::new(1).is_ok());
        assert!(Intensity::new(5).is_ok());
        assert!(matches!(
            Intensity::new(0),
            Err(CastError::InvalidArgument(_))
        ));
        assert!(Intensity::new(6).is_err());
    }

    #[test]
    fn push_edge_assigns_increasing_ids() {
        let mut character =
            Character::from_draft(CharacterId(1), NewCharacter::new(WorkId(1), "Alice"));
        let first = character.push_edge(draft(2, RelationshipType::Family));
        let second = character.push_edge(draft(3, RelationshipType::Friendship));

        assert_eq!(first, EdgeId(0));
        assert_eq!(second, EdgeId(1));
        assert!(character.has_edge_to(CharacterId(2), RelationshipType::Family));
        assert!(!character.has_edge_to(CharacterId(2), RelationshipType::Friendship));
    }

    #[test]
    fn edge_ids_are_not_reused_after_removal() {
        let mut character =
            Character::from_draft(CharacterId(1), NewCharacter::new(WorkId(1), "Alice"));
        let first = character.push_edge(draft(2, RelationshipType::Family));
        assert!(character.take_edge(first).is_some());

        let next = character.push_edge(draft(2, RelationshipType::Family));
        assert_ne!(first, next);
    }

    #[test]
    fn drop_edges_to_counts_removed() {
        let mut character =
            Character::from_draft(CharacterId(1), NewCharacter::new(WorkId(1), "Alice"));
        character.push_edge(draft(2, RelationshipType::Family));
        character.push_edge(draft(2, RelationshipType::Rivalry));
        character.push_edge(draft(3, RelationshipType::Family));

        assert_eq!(character.drop_edges_to(CharacterId(2)), 2);
        assert_eq!(character.relationships.len(), 1);
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            CastError::CharacterNotFound(CharacterId(1)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CastError::EdgeNotFound(CharacterId(1), EdgeId(0)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(CastError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            CastError::Serialization("x".into()).kind(),
            ErrorKind::Storage
        );
    }
}
