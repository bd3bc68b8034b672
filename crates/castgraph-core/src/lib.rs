//! # castgraph-core
//!
//! The relationship graph engine for Castgraph.
//!
//! Characters belong to a work and carry typed relationship edges to other
//! characters of the same work. The engine keeps non-directional
//! relationships mirrored on both endpoints under concurrent mutation, and
//! answers structural queries over the resulting graph: bounded network
//! expansion, degrees of separation, and per-type aggregation.
//!
//! ## Architectural Constraints
//!
//! - `RelationshipManager` is the ONLY component that mutates edges
//! - Readers (`NetworkExpander`, `ShortestPathFinder`, `RelationshipStats`)
//!   work on per-character snapshots and take no locks
//! - Storage sits behind the `NodeStore` trait; the engine never assumes a
//!   backend
//! - Has NO async, NO network dependencies (pure Rust)
//! - Deterministic: `BTreeMap`/`BTreeSet` only, no floats, no randomness

// =============================================================================
// MODULES
// =============================================================================

pub mod cancel;
pub mod engine;
pub mod locks;
pub mod network;
pub mod path;
pub mod primitives;
pub mod relationship;
pub mod stats;
pub mod storage;
pub mod store;
mod traversal;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CastError, Character, CharacterId, CharacterSummary, EdgeDraft, EdgeId, ErrorKind,
    Intensity, NewCharacter, RelationshipEdge, RelationshipStatus, RelationshipType, WorkId,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use cancel::CancelToken;
pub use engine::{CastGraph, StorageBackend};
pub use locks::{NodeLockGuard, NodeLocks};
pub use network::{Network, NetworkExpander, NetworkMember, resolve_depth};
pub use path::{Connection, PathOutcome, ShortestPathFinder};
pub use relationship::{NewRelationship, RelationshipManager, RemovalReport};
pub use stats::{CharacterStats, RelatedCharacter, RelatedCharacters, RelationshipStats};
pub use storage::RedbStore;
pub use store::{MemoryStore, NodeStore};
