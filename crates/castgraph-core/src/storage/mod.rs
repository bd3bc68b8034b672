//! # Persistent Storage
//!
//! Disk-backed `NodeStore` implementations.

mod redb_store;

pub use redb_store::RedbStore;
