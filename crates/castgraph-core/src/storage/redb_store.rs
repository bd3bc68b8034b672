//! # redb-backed Node Store
//!
//! A disk-backed `NodeStore` using the redb embedded database.
//!
//! Characters are stored whole (edges inline) as postcard-encoded records.
//! A `(work, character)` index table serves `find_by_work` without a full
//! scan. Every multi-record operation runs in one write transaction, so the
//! store reports `supports_transactions`.

use crate::store::NodeStore;
use crate::{CastError, Character, CharacterId, NewCharacter, WorkId};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table, TableDefinition,
};
use std::path::Path;

/// Characters: CharacterId(u64) -> postcard-encoded `Character`
const CHARACTERS: TableDefinition<u64, &[u8]> = TableDefinition::new("characters");

/// Work index: (WorkId, CharacterId) -> ()
const WORK_INDEX: TableDefinition<(u64, u64), ()> = TableDefinition::new("work_index");

/// Metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_CHARACTER_ID: &str = "next_character_id";

fn storage_error(e: impl std::fmt::Display) -> CastError {
    CastError::Storage(e.to_string())
}

fn encode(character: &Character) -> Result<Vec<u8>, CastError> {
    postcard::to_allocvec(character).map_err(|e| CastError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Character, CastError> {
    postcard::from_bytes(bytes).map_err(|e| CastError::Serialization(e.to_string()))
}

/// Overwrite a record that must already exist.
fn write_existing(
    table: &mut Table<'_, u64, &'static [u8]>,
    character: &Character,
) -> Result<(), CastError> {
    let exists = table
        .get(character.id.0)
        .map_err(storage_error)?
        .is_some();
    if !exists {
        return Err(CastError::CharacterNotFound(character.id));
    }
    let bytes = encode(character)?;
    table
        .insert(character.id.0, bytes.as_slice())
        .map_err(storage_error)?;
    Ok(())
}

/// A disk-backed character store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a character database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CastError> {
        let db = Database::create(path.as_ref()).map_err(storage_error)?;

        // Initialize tables if they don't exist
        let write_txn = db.begin_write().map_err(storage_error)?;
        {
            let _ = write_txn.open_table(CHARACTERS).map_err(storage_error)?;
            let _ = write_txn.open_table(WORK_INDEX).map_err(storage_error)?;
            let _ = write_txn.open_table(METADATA).map_err(storage_error)?;
        }
        write_txn.commit().map_err(storage_error)?;

        tracing::debug!(path = %path.as_ref().display(), "redb store opened");
        Ok(Self { db })
    }

    /// Compact the database file. Returns whether any space was reclaimed.
    pub fn compact(&mut self) -> Result<bool, CastError> {
        self.db.compact().map_err(storage_error)
    }

    /// Every character in identifier order.
    pub fn characters(&self) -> Result<Vec<Character>, CastError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(CHARACTERS).map_err(storage_error)?;

        let mut characters = Vec::new();
        for entry in table.iter().map_err(storage_error)? {
            let (_, value) = entry.map_err(storage_error)?;
            characters.push(decode(value.value())?);
        }
        Ok(characters)
    }
}

// =============================================================================
// NODESTORE TRAIT IMPLEMENTATION
// =============================================================================

impl NodeStore for RedbStore {
    fn get_character(&self, id: CharacterId) -> Result<Option<Character>, CastError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(CHARACTERS).map_err(storage_error)?;

        match table.get(id.0).map_err(storage_error)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    fn save_character(&self, character: &Character) -> Result<(), CastError> {
        let write_txn = self.db.begin_write().map_err(storage_error)?;
        {
            let mut table = write_txn.open_table(CHARACTERS).map_err(storage_error)?;
            write_existing(&mut table, character)?;
        }
        write_txn.commit().map_err(storage_error)
    }

    fn save_pair(&self, first: &Character, second: &Character) -> Result<(), CastError> {
        let write_txn = self.db.begin_write().map_err(storage_error)?;
        {
            let mut table = write_txn.open_table(CHARACTERS).map_err(storage_error)?;
            write_existing(&mut table, first)?;
            write_existing(&mut table, second)?;
        }
        write_txn.commit().map_err(storage_error)
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn find_by_work(&self, work: WorkId) -> Result<Vec<Character>, CastError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let index = read_txn.open_table(WORK_INDEX).map_err(storage_error)?;
        let table = read_txn.open_table(CHARACTERS).map_err(storage_error)?;

        let mut characters = Vec::new();
        for entry in index
            .range((work.0, 0)..=(work.0, u64::MAX))
            .map_err(storage_error)?
        {
            let (key, _) = entry.map_err(storage_error)?;
            let (_, id) = key.value();
            if let Some(data) = table.get(id).map_err(storage_error)? {
                characters.push(decode(data.value())?);
            }
        }
        Ok(characters)
    }

    fn delete_edges_referencing(&self, id: CharacterId) -> Result<usize, CastError> {
        let write_txn = self.db.begin_write().map_err(storage_error)?;
        let removed = {
            let mut table = write_txn.open_table(CHARACTERS).map_err(storage_error)?;
            let index = write_txn.open_table(WORK_INDEX).map_err(storage_error)?;

            let work = match table.get(id.0).map_err(storage_error)? {
                Some(data) => decode(data.value())?.work,
                None => return Err(CastError::CharacterNotFound(id)),
            };

            let mut cast = Vec::new();
            for entry in index
                .range((work.0, 0)..=(work.0, u64::MAX))
                .map_err(storage_error)?
            {
                let (key, _) = entry.map_err(storage_error)?;
                cast.push(key.value().1);
            }

            let mut removed = 0usize;
            for member in cast {
                let mut character = match table.get(member).map_err(storage_error)? {
                    Some(data) => decode(data.value())?,
                    None => continue,
                };
                let dropped = if character.id == id {
                    let count = character.relationships.len();
                    character.relationships.clear();
                    count
                } else {
                    character.drop_edges_to(id)
                };
                if dropped > 0 {
                    let bytes = encode(&character)?;
                    table
                        .insert(member, bytes.as_slice())
                        .map_err(storage_error)?;
                    removed = removed.saturating_add(dropped);
                }
            }
            removed
        };
        write_txn.commit().map_err(storage_error)?;
        Ok(removed)
    }

    fn insert_character(&self, draft: NewCharacter) -> Result<Character, CastError> {
        let write_txn = self.db.begin_write().map_err(storage_error)?;
        let character = {
            let mut meta = write_txn.open_table(METADATA).map_err(storage_error)?;
            let next_id = meta
                .get(NEXT_CHARACTER_ID)
                .map_err(storage_error)?
                .map(|v| v.value())
                .unwrap_or(0);

            let character = Character::from_draft(CharacterId(next_id), draft);
            let bytes = encode(&character)?;

            let mut table = write_txn.open_table(CHARACTERS).map_err(storage_error)?;
            table
                .insert(next_id, bytes.as_slice())
                .map_err(storage_error)?;
            let mut index = write_txn.open_table(WORK_INDEX).map_err(storage_error)?;
            index
                .insert((character.work.0, next_id), ())
                .map_err(storage_error)?;
            meta.insert(NEXT_CHARACTER_ID, next_id.saturating_add(1))
                .map_err(storage_error)?;
            character
        };
        write_txn.commit().map_err(storage_error)?;
        Ok(character)
    }

    fn delete_character(&self, id: CharacterId) -> Result<bool, CastError> {
        let write_txn = self.db.begin_write().map_err(storage_error)?;
        let existed = {
            let mut table = write_txn.open_table(CHARACTERS).map_err(storage_error)?;
            let removed = match table.remove(id.0).map_err(storage_error)? {
                Some(data) => Some(decode(data.value())?),
                None => None,
            };
            match removed {
                Some(character) => {
                    let mut index = write_txn.open_table(WORK_INDEX).map_err(storage_error)?;
                    index
                        .remove((character.work.0, id.0))
                        .map_err(storage_error)?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit().map_err(storage_error)?;
        Ok(existed)
    }

    fn character_count(&self) -> Result<usize, CastError> {
        let read_txn = self.db.begin_read().map_err(storage_error)?;
        let table = read_txn.open_table(CHARACTERS).map_err(storage_error)?;
        let len = table.len().map_err(storage_error)?;
        Ok(usize::try_from(len).unwrap_or(usize::MAX))
    }

    fn edge_count(&self) -> Result<usize, CastError> {
        Ok(self
            .characters()?
            .iter()
            .map(|character| character.relationships.len())
            .sum())
    }
}

// =============================================================================
// TESTS
// =============================================================================
