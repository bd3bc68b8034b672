//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! The `redb` backend persists every mutation as it happens. The `memory`
//! backend loads a JSON snapshot from the database path on start and writes
//! it back after mutating commands and on server shutdown.

use crate::api::{self, AppState, NetworkResponse};
use crate::config::{Backend, Config, StorageConfig};
use castgraph_core::{
    CancelToken, CastError, CastGraph, Character, CharacterId, MemoryStore, NewCharacter,
    NewRelationship, PathOutcome, RelationshipStatus, RelationshipType, StorageBackend, WorkId,
    resolve_depth,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum seed file size (100 MB).
const MAX_SEED_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum snapshot file size for the memory backend (500 MB).
const MAX_SNAPSHOT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), CastError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CastError::Storage(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(CastError::InvalidArgument(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and require a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, CastError> {
    let canonical = path.canonicalize().map_err(|e| {
        CastError::Storage(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(CastError::Storage(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CastError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CastError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// ENGINE LOADING
// =============================================================================

const SNAPSHOT_FORMAT: &str = "castgraph-snapshot";
const SNAPSHOT_VERSION: u32 = 1;

/// JSON snapshot written by the memory backend.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    format: String,
    version: u32,
    characters: Vec<Character>,
}

/// Open the engine described by the storage configuration.
pub fn open_engine(storage: &StorageConfig) -> Result<CastGraph, CastError> {
    match storage.backend {
        Backend::Redb => CastGraph::with_redb(&storage.path),
        Backend::Memory => {
            if !storage.path.exists() {
                return Ok(CastGraph::new());
            }
            validate_file_size(&storage.path, MAX_SNAPSHOT_FILE_SIZE)?;
            let data = std::fs::read(&storage.path)
                .map_err(|e| CastError::Storage(format!("Read snapshot: {}", e)))?;
            let snapshot: Snapshot = serde_json::from_slice(&data)
                .map_err(|e| CastError::Serialization(format!("Parse snapshot: {}", e)))?;

            if snapshot.format != SNAPSHOT_FORMAT || snapshot.version != SNAPSHOT_VERSION {
                return Err(CastError::Serialization(format!(
                    "Unsupported snapshot {} v{}",
                    snapshot.format, snapshot.version
                )));
            }

            tracing::debug!(
                characters = snapshot.characters.len(),
                path = %storage.path.display(),
                "snapshot loaded"
            );
            Ok(CastGraph::with_store(StorageBackend::InMemory(
                MemoryStore::with_characters(snapshot.characters),
            )))
        }
    }
}

/// Persist the engine if its backend needs an explicit save.
pub fn save_engine(engine: &CastGraph, storage: &StorageConfig) -> Result<(), CastError> {
    let StorageBackend::InMemory(store) = engine.store() else {
        return Ok(());
    };

    let snapshot = Snapshot {
        format: SNAPSHOT_FORMAT.to_string(),
        version: SNAPSHOT_VERSION,
        characters: store.characters(),
    };
    let data = serde_json::to_vec_pretty(&snapshot)
        .map_err(|e| CastError::Serialization(e.to_string()))?;
    std::fs::write(&storage.path, data)
        .map_err(|e| CastError::Storage(format!("Write snapshot: {}", e)))?;

    tracing::debug!(
        characters = snapshot.characters.len(),
        path = %storage.path.display(),
        "snapshot saved"
    );
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &Config) -> Result<(), CastError> {
    let engine = open_engine(&config.storage)?;

    println!("Castgraph Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:      {}", config.server.host);
    println!("  Port:      {}", config.server.port);
    println!("  Backend:   {}", config.storage.backend.as_str());
    println!("  Database:  {:?}", config.storage.path);
    println!("  Timeout:   {} ms", config.query.timeout_ms);
    println!("  Max depth: {}", config.query.max_depth);
    println!();
    println!("Endpoints:");
    println!("  GET    /works/{{work_id}}/characters        - List a cast");
    println!("  POST   /works/{{work_id}}/characters        - Create a character");
    println!("  GET    /characters/{{id}}                   - Fetch a character");
    println!("  DELETE /characters/{{id}}                   - Delete a character");
    println!("  POST   /characters/{{id}}/relationships     - Add a relationship");
    println!("  DELETE /characters/{{id}}/relationships/{{e}} - Remove a relationship");
    println!("  GET    /characters/{{id}}/network           - Network expansion");
    println!("  GET    /characters/{{id}}/path/{{target}}     - Degrees of separation");
    println!("  GET    /characters/{{id}}/stats             - Relationship counts");
    println!("  GET    /health                            - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = AppState::with_query_config(engine, config.query);
    let engine = Arc::clone(&state.engine);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    api::run_server(&addr, state).await?;

    save_engine(&engine, &config.storage)
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show graph status.
pub fn cmd_status(config: &Config, json_mode: bool) -> Result<(), CastError> {
    let engine = open_engine(&config.storage)?;
    let characters = engine.character_count()?;
    let edges = engine.edge_count()?;

    if json_mode {
        return print_json(&serde_json::json!({
            "database": config.storage.path.to_string_lossy(),
            "backend": config.storage.backend.as_str(),
            "character_count": characters,
            "edge_count": edges,
        }));
    }

    println!("Castgraph Status");
    println!("================");
    println!("Database:   {:?}", config.storage.path);
    println!("Backend:    {}", config.storage.backend.as_str());
    println!();
    println!("Characters: {}", characters);
    println!("Edges:      {} (mirrors included)", edges);

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(config: &Config, force: bool) -> Result<(), CastError> {
    let path = &config.storage.path;
    if path.exists() {
        if !force {
            return Err(CastError::InvalidArgument(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(path)
            .map_err(|e| CastError::Storage(format!("Remove existing database: {}", e)))?;
    }

    match config.storage.backend {
        Backend::Redb => {
            let _engine = CastGraph::with_redb(path)?;
            println!("Initialized new redb database at {:?}", path);
        }
        Backend::Memory => {
            save_engine(&CastGraph::new(), &config.storage)?;
            println!("Initialized new snapshot file at {:?}", path);
        }
    }

    Ok(())
}

// =============================================================================
// SEED COMMAND
// =============================================================================

/// Seed file: one work's cast and the relationships between them.
///
/// Characters are referenced by a file-local `key`; identifiers are assigned
/// on creation.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub work_id: u64,
    pub characters: Vec<SeedCharacter>,
    #[serde(default)]
    pub relationships: Vec<SeedRelationship>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCharacter {
    pub key: String,
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

#[derive(Debug, Deserialize)]
pub struct SeedRelationship {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_directional: Option<bool>,
    #[serde(default)]
    pub intensity: Option<u8>,
}

/// Outcome of applying a seed file.
#[derive(Debug, Serialize)]
pub struct SeedReport {
    pub work_id: u64,
    pub characters: BTreeMap<String, CharacterId>,
    pub relationships: usize,
}

/// Apply a parsed seed file to an engine.
///
/// Stops at the first failing relationship; characters and relationships
/// created before it are kept.
pub fn apply_seed(engine: &CastGraph, seed: SeedFile) -> Result<SeedReport, CastError> {
    let work = WorkId(seed.work_id);
    let mut ids: BTreeMap<String, CharacterId> = BTreeMap::new();

    for entry in seed.characters {
        if ids.contains_key(&entry.key) {
            return Err(CastError::InvalidArgument(format!(
                "duplicate character key '{}'",
                entry.key
            )));
        }
        let character = engine.create_character(NewCharacter {
            work,
            name: entry.name,
            description: entry.description,
            image: entry.image,
            aliases: entry.aliases,
            status: entry.status,
            color: entry.color,
        })?;
        ids.insert(entry.key, character.id);
    }

    let lookup = |key: &str| {
        ids.get(key).copied().ok_or_else(|| {
            CastError::InvalidArgument(format!("unknown character key '{}'", key))
        })
    };

    let mut relationships = 0usize;
    for entry in &seed.relationships {
        let request = NewRelationship {
            source: lookup(&entry.source)?,
            target: lookup(&entry.target)?,
            kind: entry.relationship_type.parse::<RelationshipType>()?,
            description: entry.description.clone(),
            status: entry
                .status
                .as_deref()
                .map(str::parse::<RelationshipStatus>)
                .transpose()?,
            is_directional: entry.is_directional,
            intensity: entry.intensity,
        };
        engine.add_relationship(request)?;
        relationships += 1;
    }

    Ok(SeedReport {
        work_id: seed.work_id,
        characters: ids,
        relationships,
    })
}

/// Create characters and relationships from a seed file.
pub fn cmd_seed(config: &Config, json_mode: bool, file: &Path) -> Result<(), CastError> {
    tracing::info!("Seeding from {:?}", file);

    let validated_path = validate_file_path(file)?;
    validate_file_size(&validated_path, MAX_SEED_FILE_SIZE)?;

    let contents = std::fs::read(&validated_path)
        .map_err(|e| CastError::Storage(format!("Read seed file: {}", e)))?;
    let seed: SeedFile = serde_json::from_slice(&contents)
        .map_err(|e| CastError::InvalidArgument(format!("Invalid seed file: {}", e)))?;

    let engine = open_engine(&config.storage)?;
    let outcome = apply_seed(&engine, seed);
    // Keep whatever was created before a failure.
    save_engine(&engine, &config.storage)?;
    let report = outcome?;

    if json_mode {
        return print_json(&report);
    }

    println!(
        "Seeded work {}: {} characters, {} relationships",
        report.work_id,
        report.characters.len(),
        report.relationships
    );
    for (key, id) in &report.characters {
        println!("  {:<20} #{}", key, id);
    }
    Ok(())
}

// =============================================================================
// CAST COMMAND
// =============================================================================

/// List the characters of a work.
pub fn cmd_cast(config: &Config, json_mode: bool, work: u64) -> Result<(), CastError> {
    let engine = open_engine(&config.storage)?;
    let cast = engine.cast_of(WorkId(work))?;

    if json_mode {
        let cast: Vec<api::CharacterJson> = cast.iter().map(api::CharacterJson::from).collect();
        return print_json(&cast);
    }

    println!("Cast of work {} ({} characters)", work, cast.len());
    for character in &cast {
        println!(
            "  #{:<6} {:<24} {} relationships",
            character.id.0,
            character.name,
            character.relationships.len()
        );
    }
    Ok(())
}

// =============================================================================
// QUERY COMMANDS
// =============================================================================

/// Expand the relationship network around a character.
pub fn cmd_network(
    config: &Config,
    json_mode: bool,
    id: u64,
    depth: Option<i64>,
) -> Result<(), CastError> {
    let engine = open_engine(&config.storage)?;
    let depth = i64::try_from(resolve_depth(depth)?.min(config.query.max_depth)).ok();
    let cancel = CancelToken::with_timeout_ms(config.query.timeout_ms);

    let network = engine.expand_network(CharacterId(id), depth, &cancel)?;

    if json_mode {
        return print_json(&NetworkResponse::from(&network));
    }

    println!(
        "Network of {} (#{}) to depth {}: {} characters",
        network.root.name,
        network.root.id,
        network.max_depth,
        network.members.len()
    );
    for member in &network.members {
        println!(
            "  [{}] {} (#{})",
            member.depth, member.character.name, member.character.id
        );
    }
    Ok(())
}

/// Degrees of separation between two characters.
pub fn cmd_path(
    config: &Config,
    json_mode: bool,
    source: u64,
    target: u64,
) -> Result<(), CastError> {
    let engine = open_engine(&config.storage)?;
    let cancel = CancelToken::with_timeout_ms(config.query.timeout_ms);

    let outcome = engine.find_shortest_path(CharacterId(source), CharacterId(target), &cancel)?;

    if json_mode {
        return print_json(&outcome);
    }

    match outcome {
        PathOutcome::Connected(connection) => {
            let names: Vec<&str> = connection.path.iter().map(|c| c.name.as_str()).collect();
            println!("{} degree(s) of separation", connection.degrees);
            println!("  {}", names.join(" -> "));
        }
        PathOutcome::NoConnection { source, target } => {
            println!("No connection between {} and {}", source.name, target.name);
        }
    }
    Ok(())
}

/// Relationship counts of a character, or the characters related by a type.
pub fn cmd_stats(
    config: &Config,
    json_mode: bool,
    id: u64,
    relationship_type: Option<&str>,
) -> Result<(), CastError> {
    let engine = open_engine(&config.storage)?;

    if let Some(kind) = relationship_type {
        let kind: RelationshipType = kind.parse()?;
        let related = engine.related_by_type(CharacterId(id), kind)?;
        if json_mode {
            return print_json(&related);
        }
        println!(
            "{} (#{}): {} '{}' relationship(s)",
            related.character.name,
            related.character.id,
            related.related.len(),
            kind
        );
        for entry in &related.related {
            println!(
                "  {} (#{}) [{}, intensity {}] {}",
                entry.character.name,
                entry.character.id,
                entry.status,
                entry.intensity.value(),
                entry.description
            );
        }
        return Ok(());
    }

    let stats = engine.compute_stats(CharacterId(id))?;
    if json_mode {
        return print_json(&stats);
    }

    println!(
        "{} (#{}): {} relationship(s)",
        stats.character.name, stats.character.id, stats.total_relationships
    );
    for (kind, count) in &stats.by_type {
        println!("  {:<18} {}", kind.as_str(), count);
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
