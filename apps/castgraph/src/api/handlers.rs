//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! The engine is synchronous and may block on node locks or storage, so
//! every call runs on the blocking thread pool.

use super::{
    AppState,
    types::{
        AddRelationshipRequest, ApiError, ApiJson, CharacterJson, CreateCharacterRequest,
        DeleteResponse, HealthResponse, NetworkQuery, NetworkResponse, RelatedQuery,
        RemovalResponse, StatusResponse,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use castgraph_core::{
    CancelToken, CastError, CastGraph, CharacterId, CharacterStats, EdgeId, PathOutcome,
    RelatedCharacters, RelationshipType, WorkId, resolve_depth,
};
use std::sync::Arc;

/// Run an engine call on the blocking pool.
async fn run_blocking<T, F>(state: &AppState, job: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&CastGraph) -> Result<T, CastError> + Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    tokio::task::spawn_blocking(move || job(engine.as_ref()))
        .await
        .map_err(|e| ApiError::internal(format!("Engine task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Requested depth after defaulting and clamping, capped by the server.
fn capped_depth(requested: Option<i64>, cap: usize) -> Result<Option<i64>, CastError> {
    Ok(i64::try_from(resolve_depth(requested)?.min(cap)).ok())
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Get graph status.
pub async fn status_handler(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, ApiError> {
    let response = run_blocking(&state, |engine| {
        Ok(StatusResponse {
            character_count: engine.character_count()?,
            edge_count: engine.edge_count()?,
            persistent: engine.is_persistent(),
        })
    })
    .await?;

    Ok(Json(response))
}

// =============================================================================
// CHARACTER HANDLERS
// =============================================================================

/// List the cast of a work.
pub async fn list_cast_handler(
    State(state): State<AppState>,
    Path(work_id): Path<u64>,
) -> Result<Json<Vec<CharacterJson>>, ApiError> {
    let cast = run_blocking(&state, move |engine| engine.cast_of(WorkId(work_id))).await?;
    Ok(Json(cast.iter().map(CharacterJson::from).collect()))
}

/// Create a character in a work.
pub async fn create_character_handler(
    State(state): State<AppState>,
    Path(work_id): Path<u64>,
    ApiJson(request): ApiJson<CreateCharacterRequest>,
) -> Result<(StatusCode, Json<CharacterJson>), ApiError> {
    let draft = request.into_draft(work_id);
    let character = run_blocking(&state, move |engine| engine.create_character(draft)).await?;

    tracing::info!(character = %character.id, work = work_id, "character created");
    Ok((StatusCode::CREATED, Json(CharacterJson::from(&character))))
}

/// Fetch a character with its relationships.
pub async fn get_character_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<CharacterJson>, ApiError> {
    let character = run_blocking(&state, move |engine| engine.get_character(CharacterId(id))).await?;
    Ok(Json(CharacterJson::from(&character)))
}

/// Delete a character and every edge pointing at it.
pub async fn delete_character_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let edges_removed =
        run_blocking(&state, move |engine| engine.delete_character(CharacterId(id))).await?;

    tracing::info!(character = id, edges_removed, "character deleted");
    Ok(Json(DeleteResponse {
        deleted: id,
        edges_removed,
    }))
}

// =============================================================================
// RELATIONSHIP HANDLERS
// =============================================================================

/// Add a relationship from the character in the path.
pub async fn add_relationship_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    ApiJson(request): ApiJson<AddRelationshipRequest>,
) -> Result<(StatusCode, Json<CharacterJson>), ApiError> {
    let new_relationship = request.to_new_relationship(id)?;
    let source =
        run_blocking(&state, move |engine| engine.add_relationship(new_relationship)).await?;

    Ok((StatusCode::CREATED, Json(CharacterJson::from(&source))))
}

/// Remove a relationship (and its mirror) by edge identifier.
pub async fn remove_relationship_handler(
    State(state): State<AppState>,
    Path((id, edge_id)): Path<(u64, u64)>,
) -> Result<Json<RemovalResponse>, ApiError> {
    let report = run_blocking(&state, move |engine| {
        engine.remove_relationship(CharacterId(id), EdgeId(edge_id))
    })
    .await?;

    Ok(Json(RemovalResponse::from(report)))
}

/// Characters related to the one in the path by a given type.
pub async fn related_by_type_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(query): Query<RelatedQuery>,
) -> Result<Json<RelatedCharacters>, ApiError> {
    let kind: RelationshipType = query.relationship_type.parse()?;
    let related =
        run_blocking(&state, move |engine| engine.related_by_type(CharacterId(id), kind)).await?;
    Ok(Json(related))
}

// =============================================================================
// QUERY HANDLERS
// =============================================================================

/// Expand the relationship network around a character.
pub async fn network_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Query(query): Query<NetworkQuery>,
) -> Result<Json<NetworkResponse>, ApiError> {
    let depth = capped_depth(query.max_depth, state.query.max_depth)?;
    let cancel = CancelToken::with_timeout_ms(state.query.timeout_ms);

    let network = run_blocking(&state, move |engine| {
        engine.expand_network(CharacterId(id), depth, &cancel)
    })
    .await?;
    Ok(Json(NetworkResponse::from(&network)))
}

/// Degrees of separation between two characters.
pub async fn path_handler(
    State(state): State<AppState>,
    Path((id, target)): Path<(u64, u64)>,
) -> Result<Json<PathOutcome>, ApiError> {
    let cancel = CancelToken::with_timeout_ms(state.query.timeout_ms);

    let outcome = run_blocking(&state, move |engine| {
        engine.find_shortest_path(CharacterId(id), CharacterId(target), &cancel)
    })
    .await?;
    Ok(Json(outcome))
}

/// Relationship counts of a character.
pub async fn stats_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<CharacterStats>, ApiError> {
    let stats = run_blocking(&state, move |engine| engine.compute_stats(CharacterId(id))).await?;
    Ok(Json(stats))
}

// =============================================================================
// TESTS
// =============================================================================
