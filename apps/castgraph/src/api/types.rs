//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use castgraph_core::{
    CastError, Character, CharacterId, ErrorKind, Network, NewCharacter, NewRelationship,
    RelationshipEdge, RelationshipStatus, RelationshipType, RemovalReport, WorkId,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Graph status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub character_count: usize,
    /// Stored edges, mirrors included.
    pub edge_count: usize,
    pub persistent: bool,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// An engine error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: message.into(),
                kind: kind.to_string(),
            },
        }
    }

    /// A 500 for failures outside the engine (e.g. a panicked worker).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

/// Stable wire name of an error category.
pub fn kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NotFound => "not_found",
        ErrorKind::InvalidArgument => "invalid_argument",
        ErrorKind::GroupMismatch => "group_mismatch",
        ErrorKind::AlreadyExists => "already_exists",
        ErrorKind::ConsistencyFault => "consistency_fault",
        ErrorKind::Cancelled => "cancelled",
        ErrorKind::Storage => "storage",
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidArgument | ErrorKind::GroupMismatch => StatusCode::BAD_REQUEST,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::Cancelled => StatusCode::REQUEST_TIMEOUT,
        ErrorKind::ConsistencyFault | ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CastError> for ApiError {
    fn from(error: CastError) -> Self {
        let kind = error.kind();
        if kind == ErrorKind::ConsistencyFault {
            tracing::error!(error = %error, "consistency fault needs operator attention");
        }
        Self::new(status_for(kind), kind_name(kind), error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "invalid_body", rejection.body_text())
    }
}

/// `Json` extractor whose rejections use the `ErrorResponse` body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

// =============================================================================
// CHARACTERS
// =============================================================================

/// Character creation request. The work comes from the path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCharacterRequest {
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

impl CreateCharacterRequest {
    /// Build the engine draft for `work`.
    pub fn into_draft(self, work: u64) -> NewCharacter {
        NewCharacter {
            work: WorkId(work),
            name: self.name,
            description: self.description,
            image: self.image,
            aliases: self.aliases,
            status: self.status,
            color: self.color,
        }
    }
}

/// Relationship edge JSON representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipJson {
    pub id: u64,
    pub target_id: u64,
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub description: String,
    pub status: String,
    pub is_directional: bool,
    pub intensity: u8,
}

impl From<&RelationshipEdge> for RelationshipJson {
    fn from(edge: &RelationshipEdge) -> Self {
        Self {
            id: edge.id.0,
            target_id: edge.target.0,
            relationship_type: edge.kind.as_str().to_string(),
            description: edge.description.clone(),
            status: edge.status.as_str().to_string(),
            is_directional: edge.is_directional,
            intensity: edge.intensity.value(),
        }
    }
}

/// Character JSON representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterJson {
    pub id: u64,
    pub work_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub aliases: Vec<String>,
    pub status: Option<String>,
    pub color: Option<String>,
    pub relationships: Vec<RelationshipJson>,
}

impl From<&Character> for CharacterJson {
    fn from(character: &Character) -> Self {
        Self {
            id: character.id.0,
            work_id: character.work.0,
            name: character.name.clone(),
            description: character.description.clone(),
            image: character.image.clone(),
            aliases: character.aliases.clone(),
            status: character.status.clone(),
            color: character.color.clone(),
            relationships: character
                .relationships
                .iter()
                .map(RelationshipJson::from)
                .collect(),
        }
    }
}

/// Character deletion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: u64,
    pub edges_removed: usize,
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

/// Relationship creation request. The source comes from the path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRelationshipRequest {
    pub target_id: u64,
    #[serde(rename = "type")]
    pub relationship_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_directional: Option<bool>,
    #[serde(default)]
    pub intensity: Option<i64>,
}

impl AddRelationshipRequest {
    /// Parse the wire strings into an engine request.
    pub fn to_new_relationship(&self, source: u64) -> Result<NewRelationship, CastError> {
        let kind: RelationshipType = self.relationship_type.parse()?;
        let status = self
            .status
            .as_deref()
            .map(str::parse::<RelationshipStatus>)
            .transpose()?;
        let intensity = self
            .intensity
            .map(|value| {
                u8::try_from(value).map_err(|_| {
                    CastError::InvalidArgument(format!("intensity {} out of range", value))
                })
            })
            .transpose()?;

        Ok(NewRelationship {
            source: CharacterId(source),
            target: CharacterId(self.target_id),
            kind,
            description: self.description.clone(),
            status,
            is_directional: self.is_directional,
            intensity,
        })
    }
}

/// Relationship removal response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalResponse {
    pub character: CharacterJson,
    pub removed: RelationshipJson,
    pub mirror_removed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<RemovalReport> for RemovalResponse {
    fn from(report: RemovalReport) -> Self {
        Self {
            character: CharacterJson::from(&report.source),
            removed: RelationshipJson::from(&report.removed),
            mirror_removed: report.mirror_removed,
            warnings: report.warnings,
        }
    }
}

/// Query string of the by-type endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedQuery {
    #[serde(rename = "type")]
    pub relationship_type: String,
}

// =============================================================================
// NETWORK
// =============================================================================

/// Query string of the network endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkQuery {
    #[serde(default)]
    pub max_depth: Option<i64>,
}

/// A network member with its breadth-first depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkMemberJson {
    pub depth: usize,
    pub character: CharacterJson,
}

/// An edge between two network members, ready for chart rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkEdgeJson {
    pub source_id: u64,
    #[serde(flatten)]
    pub edge: RelationshipJson,
}

/// Network expansion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkResponse {
    pub root: CharacterJson,
    pub max_depth: usize,
    pub members: Vec<NetworkMemberJson>,
    pub edges: Vec<NetworkEdgeJson>,
}

impl From<&Network> for NetworkResponse {
    fn from(network: &Network) -> Self {
        Self {
            root: CharacterJson::from(&network.root),
            max_depth: network.max_depth,
            members: network
                .members
                .iter()
                .map(|member| NetworkMemberJson {
                    depth: member.depth,
                    character: CharacterJson::from(&member.character),
                })
                .collect(),
            edges: network
                .internal_edges()
                .map(|(source, edge)| NetworkEdgeJson {
                    source_id: source.0,
                    edge: RelationshipJson::from(edge),
                })
                .collect(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
