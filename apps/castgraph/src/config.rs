//! # Configuration
//!
//! Optional TOML configuration for the Castgraph binary.
//!
//! Values are resolved in order: built-in defaults, then the file given with
//! `--config`, then command-line flags. Security layers of the HTTP server
//! (API key, rate limit, CORS) stay on environment variables.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [storage]
//! backend = "redb"
//! path = "castgraph.db"
//!
//! [query]
//! timeout_ms = 5000
//! max_depth = 10
//! ```

use castgraph_core::CastError;
use castgraph_core::primitives::MAX_TRAVERSAL_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maximum config file size accepted (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-memory store, snapshotted to a JSON file between runs.
    Memory,
    /// redb database (ACID, persistent).
    #[default]
    Redb,
}

impl Backend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redb => "redb",
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: Backend,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            path: PathBuf::from("castgraph.db"),
        }
    }
}

/// Bounds applied to traversal requests.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueryConfig {
    /// Deadline for one traversal, in milliseconds.
    pub timeout_ms: u64,
    /// Highest network depth a caller may request.
    pub max_depth: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_depth: MAX_TRAVERSAL_DEPTH,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, CastError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            CastError::Storage(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(CastError::InvalidArgument(format!(
                "config file size {} bytes exceeds maximum {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            CastError::Storage(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(content: &str) -> Result<Self, CastError> {
        let config: Config = toml::from_str(content).map_err(|e| {
            CastError::InvalidArgument(format!("Failed to parse config file: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, CastError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), CastError> {
        if self.server.host.trim().is_empty() {
            return Err(CastError::InvalidArgument(
                "server.host must not be empty".into(),
            ));
        }
        if self.query.timeout_ms == 0 {
            return Err(CastError::InvalidArgument(
                "query.timeout_ms must be greater than 0".into(),
            ));
        }
        if self.query.max_depth == 0 || self.query.max_depth > MAX_TRAVERSAL_DEPTH {
            return Err(CastError::InvalidArgument(format!(
                "query.max_depth must be between 1 and {}",
                MAX_TRAVERSAL_DEPTH
            )));
        }
        if self.storage.path.as_os_str().is_empty() {
            return Err(CastError::InvalidArgument(
                "storage.path must not be empty".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
