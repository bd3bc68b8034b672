//! # Castgraph CLI Module
//!
//! This module implements the CLI interface for Castgraph.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show graph status
//! - `init` - Initialize a new database
//! - `seed` - Create a cast and its relationships from a JSON file
//! - `cast` - List the characters of a work
//! - `network` - Expand the relationship network around a character
//! - `path` - Degrees of separation between two characters
//! - `stats` - Relationship counts of a character

mod commands;

use crate::config::{Backend, Config};
use castgraph_core::CastError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Castgraph - character relationship graphs
///
/// Characters of a work, the typed relationships between them, and the
/// questions you can ask of the resulting graph.
#[derive(Parser, Debug)]
#[command(name = "castgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the graph database (overrides `storage.path`)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (overrides `storage.backend`)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides `server.host`)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides `server.port`)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show graph status
    Status,

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Create characters and relationships from a JSON seed file
    Seed {
        /// Path to the seed file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List the characters of a work
    Cast {
        /// Work identifier
        work: u64,
    },

    /// Expand the relationship network around a character
    Network {
        /// Root character identifier
        id: u64,

        /// Maximum depth (default 2, capped by `query.max_depth`)
        #[arg(short, long)]
        depth: Option<i64>,
    },

    /// Degrees of separation between two characters
    Path {
        /// Source character identifier
        source: u64,

        /// Target character identifier
        target: u64,
    },

    /// Relationship counts of a character
    Stats {
        /// Character identifier
        id: u64,

        /// List the characters related by this type instead
        #[arg(short = 't', long = "type")]
        relationship_type: Option<String>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

impl Cli {
    /// Resolve configuration: defaults, then the config file, then flags.
    pub fn resolve_config(&self) -> Result<Config, CastError> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(database) = &self.database {
            config.storage.path = database.clone();
        }
        if let Some(backend) = self.backend {
            config.storage.backend = backend;
        }
        if let Some(Commands::Server { host, port }) = &self.command {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
        }
        config.validate()?;
        Ok(config)
    }
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), CastError> {
    let config = cli.resolve_config()?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { .. }) => cmd_server(&config).await,
        Some(Commands::Status) | None => cmd_status(&config, json_mode),
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Seed { file }) => cmd_seed(&config, json_mode, &file),
        Some(Commands::Cast { work }) => cmd_cast(&config, json_mode, work),
        Some(Commands::Network { id, depth }) => cmd_network(&config, json_mode, id, depth),
        Some(Commands::Path { source, target }) => cmd_path(&config, json_mode, source, target),
        Some(Commands::Stats {
            id,
            relationship_type,
        }) => cmd_stats(&config, json_mode, id, relationship_type.as_deref()),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "castgraph",
            "--backend",
            "memory",
            "-D",
            "cast.json",
            "server",
            "--port",
            "9000",
        ]);
        let config = cli.resolve_config().expect("config");

        assert_eq!(config.storage.backend, Backend::Memory);
        assert_eq!(config.storage.path, PathBuf::from("cast.json"));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn stats_type_flag_parses() {
        let cli = Cli::parse_from(["castgraph", "stats", "3", "--type", "family"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Stats {
                id: 3,
                relationship_type: Some(ref t),
            }) if t == "family"
        ));
    }

    #[test]
    fn missing_config_file_fails() {
        let cli = Cli::parse_from(["castgraph", "--config", "/nonexistent/castgraph.toml", "status"]);
        assert!(cli.resolve_config().is_err());
    }
}
