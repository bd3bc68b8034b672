//! # Castgraph
//!
//! The main binary for the Castgraph character relationship engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for seeding and querying casts
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │            apps/castgraph (THE BINARY)        │
//! │                                               │
//! │   ┌─────────────┐          ┌─────────────┐    │
//! │   │    CLI      │          │  HTTP API   │    │
//! │   │   (clap)    │          │   (axum)    │    │
//! │   └──────┬──────┘          └──────┬──────┘    │
//! │          └──────────┬─────────────┘           │
//! │                     ▼                         │
//! │            ┌────────────────┐                 │
//! │            │ castgraph-core │                 │
//! │            │  (THE ENGINE)  │                 │
//! │            └────────────────┘                 │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! castgraph server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! castgraph seed -f fellowship.json
//! castgraph network 1 --depth 3
//! castgraph path 1 4
//! castgraph stats 1 --type family
//! ```

use castgraph::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // CASTGRAPH_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("CASTGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "castgraph=debug,castgraph_core=debug,tower_http=debug"
    } else {
        "castgraph=info,castgraph_core=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!(kind = ?e.kind(), "Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Castgraph startup banner.
fn print_banner() {
    println!(
        r#"
   ___         _                         _
  / __|__ _ __| |_ __ _ _ _ __ _ _ __  | |_
 | (__/ _` (_-<  _/ _` | '_/ _` | '_ \ | ' \
  \___\__,_/__/\__\__, |_| \__,_| .__/ |_||_|
                  |___/         |_|

  Character Relationship Graphs v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
