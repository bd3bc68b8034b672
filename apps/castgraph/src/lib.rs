//! # Castgraph
//!
//! HTTP server and CLI over the `castgraph-core` relationship engine.
//!
//! The library target exposes the router and command layer so the binary and
//! the integration tests share one implementation.

pub mod api;
pub mod cli;
pub mod config;
