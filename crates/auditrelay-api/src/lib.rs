//! Audit relay HTTP API.
//!
//! Receives provider audit payloads, normalizes them, and hands each event to
//! the dispatch backend without waiting for the collector.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use config::Config;
pub use server::{create_router, serve, start_server, AppState};
