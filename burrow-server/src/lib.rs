//! # burrow-server
//!
//! TCP server for burrow, the remote read-only key-value database.
//!
//! This crate provides:
//! - The per-connection session state machine (handle tables, deferred
//!   errors, cascaded invalidation)
//! - The command dispatch loop over any async byte stream
//! - The TCP acceptor spawning one session per connection

pub mod config;
pub mod error;
pub mod server;
pub mod session;

pub use config::{Config, ConfigError};
pub use error::ServerError;
pub use server::{serve, serve_with_pool, Server, ServerStats};
pub use session::Session;
