//! # burrow-client
//!
//! Client library for burrow, the remote read-only key-value database.
//!
//! This crate provides:
//! - Version handshake over TCP or any async byte stream
//! - A transaction-scoped API (`view`, buckets, point gets, cursors)
//! - Deferred-error reporting surfaced as typed errors
//!
//! The client is not safe for concurrent use on a single stream: replies
//! are matched to commands by strict positional ordering.

pub mod connection;
pub mod db;
pub mod error;

pub use connection::Connection;
pub use db::{Bucket, Cursor, Db, Tx, DEFAULT_CONNECT_TIMEOUT};
pub use error::ClientError;
