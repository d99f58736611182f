//! # burrow-protocol
//!
//! Wire protocol for burrow, the remote read-only key-value database.
//!
//! This crate provides:
//! - Self-describing binary value codec (nil / uint / byte string)
//! - One-byte command tags and typed command framing
//! - A bounded buffer pool for session I/O
//! - Protocol constants

pub mod command;
pub mod error;
pub mod pool;
pub mod wire;

pub use command::{Command, CommandTag};
pub use error::ProtocolError;
pub use pool::BufferPool;
pub use wire::ByteString;

/// Protocol version supported by this implementation. Negotiated at connect
/// time; any mismatch aborts the session.
pub const PROTOCOL_VERSION: u64 = 1;

/// Default port for the burrow server.
pub const DEFAULT_PORT: u16 = 7433;
