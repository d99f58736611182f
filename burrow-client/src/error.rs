//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] burrow_protocol::ProtocolError),

    #[error("server version {server}, expected {client}")]
    VersionMismatch { server: u64, client: u64 },

    #[error("connect timeout")]
    ConnectTimeout,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("remote error: {0}")]
    Remote(String),
}
