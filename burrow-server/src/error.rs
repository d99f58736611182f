//! Server error types.

use thiserror::Error;

/// Server errors. Any of these terminates the session that raised it; the
/// session's resources are released before the error propagates.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] burrow_protocol::ProtocolError),

    #[error("store error: {0}")]
    Store(#[from] burrow_store::StoreError),
}
