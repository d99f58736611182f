//! Store error types.

use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store closed")]
    Closed,

    #[error("bucket not found: {0}")]
    BucketNotFound(String),
}
