//! # burrow-store
//!
//! Embedded ordered key-value store for burrow.
//!
//! This crate provides:
//! - Named buckets of lexicographically ordered byte-string keys
//! - Copy-on-write writes and snapshot read-only transactions
//! - Forward cursors with seek-to-key and advance-one

pub mod error;
pub mod store;

pub use error::StoreError;
pub use store::{Bucket, Cursor, ReadTx, Store};
