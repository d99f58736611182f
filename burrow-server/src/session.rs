//! Per-connection session state.
//!
//! A session owns everything the server holds on behalf of one client
//! stream: the deferred-error slot, the handle counter, and the registries
//! of open transactions, buckets and cursors. Ownership is a strict tree
//! (session -> transaction -> bucket -> cursor); reverse indices let
//! `end_tx` invalidate a transaction's descendants in one pass.
//!
//! Handles are allocated from a single monotonically increasing counter
//! shared by all three resource types, starting at 1. Handle 0 is reserved:
//! it is the in-band "allocation failed" sentinel, and the client consults
//! `LastError` to learn why.

use burrow_store::{Bucket, Cursor, ReadTx, Store, StoreError};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

const ERR_TX_NOT_FOUND: &str = "transaction not found";
const ERR_BUCKET_NOT_FOUND: &str = "bucket not found";
const ERR_CURSOR_NOT_FOUND: &str = "cursor not found";

/// A key/value pair as it appears on the wire: a nil key marks the end of a
/// cursor stream.
pub type Pair = (Option<Bytes>, Option<Bytes>);

pub struct Session {
    /// Session ID for log correlation.
    pub id: String,

    store: Arc<Store>,

    /// Outcome of the most recent deferred-error command. `None` is success.
    last_error: Option<String>,

    /// Monotonic handle counter; first allocation yields 1.
    last_handle: u64,

    transactions: HashMap<u64, ReadTx>,
    buckets: HashMap<u64, Bucket>,
    cursors: HashMap<u64, Cursor>,

    /// Bucket handles owned by each transaction.
    buckets_by_tx: HashMap<u64, Vec<u64>>,
    /// Cursor handles owned by each bucket.
    cursors_by_bucket: HashMap<u64, Vec<u64>>,
}

impl Session {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            store,
            last_error: None,
            last_handle: 0,
            transactions: HashMap::new(),
            buckets: HashMap::new(),
            cursors: HashMap::new(),
            buckets_by_tx: HashMap::new(),
            cursors_by_bucket: HashMap::new(),
        }
    }

    fn alloc_handle(&mut self) -> u64 {
        self.last_handle += 1;
        self.last_handle
    }

    /// Textual form of the deferred-error slot; empty string on success.
    pub fn last_error(&self) -> &str {
        self.last_error.as_deref().unwrap_or("")
    }

    /// Opens a read-only transaction. Returns its handle, or 0 with the
    /// store's error deferred.
    pub fn begin_tx(&mut self) -> u64 {
        match self.store.begin() {
            Ok(tx) => {
                let handle = self.alloc_handle();
                self.transactions.insert(handle, tx);
                self.last_error = None;
                handle
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                0
            }
        }
    }

    /// Ends a transaction: invalidates every bucket and cursor it owns, then
    /// rolls it back. An unknown handle only sets the deferred error. A
    /// rollback failure is returned and must terminate the session.
    pub fn end_tx(&mut self, tx: u64) -> Result<(), StoreError> {
        let Some(transaction) = self.transactions.remove(&tx) else {
            self.last_error = Some(ERR_TX_NOT_FOUND.into());
            return Ok(());
        };
        if let Some(bucket_handles) = self.buckets_by_tx.remove(&tx) {
            for bucket in bucket_handles {
                if let Some(cursor_handles) = self.cursors_by_bucket.remove(&bucket) {
                    for cursor in cursor_handles {
                        self.cursors.remove(&cursor);
                    }
                }
                self.buckets.remove(&bucket);
            }
        }
        transaction.rollback()?;
        self.last_error = None;
        Ok(())
    }

    /// Opens a named bucket. Returns its handle, or 0 with the failure
    /// deferred.
    pub fn open_bucket(&mut self, tx: u64, name: &[u8]) -> u64 {
        let Some(transaction) = self.transactions.get(&tx) else {
            self.last_error = Some(ERR_TX_NOT_FOUND.into());
            return 0;
        };
        let Some(bucket) = transaction.bucket(name) else {
            self.last_error = Some(ERR_BUCKET_NOT_FOUND.into());
            return 0;
        };
        let handle = self.alloc_handle();
        self.buckets.insert(handle, bucket);
        self.buckets_by_tx.entry(tx).or_default().push(handle);
        self.last_error = None;
        handle
    }

    /// Point lookup. A missing key and an unknown bucket handle both reply
    /// nil; only the latter sets the deferred error.
    pub fn get(&mut self, bucket: u64, key: &[u8]) -> Option<Bytes> {
        let Some(b) = self.buckets.get(&bucket) else {
            self.last_error = Some(ERR_BUCKET_NOT_FOUND.into());
            return None;
        };
        let value = b.get(key);
        self.last_error = None;
        value
    }

    /// Opens a forward cursor. Returns its handle, or 0 with the failure
    /// deferred.
    pub fn open_cursor(&mut self, bucket: u64) -> u64 {
        let Some(b) = self.buckets.get(&bucket) else {
            self.last_error = Some(ERR_BUCKET_NOT_FOUND.into());
            return 0;
        };
        let cursor = b.cursor();
        let handle = self.alloc_handle();
        self.cursors.insert(handle, cursor);
        self.cursors_by_bucket
            .entry(bucket)
            .or_default()
            .push(handle);
        self.last_error = None;
        handle
    }

    /// Positions a cursor at the smallest key >= `key`. An exhausted seek is
    /// a success replying nil/nil; an unknown handle replies the same shape
    /// with the failure deferred.
    pub fn seek(&mut self, cursor: u64, key: &[u8]) -> Pair {
        let Some(c) = self.cursors.get_mut(&cursor) else {
            self.last_error = Some(ERR_CURSOR_NOT_FOUND.into());
            return (None, None);
        };
        let pair = c.seek(key);
        self.last_error = None;
        pair
    }

    /// Advances a cursor up to `count` pairs. The terminating nil pair is
    /// emitted and counted before the early-exhaustion check, so one nil
    /// pair always reaches the wire when the bucket runs out.
    ///
    /// An unknown handle defers "cursor not found" and, for `count > 0`,
    /// yields a single nil/nil terminator so the client's pair-reading loop
    /// stays aligned; a client that asked for zero pairs reads zero pairs.
    pub fn next(&mut self, cursor: u64, count: u64) -> Vec<Pair> {
        let Some(c) = self.cursors.get_mut(&cursor) else {
            self.last_error = Some(ERR_CURSOR_NOT_FOUND.into());
            if count > 0 {
                return vec![(None, None)];
            }
            return Vec::new();
        };
        let mut pairs = Vec::new();
        let mut remaining = count;
        while remaining > 0 {
            let (key, value) = c.next();
            let done = key.is_none();
            pairs.push((key, value));
            remaining -= 1;
            if done {
                break;
            }
        }
        self.last_error = None;
        pairs
    }

    /// Releases every live resource. Called on any dispatch-loop exit,
    /// graceful or fatal. Rollback errors are logged, not propagated.
    pub fn finish(&mut self) {
        for (handle, tx) in self.transactions.drain() {
            if let Err(e) = tx.rollback() {
                tracing::warn!(session = %self.id, handle, "rollback failed during cleanup: {e}");
            }
        }
        self.buckets.clear();
        self.cursors.clear();
        self.buckets_by_tx.clear();
        self.cursors_by_bucket.clear();
    }
}
