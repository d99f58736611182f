//! Embedded ordered key-value store.
//!
//! Data lives in named buckets; each bucket is an ordered map from byte-string
//! keys to byte-string values. Writes are copy-on-write at bucket granularity,
//! so a read-only transaction is a true snapshot: it sees the state of the
//! store at its begin time regardless of later writes, and any number of
//! transactions can be open concurrently across threads.

use crate::error::StoreError;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

type BucketData = BTreeMap<Vec<u8>, Bytes>;

struct Inner {
    buckets: BTreeMap<Vec<u8>, Arc<BucketData>>,
    closed: bool,
}

/// Shared handle to the store. Cloning is cheap and all clones refer to the
/// same data.
#[derive(Clone)]
pub struct Store {
    inner: Arc<RwLock<Inner>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                buckets: BTreeMap::new(),
                closed: false,
            })),
        }
    }

    /// Creates a bucket if it does not already exist.
    pub fn create_bucket(&self, name: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        inner
            .buckets
            .entry(name.to_vec())
            .or_insert_with(|| Arc::new(BucketData::new()));
        Ok(())
    }

    /// Stores `value` under `key` in the named bucket.
    pub fn put(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        let data = inner
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(String::from_utf8_lossy(bucket).into()))?;
        Arc::make_mut(data).insert(key.to_vec(), Bytes::copy_from_slice(value));
        Ok(())
    }

    /// Removes `key` from the named bucket.
    pub fn delete(&self, bucket: &[u8], key: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        let data = inner
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(String::from_utf8_lossy(bucket).into()))?;
        Arc::make_mut(data).remove(key);
        Ok(())
    }

    /// Opens a read-only transaction pinned to the current state.
    pub fn begin(&self) -> Result<ReadTx, StoreError> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        Ok(ReadTx {
            snapshot: inner.buckets.clone(),
        })
    }

    /// Marks the store closed. Subsequent writes and `begin` calls fail;
    /// transactions already open keep their snapshots.
    pub fn close(&self) {
        self.inner.write().closed = true;
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// A read-only transaction: an immutable snapshot of every bucket.
pub struct ReadTx {
    snapshot: BTreeMap<Vec<u8>, Arc<BucketData>>,
}

impl ReadTx {
    /// Looks up a named bucket in the snapshot.
    pub fn bucket(&self, name: &[u8]) -> Option<Bucket> {
        self.snapshot.get(name).map(|data| Bucket {
            data: data.clone(),
        })
    }

    /// Releases the snapshot.
    pub fn rollback(self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// A bucket within a read-only transaction.
#[derive(Clone)]
pub struct Bucket {
    data: Arc<BucketData>,
}

impl Bucket {
    /// Point lookup. Returns `None` when the key is absent.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.data.get(key).cloned()
    }

    /// Number of keys in the bucket.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Opens a forward cursor over the bucket. The cursor is unpositioned
    /// until the first `seek` or `next`.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            data: self.data.clone(),
            pos: CursorPos::Unpositioned,
        }
    }
}

enum CursorPos {
    Unpositioned,
    At(Vec<u8>),
    Exhausted,
}

/// A stateful forward iterator over a bucket's keys in ascending
/// lexicographic order.
pub struct Cursor {
    data: Arc<BucketData>,
    pos: CursorPos,
}

impl Cursor {
    /// Positions the cursor at the smallest key >= `key` and returns that
    /// pair, or `(None, None)` when no such key exists. An empty `key`
    /// positions at the first key in the bucket. Seeking again after
    /// exhaustion is valid.
    pub fn seek(&mut self, key: &[u8]) -> (Option<Bytes>, Option<Bytes>) {
        let found = self
            .data
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()));
        match found {
            Some((k, v)) => {
                let pair = (Some(Bytes::copy_from_slice(&k)), Some(v));
                self.pos = CursorPos::At(k);
                pair
            }
            None => {
                self.pos = CursorPos::Exhausted;
                (None, None)
            }
        }
    }

    /// Advances one pair. Returns `(None, None)` once the bucket is
    /// exhausted; further calls keep returning it.
    pub fn next(&mut self) -> (Option<Bytes>, Option<Bytes>) {
        let found = match &self.pos {
            CursorPos::Unpositioned => self
                .data
                .iter()
                .next()
                .map(|(k, v)| (k.clone(), v.clone())),
            CursorPos::At(current) => self
                .data
                .range::<[u8], _>((Bound::Excluded(&current[..]), Bound::Unbounded))
                .next()
                .map(|(k, v)| (k.clone(), v.clone())),
            CursorPos::Exhausted => None,
        };
        match found {
            Some((k, v)) => {
                let pair = (Some(Bytes::copy_from_slice(&k)), Some(v));
                self.pos = CursorPos::At(k);
                pair
            }
            None => {
                self.pos = CursorPos::Exhausted;
                (None, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Store {
        let store = Store::new();
        store.create_bucket(b"data").unwrap();
        store.put(b"data", b"a", b"1").unwrap();
        store.put(b"data", b"b", b"2").unwrap();
        store.put(b"data", b"c", b"3").unwrap();
        store
    }

    #[test]
    fn test_get() {
        let store = seeded();
        let tx = store.begin().unwrap();
        let bucket = tx.bucket(b"data").unwrap();
        assert_eq!(bucket.get(b"a"), Some(Bytes::from_static(b"1")));
        assert_eq!(bucket.get(b"missing"), None);
        tx.rollback().unwrap();
    }

    #[test]
    fn test_missing_bucket() {
        let store = seeded();
        let tx = store.begin().unwrap();
        assert!(tx.bucket(b"absent").is_none());
    }

    #[test]
    fn test_put_requires_bucket() {
        let store = Store::new();
        assert!(matches!(
            store.put(b"nope", b"k", b"v"),
            Err(StoreError::BucketNotFound(_))
        ));
    }

    #[test]
    fn test_snapshot_isolation() {
        let store = seeded();
        let tx = store.begin().unwrap();
        store.put(b"data", b"a", b"changed").unwrap();
        store.put(b"data", b"z", b"new").unwrap();

        let bucket = tx.bucket(b"data").unwrap();
        assert_eq!(bucket.get(b"a"), Some(Bytes::from_static(b"1")));
        assert_eq!(bucket.get(b"z"), None);

        let fresh = store.begin().unwrap();
        assert_eq!(
            fresh.bucket(b"data").unwrap().get(b"a"),
            Some(Bytes::from_static(b"changed"))
        );
    }

    #[test]
    fn test_cursor_seek_and_next() {
        let store = seeded();
        let tx = store.begin().unwrap();
        let mut cursor = tx.bucket(b"data").unwrap().cursor();

        let (k, v) = cursor.seek(b"");
        assert_eq!(k.as_deref(), Some(&b"a"[..]));
        assert_eq!(v.as_deref(), Some(&b"1"[..]));

        let (k, v) = cursor.next();
        assert_eq!(k.as_deref(), Some(&b"b"[..]));
        assert_eq!(v.as_deref(), Some(&b"2"[..]));

        let (k, _) = cursor.next();
        assert_eq!(k.as_deref(), Some(&b"c"[..]));

        assert_eq!(cursor.next(), (None, None));
        assert_eq!(cursor.next(), (None, None));
    }

    #[test]
    fn test_cursor_seek_between_keys() {
        let store = seeded();
        let tx = store.begin().unwrap();
        let mut cursor = tx.bucket(b"data").unwrap().cursor();

        // No key "aa"; lands on the next one.
        let (k, _) = cursor.seek(b"aa");
        assert_eq!(k.as_deref(), Some(&b"b"[..]));
    }

    #[test]
    fn test_cursor_seek_past_end_then_reseek() {
        let store = seeded();
        let tx = store.begin().unwrap();
        let mut cursor = tx.bucket(b"data").unwrap().cursor();

        assert_eq!(cursor.seek(b"zzz"), (None, None));
        let (k, _) = cursor.seek(b"b");
        assert_eq!(k.as_deref(), Some(&b"b"[..]));
    }

    #[test]
    fn test_cursor_next_unpositioned_starts_at_first() {
        let store = seeded();
        let tx = store.begin().unwrap();
        let mut cursor = tx.bucket(b"data").unwrap().cursor();
        let (k, _) = cursor.next();
        assert_eq!(k.as_deref(), Some(&b"a"[..]));
    }

    #[test]
    fn test_closed_store() {
        let store = seeded();
        let tx = store.begin().unwrap();
        store.close();

        assert!(matches!(store.begin(), Err(StoreError::Closed)));
        assert!(matches!(
            store.put(b"data", b"k", b"v"),
            Err(StoreError::Closed)
        ));

        // The open snapshot still reads.
        assert_eq!(
            tx.bucket(b"data").unwrap().get(b"a"),
            Some(Bytes::from_static(b"1"))
        );
    }

    #[test]
    fn test_delete() {
        let store = seeded();
        store.delete(b"data", b"b").unwrap();
        let tx = store.begin().unwrap();
        let bucket = tx.bucket(b"data").unwrap();
        assert_eq!(bucket.get(b"b"), None);
        assert_eq!(bucket.len(), 2);
    }
}
