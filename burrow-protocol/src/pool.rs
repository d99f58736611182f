//! Bounded pool of reusable wire buffers.
//!
//! Sessions churn through read and write buffers at connection granularity;
//! the pool recycles them across connections. Inserts never block: when the
//! pool is full the buffer is dropped and a warning logged. Pooling is a
//! performance concern only and has no protocol semantics.

use bytes::BytesMut;
use parking_lot::Mutex;

/// Default number of buffers retained.
pub const DEFAULT_POOL_CAPACITY: usize = 128;

/// Initial capacity of a freshly allocated buffer.
const FRESH_BUFFER_CAPACITY: usize = 8 * 1024;

pub struct BufferPool {
    buffers: Mutex<Vec<BytesMut>>,
    capacity: usize,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Takes a buffer from the pool, or allocates a fresh one.
    pub fn acquire(&self) -> BytesMut {
        self.buffers
            .lock()
            .pop()
            .unwrap_or_else(|| BytesMut::with_capacity(FRESH_BUFFER_CAPACITY))
    }

    /// Returns a buffer to the pool. Overflow is discarded.
    pub fn release(&self, mut buffer: BytesMut) {
        buffer.clear();
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.capacity {
            buffers.push(buffer);
        } else {
            tracing::warn!("buffer pool full, dropping buffer");
        }
    }

    /// Number of buffers currently pooled.
    pub fn len(&self) -> usize {
        self.buffers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.lock().is_empty()
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}
