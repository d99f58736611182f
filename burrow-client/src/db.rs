//! Transaction-scoped client API.
//!
//! The API mirrors the embedded store's read path: open a transaction, look
//! up buckets, point-get values, iterate cursors. Every call issues one
//! protocol command and reads its positional reply. Failure sentinels
//! (handle 0, unexpected nil) trigger a `LastError` probe and surface as
//! [`ClientError::Remote`].
//!
//! One command round-trips at a time: the protocol has no request IDs, so
//! replies are matched to commands purely by order. The internal mutex keeps
//! each command's round trip atomic, but interleaving transactions from
//! concurrent tasks over one connection is not supported.

use crate::connection::{Connection, Transport};
use crate::error::ClientError;
use burrow_protocol::{Command, PROTOCOL_VERSION};
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Default timeout for establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A remote burrow database reached over one byte stream.
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Connects over TCP and performs the version handshake.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        Self::connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// [`Db::connect`] with an explicit connect timeout.
    pub async fn connect_with_timeout(
        addr: SocketAddr,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::ConnectTimeout)??;
        stream.set_nodelay(true).ok();
        Self::handshake(stream).await
    }

    /// Performs the version handshake over an already-established stream.
    /// Construction fails unless the server speaks exactly
    /// [`PROTOCOL_VERSION`].
    pub async fn handshake(stream: impl Transport + 'static) -> Result<Self, ClientError> {
        let mut conn = Connection::new(stream);
        conn.send(&Command::Version).await?;
        let server = conn.read_uint().await?;
        if server != PROTOCOL_VERSION {
            return Err(ClientError::VersionMismatch {
                server,
                client: PROTOCOL_VERSION,
            });
        }
        tracing::debug!(version = server, "handshake complete");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens a read-only transaction. Prefer [`Db::view`], which guarantees
    /// the transaction is ended; a `Tx` that is dropped without
    /// [`Tx::rollback`] stays open on the server until the connection
    /// closes.
    pub async fn begin(&self) -> Result<Tx, ClientError> {
        let mut conn = self.conn.lock().await;
        conn.send(&Command::BeginTx).await?;
        let handle = read_handle(&mut conn).await?;
        Ok(Tx {
            conn: self.conn.clone(),
            handle,
        })
    }

    /// Runs `f` inside a read-only transaction. The transaction is ended
    /// unconditionally after `f` returns, whether it succeeded or not; do
    /// not call [`Tx::rollback`] inside the closure.
    pub async fn view<T, F, Fut>(&self, f: F) -> Result<T, ClientError>
    where
        F: FnOnce(Tx) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let tx = self.begin().await?;
        let handle = tx.handle;
        let result = f(tx).await;

        let mut conn = self.conn.lock().await;
        conn.send(&Command::EndTx { tx: handle }).await?;
        result
    }

    /// Probes the server's deferred-error slot. `None` means the most
    /// recent deferred-error command succeeded.
    pub async fn last_error(&self) -> Result<Option<String>, ClientError> {
        let mut conn = self.conn.lock().await;
        conn.send(&Command::LastError).await?;
        let text = conn.read_string().await?;
        Ok((!text.is_empty()).then_some(text))
    }

    /// Shuts down the write side; the server observes end-of-input and
    /// releases every resource this session holds.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.lock().await.shutdown().await
    }
}

/// Reads a handle reply; 0 means the allocation failed and the deferred
/// error explains why.
async fn read_handle(conn: &mut Connection) -> Result<u64, ClientError> {
    let handle = conn.read_uint().await?;
    if handle != 0 {
        return Ok(handle);
    }
    conn.send(&Command::LastError).await?;
    let message = conn.read_string().await?;
    Err(ClientError::Remote(message))
}

/// An open read-only transaction on the remote database.
#[derive(Debug)]
pub struct Tx {
    conn: Arc<Mutex<Connection>>,
    handle: u64,
}

impl Tx {
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Opens a named bucket within this transaction.
    pub async fn bucket(&self, name: &[u8]) -> Result<Bucket, ClientError> {
        let mut conn = self.conn.lock().await;
        conn.send(&Command::Bucket {
            tx: self.handle,
            name: Bytes::copy_from_slice(name),
        })
        .await?;
        let handle = read_handle(&mut conn).await?;
        Ok(Bucket {
            conn: self.conn.clone(),
            handle,
        })
    }

    /// Ends the transaction, invalidating its buckets and cursors.
    pub async fn rollback(self) -> Result<(), ClientError> {
        let mut conn = self.conn.lock().await;
        conn.send(&Command::EndTx { tx: self.handle }).await
    }
}

/// An open bucket within a remote transaction.
pub struct Bucket {
    conn: Arc<Mutex<Connection>>,
    handle: u64,
}

impl Bucket {
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Point lookup. `None` means the key is absent, or that the handle is
    /// dead because its transaction ended; probe [`Db::last_error`] to
    /// distinguish.
    pub async fn get(&self, key: &[u8]) -> Result<Option<Bytes>, ClientError> {
        let mut conn = self.conn.lock().await;
        conn.send(&Command::Get {
            bucket: self.handle,
            key: Bytes::copy_from_slice(key),
        })
        .await?;
        conn.read_bytes().await
    }

    /// Opens a forward cursor over this bucket.
    pub async fn cursor(&self) -> Result<Cursor, ClientError> {
        let mut conn = self.conn.lock().await;
        conn.send(&Command::Cursor { bucket: self.handle }).await?;
        let handle = read_handle(&mut conn).await?;
        Ok(Cursor {
            conn: self.conn.clone(),
            handle,
        })
    }
}

/// A forward cursor over a remote bucket, iterating keys in ascending
/// lexicographic order.
pub struct Cursor {
    conn: Arc<Mutex<Connection>>,
    handle: u64,
}

impl Cursor {
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Positions the cursor at the smallest key >= `key` and returns that
    /// pair; `(None, None)` when iteration is exhausted. An empty `key`
    /// positions at the first key in the bucket.
    pub async fn seek(
        &self,
        key: &[u8],
    ) -> Result<(Option<Bytes>, Option<Bytes>), ClientError> {
        let mut conn = self.conn.lock().await;
        conn.send(&Command::Seek {
            cursor: self.handle,
            key: Bytes::copy_from_slice(key),
        })
        .await?;
        conn.read_pair().await
    }

    /// Advances up to `n` pairs, stopping early at the end of the bucket.
    /// Returns only real pairs; the nil terminator is consumed, not
    /// returned.
    pub async fn next(&self, n: u64) -> Result<Vec<(Bytes, Bytes)>, ClientError> {
        let mut conn = self.conn.lock().await;
        conn.send(&Command::Next {
            cursor: self.handle,
            count: n,
        })
        .await?;

        let mut pairs = Vec::new();
        for _ in 0..n {
            let (key, value) = conn.read_pair().await?;
            match key {
                Some(key) => pairs.push((key, value.unwrap_or_default())),
                None => break,
            }
        }
        Ok(pairs)
    }
}
