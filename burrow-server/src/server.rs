//! TCP server and session dispatch loop.
//!
//! One session per accepted connection. The dispatch loop is passive: it
//! reads one command, executes it against the session state, writes the
//! command's positional reply values, and repeats until the client closes
//! its stream. Responses are tied to commands only by order; there is no
//! request ID.

use crate::config::Config;
use crate::error::ServerError;
use crate::session::Session;
use burrow_protocol::{wire, BufferPool, Command, ProtocolError, PROTOCOL_VERSION};
use burrow_store::Store;
use bytes::BytesMut;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server for burrow.
pub struct Server {
    config: Config,
    store: Arc<Store>,
    pool: Arc<BufferPool>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server over the given store.
    pub fn new(config: Config, store: Arc<Store>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let pool = Arc::new(BufferPool::new(config.pool_capacity));
        Self {
            config,
            store,
            pool,
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Runs the accept loop until shutdown. Each accepted connection gets
    /// its own spawned session; sessions already running drain naturally on
    /// their own streams closing.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("server listening on {}", local_addr);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            stream.set_nodelay(true).ok();

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            let store = self.store.clone();
                            let pool = self.pool.clone();
                            let stats = self.stats.clone();

                            tokio::spawn(async move {
                                tracing::info!("client connected: {}", addr);
                                if let Err(e) = serve_with_pool(store, stream, &pool).await {
                                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                    tracing::debug!("session {} failed: {}", addr, e);
                                }
                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                                tracing::info!("client disconnected: {}", addr);
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("server shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Initiates shutdown of the accept loop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }
}

/// Serves one session over `stream` until end-of-input or a fatal error.
/// On return every handle the session allocated has been released and the
/// write side shut down.
pub async fn serve<S>(store: Arc<Store>, stream: S) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let pool = BufferPool::new(2);
    serve_with_pool(store, stream, &pool).await
}

/// [`serve`] with read/write buffers recycled through `pool`.
pub async fn serve_with_pool<S>(
    store: Arc<Store>,
    stream: S,
    pool: &BufferPool,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let mut rbuf = pool.acquire();
    let mut wbuf = pool.acquire();
    let mut session = Session::new(store);
    tracing::debug!(session = %session.id, "session started");

    let result = dispatch_loop(&mut session, &mut reader, &mut writer, &mut rbuf, &mut wbuf).await;

    // Cleanup runs on every exit path, graceful or fatal.
    session.finish();
    let _ = writer.shutdown().await;
    pool.release(rbuf);
    pool.release(wbuf);

    match &result {
        Ok(()) => tracing::debug!(session = %session.id, "session ended"),
        Err(e) => tracing::debug!(session = %session.id, "session aborted: {e}"),
    }
    result
}

async fn dispatch_loop<R, W>(
    session: &mut Session,
    reader: &mut R,
    writer: &mut W,
    rbuf: &mut BytesMut,
    wbuf: &mut BytesMut,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let command = loop {
            match Command::decode(rbuf)? {
                Some(command) => break command,
                None => {
                    let n = reader.read_buf(rbuf).await?;
                    if n == 0 {
                        if rbuf.is_empty() {
                            // Clean end of input: graceful termination.
                            return Ok(());
                        }
                        return Err(ProtocolError::UnexpectedEof.into());
                    }
                }
            }
        };

        tracing::debug!(session = %session.id, ?command, "dispatch");
        wbuf.clear();
        match command {
            Command::Version => wire::put_uint(wbuf, PROTOCOL_VERSION),
            Command::LastError => {
                wire::put_bytes(wbuf, Some(session.last_error().as_bytes()));
            }
            Command::BeginTx => {
                let handle = session.begin_tx();
                wire::put_uint(wbuf, handle);
            }
            Command::EndTx { tx } => {
                // No in-band reply; a rollback failure is fatal.
                session.end_tx(tx)?;
            }
            Command::Bucket { tx, name } => {
                let handle = session.open_bucket(tx, &name);
                wire::put_uint(wbuf, handle);
            }
            Command::Get { bucket, key } => {
                let value = session.get(bucket, &key);
                wire::put_bytes(wbuf, value.as_deref());
            }
            Command::Cursor { bucket } => {
                let handle = session.open_cursor(bucket);
                wire::put_uint(wbuf, handle);
            }
            Command::Seek { cursor, key } => {
                let (key, value) = session.seek(cursor, &key);
                wire::put_bytes(wbuf, key.as_deref());
                wire::put_bytes(wbuf, value.as_deref());
            }
            Command::Next { cursor, count } => {
                for (key, value) in session.next(cursor, count) {
                    wire::put_bytes(wbuf, key.as_deref());
                    wire::put_bytes(wbuf, value.as_deref());
                }
            }
        }

        if !wbuf.is_empty() {
            writer.write_all(wbuf).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_protocol::command::CommandTag;
    use bytes::BufMut;

    fn seeded_store() -> Arc<Store> {
        let store = Store::new();
        store.create_bucket(b"data").unwrap();
        store.put(b"data", b"alice", b"42").unwrap();
        Arc::new(store)
    }

    async fn roundtrip(input: BytesMut) -> (Result<(), ServerError>, BytesMut) {
        let (client, server) = tokio::io::duplex(4096);
        let handle = tokio::spawn(serve(seeded_store(), server));

        let (mut read_half, mut write_half) = tokio::io::split(client);
        write_half.write_all(&input).await.unwrap();
        write_half.shutdown().await.unwrap();

        let mut output = Vec::new();
        read_half.read_to_end(&mut output).await.unwrap();
        (handle.await.unwrap(), BytesMut::from(&output[..]))
    }

    #[tokio::test]
    async fn test_version_reply() {
        let mut input = BytesMut::new();
        Command::Version.encode(&mut input);

        let (result, mut output) = roundtrip(input).await;
        result.unwrap();
        assert_eq!(wire::decode_uint(&mut output).unwrap(), Some(PROTOCOL_VERSION));
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_is_fatal() {
        let mut input = BytesMut::new();
        input.put_u8(0x6b);

        let (result, output) = roundtrip(input).await;
        assert!(matches!(
            result,
            Err(ServerError::Protocol(ProtocolError::UnknownCommand(0x6b)))
        ));
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_truncated_command_is_fatal() {
        // EndTx declares a uint argument; ending the stream before it
        // arrives is not a graceful EOF.
        let mut input = BytesMut::new();
        input.put_u8(CommandTag::EndTx.as_u8());

        let (result, _) = roundtrip(input).await;
        assert!(matches!(
            result,
            Err(ServerError::Protocol(ProtocolError::UnexpectedEof))
        ));
    }

    #[tokio::test]
    async fn test_failure_reply_shape_matches_success() {
        // Get on a bogus bucket handle replies exactly one nil value,
        // leaving the stream aligned for the next command.
        let mut input = BytesMut::new();
        Command::Get {
            bucket: 9999,
            key: bytes::Bytes::from_static(b"k"),
        }
        .encode(&mut input);
        Command::Version.encode(&mut input);

        let (result, mut output) = roundtrip(input).await;
        result.unwrap();
        assert_eq!(wire::decode_bytes(&mut output).unwrap(), Some(None));
        assert_eq!(wire::decode_uint(&mut output).unwrap(), Some(PROTOCOL_VERSION));
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_version_and_last_error_leave_the_slot_alone() {
        // A deferred error survives intervening Version and LastError
        // commands; only the error-producing commands overwrite it.
        let mut input = BytesMut::new();
        Command::Bucket {
            tx: 99,
            name: bytes::Bytes::from_static(b"data"),
        }
        .encode(&mut input);
        Command::Version.encode(&mut input);
        Command::LastError.encode(&mut input);
        Command::LastError.encode(&mut input);

        let (result, mut output) = roundtrip(input).await;
        result.unwrap();

        assert_eq!(wire::decode_uint(&mut output).unwrap(), Some(0));
        assert_eq!(wire::decode_uint(&mut output).unwrap(), Some(PROTOCOL_VERSION));
        let expected = Some(Some(bytes::Bytes::from_static(b"transaction not found")));
        assert_eq!(wire::decode_bytes(&mut output).unwrap(), expected);
        assert_eq!(wire::decode_bytes(&mut output).unwrap(), expected);
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_handshake_wire_bytes() {
        // The first command on the wire is Version (tag 0); the first value
        // the client reads is the server's version constant.
        let (mut client_side, server_side) = tokio::io::duplex(256);
        let server = tokio::spawn(serve(seeded_store(), server_side));

        client_side.write_all(&[0u8]).await.unwrap();
        let mut reply = [0u8; 9];
        client_side.read_exact(&mut reply).await.unwrap();
        let mut buf = BytesMut::from(&reply[..]);
        assert_eq!(wire::decode_uint(&mut buf).unwrap(), Some(PROTOCOL_VERSION));

        client_side.shutdown().await.unwrap();
        drop(client_side);
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_mid_command_is_fatal_but_cleaned_up() {
        let (mut client_side, server_side) = tokio::io::duplex(256);
        let server = tokio::spawn(serve(seeded_store(), server_side));

        // BeginTx, then a Next command cut off mid-argument.
        let mut raw = BytesMut::new();
        raw.put_u8(CommandTag::BeginTx.as_u8());
        raw.put_u8(CommandTag::Next.as_u8());
        raw.put_u8(0x01);
        raw.put_u8(0);
        client_side.write_all(&raw).await.unwrap();
        client_side.shutdown().await.unwrap();

        let result = server.await.unwrap();
        assert!(matches!(result, Err(ServerError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_server_shutdown_flag() {
        let server = Server::new(Config::default(), seeded_store());
        assert!(!server.is_running());
    }
}
