//! Low-level connection: one command out, positional reply values in.

use crate::error::ClientError;
use burrow_protocol::wire;
use burrow_protocol::Command;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Object-safe alias for the transport the connection runs over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// A connection to a burrow server. Commands are written eagerly; reply
/// values are read one at a time in the order the protocol declares them.
pub struct Connection {
    stream: Box<dyn Transport>,
    rbuf: BytesMut,
    wbuf: BytesMut,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("rbuf", &self.rbuf)
            .field("wbuf", &self.wbuf)
            .finish()
    }
}

impl Connection {
    pub fn new(stream: impl Transport + 'static) -> Self {
        Self {
            stream: Box::new(stream),
            rbuf: BytesMut::with_capacity(8 * 1024),
            wbuf: BytesMut::with_capacity(256),
        }
    }

    /// Sends one command.
    pub async fn send(&mut self, command: &Command) -> Result<(), ClientError> {
        self.wbuf.clear();
        command.encode(&mut self.wbuf);
        tracing::debug!(?command, "send");
        self.stream.write_all(&self.wbuf).await?;
        Ok(())
    }

    async fn fill(&mut self) -> Result<(), ClientError> {
        let n = self.stream.read_buf(&mut self.rbuf).await?;
        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }
        Ok(())
    }

    /// Reads one unsigned integer reply value.
    pub async fn read_uint(&mut self) -> Result<u64, ClientError> {
        loop {
            if let Some(v) = wire::decode_uint(&mut self.rbuf)? {
                return Ok(v);
            }
            self.fill().await?;
        }
    }

    /// Reads one byte-string reply value; `None` is the nil sentinel.
    pub async fn read_bytes(&mut self) -> Result<Option<Bytes>, ClientError> {
        loop {
            if let Some(v) = wire::decode_bytes(&mut self.rbuf)? {
                return Ok(v);
            }
            self.fill().await?;
        }
    }

    /// Reads one byte-string reply value as text (the `LastError` reply).
    pub async fn read_string(&mut self) -> Result<String, ClientError> {
        let value = self.read_bytes().await?.unwrap_or_default();
        Ok(String::from_utf8_lossy(&value).into_owned())
    }

    /// Reads one key/value pair.
    pub async fn read_pair(&mut self) -> Result<(Option<Bytes>, Option<Bytes>), ClientError> {
        let key = self.read_bytes().await?;
        let value = self.read_bytes().await?;
        Ok((key, value))
    }

    /// Shuts down the write side of the transport.
    pub async fn shutdown(&mut self) -> Result<(), ClientError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
