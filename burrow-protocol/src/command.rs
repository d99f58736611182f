//! Command tags and typed command framing.
//!
//! Each command on the wire is a single raw tag byte followed by its
//! arguments, every argument encoded as a self-describing value (see
//! [`crate::wire`]). Responses carry no tag and no framing: they are the
//! concatenated reply values, matched to commands by strict positional
//! ordering on the stream.

use crate::error::ProtocolError;
use crate::wire::{self, parse_bytes, parse_uint};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// One-byte command discriminants. The set is closed; an unknown tag is
/// fatal to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandTag {
    /// Ask for the server's protocol version. Also usable as a keepalive.
    Version = 0,
    /// Ask for the textual outcome of the most recent deferred-error command.
    LastError = 1,
    /// Open a read-only transaction; replies its handle, 0 on failure.
    BeginTx = 2,
    /// Roll back a transaction and invalidate its descendants. No reply.
    EndTx = 3,
    /// Open a named bucket in a transaction; replies its handle, 0 on failure.
    Bucket = 4,
    /// Point lookup in a bucket; replies the value or nil.
    Get = 5,
    /// Open a forward cursor on a bucket; replies its handle, 0 on failure.
    Cursor = 6,
    /// Position a cursor at the smallest key >= the seek key; replies the
    /// key/value pair there, nil/nil when exhausted.
    Seek = 7,
    /// Stream up to n key/value pairs from a cursor; a nil key ends the
    /// stream early.
    Next = 8,
}

impl CommandTag {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for CommandTag {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, ProtocolError> {
        match tag {
            0 => Ok(CommandTag::Version),
            1 => Ok(CommandTag::LastError),
            2 => Ok(CommandTag::BeginTx),
            3 => Ok(CommandTag::EndTx),
            4 => Ok(CommandTag::Bucket),
            5 => Ok(CommandTag::Get),
            6 => Ok(CommandTag::Cursor),
            7 => Ok(CommandTag::Seek),
            8 => Ok(CommandTag::Next),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }
}

/// A fully decoded command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Version,
    LastError,
    BeginTx,
    EndTx { tx: u64 },
    Bucket { tx: u64, name: Bytes },
    Get { bucket: u64, key: Bytes },
    Cursor { bucket: u64 },
    Seek { cursor: u64, key: Bytes },
    Next { cursor: u64, count: u64 },
}

impl Command {
    pub fn tag(&self) -> CommandTag {
        match self {
            Command::Version => CommandTag::Version,
            Command::LastError => CommandTag::LastError,
            Command::BeginTx => CommandTag::BeginTx,
            Command::EndTx { .. } => CommandTag::EndTx,
            Command::Bucket { .. } => CommandTag::Bucket,
            Command::Get { .. } => CommandTag::Get,
            Command::Cursor { .. } => CommandTag::Cursor,
            Command::Seek { .. } => CommandTag::Seek,
            Command::Next { .. } => CommandTag::Next,
        }
    }

    /// Encodes the command tag and arguments.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tag().as_u8());
        match self {
            Command::Version | Command::LastError | Command::BeginTx => {}
            Command::EndTx { tx } => wire::put_uint(buf, *tx),
            Command::Bucket { tx, name } => {
                wire::put_uint(buf, *tx);
                wire::put_bytes(buf, Some(name));
            }
            Command::Get { bucket, key } => {
                wire::put_uint(buf, *bucket);
                wire::put_bytes(buf, Some(key));
            }
            Command::Cursor { bucket } => wire::put_uint(buf, *bucket),
            Command::Seek { cursor, key } => {
                wire::put_uint(buf, *cursor);
                wire::put_bytes(buf, Some(key));
            }
            Command::Next { cursor, count } => {
                wire::put_uint(buf, *cursor);
                wire::put_uint(buf, *count);
            }
        }
    }

    /// Decodes one command from `buf`.
    ///
    /// Returns `Ok(Some(command))` once the tag and every declared argument
    /// are present, `Ok(None)` if more data is needed (nothing consumed), or
    /// `Err` on an unknown tag or malformed argument.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Command>, ProtocolError> {
        if buf.is_empty() {
            return Ok(None);
        }
        let tag = CommandTag::try_from(buf[0])?;
        let mut view = &buf[1..];

        macro_rules! need {
            ($parsed:expr) => {
                match $parsed? {
                    Some(v) => v,
                    None => return Ok(None),
                }
            };
        }
        // A nil where an argument byte string is expected reads as empty.
        let command = match tag {
            CommandTag::Version => Command::Version,
            CommandTag::LastError => Command::LastError,
            CommandTag::BeginTx => Command::BeginTx,
            CommandTag::EndTx => Command::EndTx {
                tx: need!(parse_uint(&mut view)),
            },
            CommandTag::Bucket => Command::Bucket {
                tx: need!(parse_uint(&mut view)),
                name: need!(parse_bytes(&mut view)).unwrap_or_else(Bytes::new),
            },
            CommandTag::Get => Command::Get {
                bucket: need!(parse_uint(&mut view)),
                key: need!(parse_bytes(&mut view)).unwrap_or_else(Bytes::new),
            },
            CommandTag::Cursor => Command::Cursor {
                bucket: need!(parse_uint(&mut view)),
            },
            CommandTag::Seek => Command::Seek {
                cursor: need!(parse_uint(&mut view)),
                key: need!(parse_bytes(&mut view)).unwrap_or_else(Bytes::new),
            },
            CommandTag::Next => Command::Next {
                cursor: need!(parse_uint(&mut view)),
                count: need!(parse_uint(&mut view)),
            },
        };

        let consumed = buf.len() - view.len();
        buf.advance(consumed);
        Ok(Some(command))
    }
}
