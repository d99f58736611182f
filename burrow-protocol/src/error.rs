//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur while encoding or decoding the wire
/// stream. Any of these is fatal to the session that produced it.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown command tag: {0:#04x}")]
    UnknownCommand(u8),

    #[error("invalid value tag: {0:#04x}")]
    InvalidValueTag(u8),

    #[error("expected {expected} value, got tag {tag:#04x}")]
    ValueMismatch { expected: &'static str, tag: u8 },

    #[error("byte string too large: {len} bytes (max {max})")]
    BytesTooLarge { len: u32, max: u32 },

    #[error("stream ended in the middle of a value")]
    UnexpectedEof,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
