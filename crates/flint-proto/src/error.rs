//! Protocol-level errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("buffer too short: need {needed} more bytes, have {remaining}")]
    BufferTooShort { needed: usize, remaining: usize },

    #[error("VarInt encoding error: {0}")]
    VarInt(#[from] crate::types::VarIntError),

    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    #[error("string too long: {length} bytes, maximum {max}")]
    StringTooLong { length: usize, max: usize },

    #[error("byte array too long: {length} bytes, maximum {max}")]
    ArrayTooLong { length: usize, max: usize },

    #[error("frame of {length} bytes exceeds the {max} byte limit")]
    FrameTooLarge { length: usize, max: usize },

    #[error("compression error: {0}")]
    CompressError(String),

    #[error("decompression error: {0}")]
    DecompressError(String),

    #[error("badly compressed frame: {0}")]
    BadlyCompressed(String),

    #[error("unknown packet id: 0x{0:02X}")]
    UnknownPacketId(i32),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
