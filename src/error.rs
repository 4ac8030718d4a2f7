//! Unified error type for the protocol engine and everything built on it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TexecomError {
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame did not start with 't' (got byte 0x{0:02x})")]
    FrameBadStart(u8),

    #[error("frame CRC mismatch: expected 0x{expected:02x}, got 0x{got:02x}")]
    FrameBadCrc { expected: u8, got: u8 },

    #[error("frame ended early: expected {expected} bytes, got {got}")]
    FrameShort { expected: usize, got: usize },

    #[error("sequence mismatch: expected {expected}, got {got}")]
    SequenceMismatch { expected: u8, got: u8 },

    #[error("login rejected by panel (NAK)")]
    LoginRejected,

    #[error("peer disconnected the session")]
    PeerDisconnect,

    #[error("timed out waiting for a response")]
    Timeout,

    #[error("retries exhausted; session considered dead")]
    RetriesExhausted,

    #[error("malformed payload for {command}: {detail}")]
    MalformedPayload { command: &'static str, detail: String },

    #[error("protocol desynchronised: {0}")]
    Desync(String),
}

pub type Result<T> = std::result::Result<T, TexecomError>;
