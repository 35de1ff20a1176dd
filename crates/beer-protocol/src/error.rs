//! Error types for the protocol layer.
//!
//! Each crate in BEER defines its own error enum; this one covers every
//! way a frame can fail to decode. The variants map one-to-one onto the
//! receive-side failure classes the transport counts toward its
//! three-strike limit, so the reader loop can match on them directly.

use crate::frame::MAX_PAYLOAD_LEN;

/// Errors that can occur while packing or unpacking a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The magic bytes or protocol version didn't match. The stream is
    /// desynchronised and cannot be trusted past this point.
    #[error("magic/version mismatch")]
    BadHeader,

    /// The header declared a payload longer than [`MAX_PAYLOAD_LEN`].
    #[error("declared payload length {0} exceeds limit {MAX_PAYLOAD_LEN}")]
    Oversized(u32),

    /// The frame type byte is not one of GAME/CHAT/ACK/NAK.
    #[error("unknown frame type byte {0}")]
    UnknownType(u8),

    /// CRC-32 over header and payload didn't match the header field.
    /// Carries the sequence number so the receiver can NAK it.
    #[error("CRC mismatch for seq {0}")]
    Crc(u32),

    /// The encryption key had an unusable length at setup time. CTR
    /// mode itself never rejects input, so a wrong-key ciphertext
    /// surfaces later as [`FrameError::Parse`].
    #[error("AES key must be 16, 24, or 32 bytes, got {0}")]
    KeyLength(usize),

    /// The payload bytes are not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// The sequence number falls at or below the replay cutoff, or was
    /// already accepted once.
    #[error("replayed or stale seq {0}")]
    Replay(u32),

    /// The buffer or stream ended before a complete frame was read.
    #[error("stream ended mid-frame")]
    Truncated,
}
