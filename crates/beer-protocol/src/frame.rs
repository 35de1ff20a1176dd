//! Frame packing and unpacking.
//!
//! Every unit on the wire is a frame:
//!
//! ```text
//! 0        2     3     4        8        12       16
//! ├─ magic ┼ ver ┼ typ ┼─ seq ──┼─ len ──┼─ crc ──┼─ payload … ┤
//! │ 0xBEEF │  1  │ u8  │ u32 BE │ u32 BE │ u32 BE │ len bytes  │
//! ```
//!
//! The CRC-32 covers the first 12 header bytes concatenated with the
//! payload. When encryption is enabled the payload is AES-CTR ciphertext
//! and the CRC covers the ciphertext, so integrity is checked before any
//! decryption happens. Control frames (ACK/NAK) carry a zero-length
//! payload; their `seq` field names the frame being (n)acked rather than
//! a fresh sequence number.

use serde_json::Value;

use crate::crypto::FrameCipher;
use crate::FrameError;

/// Frame magic, first two bytes of every frame.
pub const MAGIC: u16 = 0xBEEF;

/// Protocol version carried in byte 2.
pub const VERSION: u8 = 1;

/// Fixed header length in bytes, CRC included.
pub const HEADER_LEN: usize = 16;

/// Upper bound on the declared payload length. Real payloads are board
/// renders and chat lines, well under a kilobyte; anything near this
/// limit is corruption or abuse.
pub const MAX_PAYLOAD_LEN: u32 = 64 * 1024;

// ---------------------------------------------------------------------------
// FrameType
// ---------------------------------------------------------------------------

/// The four frame categories of the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Game traffic: prompts, shots, grids, errors, commands.
    Game = 0,
    /// Player chat, relayed verbatim to opponent and spectators.
    Chat = 1,
    /// Acknowledges receipt of the frame with the carried seq.
    Ack = 2,
    /// Requests retransmission of the frame with the carried seq.
    Nak = 3,
}

impl FrameType {
    /// Decodes the header's type byte.
    pub fn from_byte(b: u8) -> Result<Self, FrameError> {
        match b {
            0 => Ok(Self::Game),
            1 => Ok(Self::Chat),
            2 => Ok(Self::Ack),
            3 => Ok(Self::Nak),
            other => Err(FrameError::UnknownType(other)),
        }
    }

    /// Returns `true` for ACK/NAK frames, which never carry a payload
    /// and are handled inside the transport rather than surfaced.
    pub fn is_control(self) -> bool {
        matches!(self, Self::Ack | Self::Nak)
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// A parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub frame_type: FrameType,
    pub seq: u32,
    pub len: u32,
    pub crc: u32,
}

impl Header {
    /// Parses and sanity-checks the fixed 16-byte header.
    ///
    /// Magic and version mismatches mean the stream is desynchronised;
    /// an oversized length means the same or worse. Both are fatal to
    /// the connection; there is no way to find the next frame boundary.
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self, FrameError> {
        let magic = u16::from_be_bytes([bytes[0], bytes[1]]);
        let version = bytes[2];
        if magic != MAGIC || version != VERSION {
            return Err(FrameError::BadHeader);
        }
        let frame_type = FrameType::from_byte(bytes[3])?;
        let seq = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let len =
            u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if len > MAX_PAYLOAD_LEN {
            return Err(FrameError::Oversized(len));
        }
        let crc =
            u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        Ok(Self {
            frame_type,
            seq,
            len,
            crc,
        })
    }
}

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// Packs and unpacks frames, with or without payload encryption.
///
/// The codec is cheap to clone and is shared by every connection on a
/// server (the key, when present, is process-wide and agreed
/// out-of-band).
#[derive(Clone, Default)]
pub struct FrameCodec {
    cipher: Option<FrameCipher>,
}

impl FrameCodec {
    /// A codec that sends payloads as plaintext JSON.
    pub fn plaintext() -> Self {
        Self { cipher: None }
    }

    /// A codec that encrypts payloads with AES-CTR under `key`.
    pub fn encrypted(key: &[u8]) -> Result<Self, FrameError> {
        Ok(Self {
            cipher: Some(FrameCipher::new(key)?),
        })
    }

    /// Whether payload encryption is active.
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Packs `payload` into a complete frame.
    pub fn pack(
        &self,
        frame_type: FrameType,
        seq: u32,
        payload: &Value,
    ) -> Result<Vec<u8>, FrameError> {
        let mut body = serde_json::to_vec(payload)?;
        if let Some(cipher) = &self.cipher {
            cipher.apply(seq, &mut body);
        }
        Ok(assemble(frame_type, seq, &body))
    }

    /// Packs an ACK or NAK carrying `seq` and no payload.
    pub fn pack_control(&self, frame_type: FrameType, seq: u32) -> Vec<u8> {
        assemble(frame_type, seq, &[])
    }

    /// Verifies and decodes a payload against its already-parsed header.
    ///
    /// The transport reads the header and then exactly `header.len`
    /// payload bytes before calling this. A zero-length payload decodes
    /// to `Value::Null` (the control-frame case).
    pub fn unpack_payload(
        &self,
        header: &Header,
        header_bytes: &[u8; HEADER_LEN],
        payload: &[u8],
    ) -> Result<Value, FrameError> {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header_bytes[..HEADER_LEN - 4]);
        hasher.update(payload);
        if hasher.finalize() != header.crc {
            return Err(FrameError::Crc(header.seq));
        }
        if payload.is_empty() {
            return Ok(Value::Null);
        }
        let mut body = payload.to_vec();
        if let Some(cipher) = &self.cipher {
            cipher.apply(header.seq, &mut body);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Unpacks one complete frame from a byte buffer.
    ///
    /// Convenience for tests and tools; the transport uses the
    /// header-then-payload path instead.
    pub fn unpack(
        &self,
        frame: &[u8],
    ) -> Result<(FrameType, u32, Value), FrameError> {
        if frame.len() < HEADER_LEN {
            return Err(FrameError::Truncated);
        }
        let mut header_bytes = [0u8; HEADER_LEN];
        header_bytes.copy_from_slice(&frame[..HEADER_LEN]);
        let header = Header::parse(&header_bytes)?;
        let end = HEADER_LEN + header.len as usize;
        if frame.len() < end {
            return Err(FrameError::Truncated);
        }
        let payload = self.unpack_payload(
            &header,
            &header_bytes,
            &frame[HEADER_LEN..end],
        )?;
        Ok((header.frame_type, header.seq, payload))
    }
}

/// Builds the final wire bytes for an already-encrypted payload.
fn assemble(frame_type: FrameType, seq: u32, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&MAGIC.to_be_bytes());
    frame.push(VERSION);
    frame.push(frame_type as u8);
    frame.extend_from_slice(&seq.to_be_bytes());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&frame);
    hasher.update(body);
    frame.extend_from_slice(&hasher.finalize().to_be_bytes());
    frame.extend_from_slice(body);
    frame
}

// =========================================================================
// Tests
// =========================================================================
