//! Optional AES-CTR payload encryption.
//!
//! Confidentiality only: integrity comes from the frame CRC, which is
//! computed over the ciphertext so the check runs before decryption.
//! The counter block is derived from the frame's sequence number
//! (8-byte big-endian seq followed by 8 zero bytes), so both sides can
//! decrypt without carrying a nonce on the wire. Sequence numbers are
//! never reused within a connection, which keeps the keystream fresh.

use aes::cipher::{KeyIvInit, StreamCipher};
use aes::{Aes128, Aes192, Aes256};
use ctr::Ctr128BE;

use crate::FrameError;

type Aes128Ctr = Ctr128BE<Aes128>;
type Aes192Ctr = Ctr128BE<Aes192>;
type Aes256Ctr = Ctr128BE<Aes256>;

/// A symmetric payload cipher, selected by key length.
#[derive(Clone)]
pub(crate) enum FrameCipher {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

impl FrameCipher {
    /// Builds a cipher from a raw key. 16, 24 and 32 bytes select
    /// AES-128, AES-192 and AES-256 respectively.
    pub(crate) fn new(key: &[u8]) -> Result<Self, FrameError> {
        match key.len() {
            16 => {
                let mut k = [0u8; 16];
                k.copy_from_slice(key);
                Ok(Self::Aes128(k))
            }
            24 => {
                let mut k = [0u8; 24];
                k.copy_from_slice(key);
                Ok(Self::Aes192(k))
            }
            32 => {
                let mut k = [0u8; 32];
                k.copy_from_slice(key);
                Ok(Self::Aes256(k))
            }
            n => Err(FrameError::KeyLength(n)),
        }
    }

    /// Encrypts or decrypts `data` in place. CTR mode is its own
    /// inverse, so the same call serves both directions.
    pub(crate) fn apply(&self, seq: u32, data: &mut [u8]) {
        let iv = nonce_for(seq);
        match self {
            Self::Aes128(key) => {
                Aes128Ctr::new(key.into(), &iv.into()).apply_keystream(data)
            }
            Self::Aes192(key) => {
                Aes192Ctr::new(key.into(), &iv.into()).apply_keystream(data)
            }
            Self::Aes256(key) => {
                Aes256Ctr::new(key.into(), &iv.into()).apply_keystream(data)
            }
        }
    }
}

/// 16-byte CTR initial counter block: seq as u64 big-endian, zero-padded.
fn nonce_for(seq: u32) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..8].copy_from_slice(&u64::from(seq).to_be_bytes());
    iv
}
