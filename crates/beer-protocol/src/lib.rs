//! Wire protocol for the BEER battleship server.
//!
//! This crate owns everything that travels on the wire and nothing that
//! doesn't: the 16-byte frame header, CRC-32 integrity, optional AES-CTR
//! payload encryption, the retransmit buffer and replay window used for
//! application-level reliability, and the JSON application messages.
//!
//! The layers above (`beer-transport`, `beer-match`, `beer-server`) speak
//! in terms of [`AppMessage`] values; this crate turns them into framed
//! bytes and back.

mod crypto;
mod error;
mod frame;
mod message;
mod reliability;
mod token;

pub use error::FrameError;
pub use frame::{
    FrameCodec, FrameType, Header, HEADER_LEN, MAGIC, MAX_PAYLOAD_LEN,
    VERSION,
};
pub use message::{AppMessage, EndCause, ErrCode, MatchOutcome, ShotResult};
pub use reliability::{
    ReplayWindow, RetransmitBuffer, REPLAY_WINDOW, RETRANSMIT_WINDOW,
};
pub use token::Token;
