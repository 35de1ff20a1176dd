//! # BEER server
//!
//! Networked turn-based battleship. This crate ties the layers
//! (transport → session → match) together behind the lobby, and
//! ships the `beer-server` binary.
//!
//! ```text
//! accept ──→ handshake ──→ classify:
//!              │             ├─ token pending in C2 → reattach to match
//!              │             ├─ match running       → spectator queue
//!              │             └─ otherwise           → waiting list
//!              │
//!        waiting ≥ 2 and idle → pair first two as A/B, start a match
//!              │
//!        match ends → requeue winner (head) and eligible loser (tail)
//! ```

mod config;
mod error;
mod lobby;

pub use config::{Cli, ServerConfig, DEFAULT_KEY_HEX};
pub use error::ServerError;
pub use lobby::{Lobby, Shutdown};
