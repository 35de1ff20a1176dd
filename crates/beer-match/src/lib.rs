//! Match sessions for the BEER server.
//!
//! A match is two slots, two boards and a turn. Each session runs as
//! its own Tokio task: per-slot reader loops feed parsed input into one
//! mpsc channel, and the session coordinator (the only place that
//! mutates game state) drives the state machine:
//!
//! ```text
//! PLACING_A → PLACING_B → AWAIT_TURN ⇄ EXECUTE_SHOT
//!                              │
//!                         SUSPENDED ──(reattach / promote)──→ AWAIT_TURN
//!                              │
//!                          TERMINAL
//! ```
//!
//! Suspension covers turn timeouts, transport EOF and CRC-quota kills;
//! recovery goes through the reconnect registry first and the spectator
//! queue second, cascading until someone sticks or nobody is left.

mod command;
mod config;
mod session;
mod spectator;

pub use command::{parse_command, parse_placement, Command, CommandError};
pub use config::MatchConfig;
pub use session::{MatchReport, MatchSession, Seat, SlotId};
pub use spectator::SpectatorHub;
