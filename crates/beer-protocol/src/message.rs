//! Application messages carried inside GAME and CHAT frames.
//!
//! These are the JSON shapes both sides speak once the handshake line
//! is done. Serde's internal tagging (`#[serde(tag = "type")]`) gives
//! every payload a `"type"` discriminator field, so a client can switch
//! on `payload.type` without knowing the full schema.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frame::FrameType;

// ---------------------------------------------------------------------------
// Shot classification
// ---------------------------------------------------------------------------

/// Outcome of firing at a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotResult {
    Hit,
    Miss,
    /// The cell was fired at before; the shooter keeps the turn.
    AlreadyShot,
}

// ---------------------------------------------------------------------------
// Terminal outcomes
// ---------------------------------------------------------------------------

/// How a match ended, from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    #[serde(rename = "A_win")]
    SlotAWin,
    #[serde(rename = "B_win")]
    SlotBWin,
    /// Both players vanished in the same window; nobody wins.
    #[serde(rename = "abandoned")]
    Abandoned,
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlotAWin => write!(f, "A_win"),
            Self::SlotBWin => write!(f, "B_win"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Why a match ended. Carried alongside the outcome so clients can
/// render "victory by concession" vs "fleet destroyed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndCause {
    /// Every opposing ship was sunk.
    FleetDestroyed,
    /// The loser sent QUIT.
    Concession,
    /// The loser dropped (or stalled) and never came back, and no
    /// spectator could take the slot.
    Timeout,
    /// Both slots dropped in the same window.
    Abandoned,
}

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Machine-readable codes for `err` payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrCode {
    /// Out-of-grammar or out-of-turn command. The turn does not advance.
    BadCommand,
    /// A spectator tried to issue a command.
    Spectator,
    /// A second transport tried to attach with a token that is already
    /// bound.
    DuplicateToken,
    /// Manual ship placement input was rejected (syntax, bounds, or
    /// overlap). The same ship is asked for again.
    BadPlacement,
}

// ---------------------------------------------------------------------------
// AppMessage
// ---------------------------------------------------------------------------

/// Every payload that travels in a GAME or CHAT frame.
///
/// Server → client: `prompt`, `shot`, `grid`, `oppgrid`, `info`, `err`,
/// `end`, plus relayed `chat`. Client → server: `cmd` (one command
/// line) and `chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AppMessage {
    /// "It is your turn"; sent to the active slot only.
    Prompt,

    /// A resolved shot, broadcast to both slots and all spectators.
    Shot {
        coord: String,
        result: ShotResult,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sunk: Option<String>,
    },

    /// The recipient's own board, ships revealed.
    Grid { rows: Vec<String> },

    /// The recipient's view of the opponent board, ships masked.
    OppGrid { rows: Vec<String> },

    /// Free-form informational text.
    Info { text: String },

    /// A locally-answered error; never terminates the match by itself.
    Err { code: ErrCode, text: String },

    /// Terminal event, broadcast to both slots and all spectators.
    End {
        outcome: MatchOutcome,
        cause: EndCause,
        /// Total shots fired across the whole match.
        shots: u32,
    },

    /// Player chat, relayed to the opponent and every spectator.
    Chat { name: String, msg: String },

    /// A client command line, e.g. `"FIRE E5"`. Parsed server-side into
    /// the command grammar.
    Cmd { line: String },
}

impl AppMessage {
    /// The frame type this payload travels in.
    pub fn frame_type(&self) -> FrameType {
        match self {
            Self::Chat { .. } => FrameType::Chat,
            _ => FrameType::Game,
        }
    }

    /// Shorthand for an `info` payload.
    pub fn info(text: impl Into<String>) -> Self {
        Self::Info { text: text.into() }
    }

    /// Shorthand for an `err` payload.
    pub fn err(code: ErrCode, text: impl Into<String>) -> Self {
        Self::Err {
            code,
            text: text.into(),
        }
    }

    /// Shorthand for a `cmd` payload.
    pub fn cmd(line: impl Into<String>) -> Self {
        Self::Cmd { line: line.into() }
    }
}

// =========================================================================
// Tests
// =========================================================================
