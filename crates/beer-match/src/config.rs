//! Match configuration.

use std::time::Duration;

use beer_board::{DEFAULT_BOARD_SIZE, FLEET, ONE_SHIP_FLEET};

/// Timings and variant flags for one match.
///
/// The lobby builds this once from server configuration; tests shrink
/// the timeouts to keep suspension paths fast and deterministic.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Board edge length.
    pub board_size: usize,

    /// Play with a single two-cell ship instead of the full fleet.
    pub one_ship: bool,

    /// How long the active slot has to produce a command.
    pub turn_timeout: Duration,

    /// Per-ship budget during manual placement, reset for each ship.
    pub place_timeout: Duration,

    /// How long a vacated slot waits for its token to reattach before
    /// spectator promotion is attempted.
    pub reconnect_timeout: Duration,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            board_size: DEFAULT_BOARD_SIZE,
            one_ship: false,
            turn_timeout: Duration::from_secs(60),
            place_timeout: Duration::from_secs(60),
            reconnect_timeout: Duration::from_secs(60),
        }
    }
}

impl MatchConfig {
    /// The fleet this match is played with.
    pub fn fleet(&self) -> &'static [(&'static str, usize)] {
        if self.one_ship {
            ONE_SHIP_FLEET
        } else {
            FLEET
        }
    }
}
