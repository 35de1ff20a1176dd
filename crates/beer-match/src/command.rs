//! Command parsing at the edge.
//!
//! Client lines are parsed exactly once, here, into tagged variants;
//! the session dispatches on the tag and never re-inspects text. The
//! grammar is three verbs:
//!
//! ```text
//! FIRE <coord>    shoot at a cell, e.g. FIRE B5
//! CHAT <text>     relay text to the opponent and spectators
//! QUIT            concede the match
//! ```

use beer_board::{Coord, CoordError, Orientation};

/// A parsed player command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Fire(Coord),
    Chat(String),
    Quit,
}

/// Why a line failed to parse.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?}; expected FIRE, CHAT or QUIT")]
    UnknownVerb(String),

    #[error("CHAT requires a non-empty message")]
    EmptyChat,

    #[error("FIRE requires a coordinate, e.g. FIRE B5")]
    MissingCoord,

    #[error(transparent)]
    BadCoord(#[from] CoordError),

    #[error("placement syntax is <coord> <H|V>, e.g. A1 H")]
    BadPlacement,
}

/// Parses one command line against a board of edge `board_size`.
pub fn parse_command(
    line: &str,
    board_size: usize,
) -> Result<Command, CommandError> {
    let raw = line.trim();
    if raw.is_empty() {
        return Err(CommandError::Empty);
    }
    let (verb, rest) = match raw.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (raw, ""),
    };
    match verb.to_ascii_uppercase().as_str() {
        "CHAT" => {
            if rest.is_empty() {
                Err(CommandError::EmptyChat)
            } else {
                Ok(Command::Chat(rest.to_string()))
            }
        }
        "FIRE" => {
            if rest.is_empty() {
                Err(CommandError::MissingCoord)
            } else {
                Ok(Command::Fire(Coord::parse(rest, board_size)?))
            }
        }
        "QUIT" if rest.is_empty() => Ok(Command::Quit),
        _ => Err(CommandError::UnknownVerb(raw.to_string())),
    }
}

/// Parses a manual-placement line: `<coord> <H|V>`.
pub fn parse_placement(
    line: &str,
    board_size: usize,
) -> Result<(Coord, Orientation), CommandError> {
    let mut parts = line.split_whitespace();
    let (Some(coord_text), Some(orient_text), None) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(CommandError::BadPlacement);
    };
    let coord = Coord::parse(coord_text, board_size)?;
    let orientation = match orient_text.to_ascii_uppercase().as_str() {
        "H" => Orientation::Horizontal,
        "V" => Orientation::Vertical,
        _ => return Err(CommandError::BadPlacement),
    };
    Ok((coord, orientation))
}

// =========================================================================
// Tests
// =========================================================================
