//! Durable client identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque client identity that survives reconnects.
///
/// The client presents it once, in the `TOKEN <id>` handshake line, and
/// the server never interprets the contents: two tokens are equal iff
/// their bytes are equal. The reference client uses its process id
/// (`PID1234`), but any stable per-client string works.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(pub String);

impl Token {
    /// Returns the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_equality_is_byte_equality() {
        assert_eq!(Token::from("PID1"), Token::from("PID1"));
        assert_ne!(Token::from("PID1"), Token::from("pid1"));
    }

    #[test]
    fn test_token_serializes_as_plain_string() {
        // `#[serde(transparent)]` means Token("PID1") → `"PID1"`,
        // not `{"0":"PID1"}`.
        let json = serde_json::to_string(&Token::from("PID1")).unwrap();
        assert_eq!(json, "\"PID1\"");
    }

    #[test]
    fn test_token_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(Token::from("PID1"), 1);
        map.insert(Token::from("PID2"), 2);
        assert_eq!(map[&Token::from("PID2")], 2);
    }
}
