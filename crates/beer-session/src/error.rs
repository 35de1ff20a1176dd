//! Error types for the reconnect registry.

use beer_protocol::Token;

/// Errors that can occur while registering or attaching a token.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The token already has a pending or freshly-bound attach point.
    /// A second registration or attach must not perturb the first.
    #[error("token {0} is already in use")]
    TokenInUse(Token),

    /// No attach point is waiting for this token.
    #[error("unknown token {0}")]
    UnknownToken(Token),
}
