//! Unified error type for the server crate.

use beer_protocol::FrameError;
use beer_transport::TransportError;

/// Top-level error for lobby startup and operation.
///
/// `#[error(transparent)]` variants forward the layer errors unchanged;
/// the `?` operator converts them via the generated `From` impls.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// A transport-level failure (bind, accept).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level failure (bad encryption key).
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Configuration could not be resolved.
    #[error("invalid {name} value {value:?}")]
    Config {
        name: &'static str,
        value: String,
    },

    /// Installing a signal handler failed.
    #[error("signal handler setup failed: {0}")]
    Signal(#[source] std::io::Error),
}
