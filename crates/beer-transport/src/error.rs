//! Error types for the transport layer.

use beer_protocol::FrameError;

/// Errors that can occur on the listener or on a framed connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The peer closed the stream (clean EOF or reset).
    #[error("connection closed by peer")]
    Closed,

    /// The handshake line didn't arrive within the deadline.
    #[error("timed out waiting for handshake")]
    HandshakeTimeout,

    /// The first line was not `TOKEN <id>`.
    #[error("malformed handshake line")]
    BadHandshake,

    /// A frame failed to decode in a way the stream cannot recover
    /// from (bad magic/version, oversized length).
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Three consecutive receive-side failures on this stream; the
    /// connection is declared dead.
    #[error("receive failure limit reached")]
    TooManyErrors,

    /// Reading or writing the socket failed.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}
