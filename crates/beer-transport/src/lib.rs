//! Framed TCP transport for the BEER server.
//!
//! Sits between raw sockets and the match/session layers: accepts
//! connections, reads the one unframed `TOKEN <id>` handshake line, and
//! then speaks [`beer_protocol`] frames with integrity checking,
//! ACK/NAK reliability and replay protection handled inside
//! [`FramedConnection::recv`].

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{FramedConnection, TcpTransport, HANDSHAKE_PREFIX};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one accepted socket.
///
/// Allocated monotonically per process, so a reconnecting player shows
/// up under a new id each time: the durable identity across transports
/// is the handshake token, never the connection. Ids only distinguish
/// and log transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the id for the next accepted socket.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
