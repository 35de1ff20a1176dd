//! Reconnect support for the BEER server.
//!
//! When a player's transport dies mid-match, the match keeps their slot
//! and registers the player's token here. A new connection presenting
//! the same token in its handshake is routed through
//! [`ReconnectRegistry::attach`] straight into the waiting slot; the
//! match blocks on [`ReconnectRegistry::wait`] with a deadline and
//! either resumes with the fresh transport or moves on to spectator
//! promotion.
//!
//! # How it fits in the stack
//!
//! ```text
//! Match layer (above)   ← registers tokens, waits for reattachment
//!     ↕
//! Session layer (this crate)  ← token → attach-point map, single binding
//!     ↕
//! Transport layer (below)     ← the FramedConnection being handed over
//! ```

mod error;
mod registry;

pub use error::RegistryError;
pub use registry::{AttachPoint, ReconnectRegistry, WaitOutcome};
