//! The spectator hub: an ordered queue of passive observers.
//!
//! Spectators receive every broadcast event and the periodic full
//! snapshot, but cannot influence the match: a small watchdog task per
//! spectator answers any command with `err spectator`. The head of the
//! queue is the next candidate for promotion into a vacated slot.
//!
//! The hub deliberately holds nothing but transports and the latest
//! snapshot frames. The session pushes snapshots in; joiners get the
//! cached copy. This keeps the match ↔ spectator relationship one-way
//! and cycle-free.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use beer_protocol::{AppMessage, ErrCode, Token};
use beer_transport::FramedConnection;

struct Viewer {
    token: Token,
    conn: Arc<FramedConnection>,
    watchdog: JoinHandle<()>,
}

#[derive(Default)]
struct HubInner {
    viewers: VecDeque<Viewer>,
    /// Latest full snapshot, replayed to every new joiner.
    snapshot: Vec<AppMessage>,
}

/// Ordered collection of observers for the running match.
#[derive(Default)]
pub struct SpectatorHub {
    inner: Mutex<HubInner>,
}

impl SpectatorHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a spectator to the tail, greets it and replays the
    /// cached snapshot so it can render the match from scratch.
    pub async fn add(&self, token: Token, conn: Arc<FramedConnection>) {
        let greeting =
            AppMessage::info("You are now spectating the current match");
        let _ = conn.send_msg(&greeting).await;

        let mut inner = self.inner.lock().await;
        for frame in &inner.snapshot {
            let _ = conn.send_msg(frame).await;
        }

        let watchdog = spawn_watchdog(Arc::clone(&conn));
        tracing::info!(%token, id = %conn.id(), "spectator joined");
        inner.viewers.push_back(Viewer {
            token,
            conn,
            watchdog,
        });
    }

    /// Sends `msg` to every spectator. A failed send evicts that
    /// spectator silently; the others are unaffected.
    pub async fn broadcast(&self, msg: &AppMessage) {
        let mut inner = self.inner.lock().await;
        let mut kept = VecDeque::with_capacity(inner.viewers.len());
        while let Some(viewer) = inner.viewers.pop_front() {
            if viewer.conn.is_alive()
                && viewer.conn.send_msg(msg).await.is_ok()
            {
                kept.push_back(viewer);
            } else {
                tracing::debug!(
                    token = %viewer.token,
                    "evicting unreachable spectator"
                );
                viewer.watchdog.abort();
            }
        }
        inner.viewers = kept;
    }

    /// Caches a fresh full snapshot and pushes it to every spectator.
    pub async fn publish_snapshot(&self, frames: Vec<AppMessage>) {
        {
            let mut inner = self.inner.lock().await;
            inner.snapshot = frames.clone();
        }
        for frame in &frames {
            self.broadcast(frame).await;
        }
    }

    /// Removes and returns the head spectator for promotion into a
    /// slot. Dead entries at the head are discarded along the way.
    pub async fn promote(&self) -> Option<(Token, Arc<FramedConnection>)> {
        let mut inner = self.inner.lock().await;
        while let Some(viewer) = inner.viewers.pop_front() {
            viewer.watchdog.abort();
            if viewer.conn.is_alive() {
                tracing::info!(
                    token = %viewer.token,
                    "promoting spectator into a player slot"
                );
                return Some((viewer.token, viewer.conn));
            }
        }
        None
    }

    /// Empties the queue at a match rotation boundary, returning the
    /// still-live transports so the lobby can requeue them as waiting
    /// players.
    pub async fn drain(&self) -> Vec<(Token, Arc<FramedConnection>)> {
        let mut inner = self.inner.lock().await;
        let mut out = Vec::with_capacity(inner.viewers.len());
        while let Some(viewer) = inner.viewers.pop_front() {
            viewer.watchdog.abort();
            if viewer.conn.is_alive() {
                out.push((viewer.token, viewer.conn));
            }
        }
        inner.snapshot.clear();
        out
    }

    /// Number of queued spectators.
    pub async fn count(&self) -> usize {
        self.inner.lock().await.viewers.len()
    }
}

/// Reads a spectator's connection so commands can be rejected and
/// disconnects noticed. Aborted on promotion or drain.
fn spawn_watchdog(conn: Arc<FramedConnection>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match conn.recv().await {
                Ok(_) => {
                    let rejection = AppMessage::err(
                        ErrCode::Spectator,
                        "spectators cannot issue commands",
                    );
                    if conn.send_msg(&rejection).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    })
}

// =========================================================================
// Tests
// =========================================================================
