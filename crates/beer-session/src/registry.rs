//! The reconnect registry: a process-wide map from tokens to pending
//! attach points.
//!
//! Lifecycle of one entry:
//!
//! ```text
//! register() ──→ [Pending] ──(attach)──→ [Bound] ──(cancel)──→ gone
//!                    │                      │
//!                    └──(wait expires)──────┴──(match ends)──→ gone
//! ```
//!
//! - **Pending**: a match slot is waiting; the entry holds the sender
//!   half of a oneshot that delivers the replacement transport.
//! - **Bound**: a transport was delivered. The entry stays as a
//!   tombstone until the owning match clears it, so a second transport
//!   presenting the same token is recognised as a duplicate instead of
//!   being mistaken for a fresh client.
//!
//! The inner map is guarded by a `std::sync::Mutex`: every operation is
//! a short, await-free critical section, and the only blocking
//! (`wait`) happens on the oneshot outside the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use beer_protocol::Token;
use beer_transport::FramedConnection;

use crate::RegistryError;

enum Entry {
    /// A slot is waiting for this token to come back.
    Pending(oneshot::Sender<Arc<FramedConnection>>),
    /// A replacement transport was already delivered.
    Bound,
}

/// Handle returned by [`ReconnectRegistry::register`]; pass it to
/// [`ReconnectRegistry::wait`] to block until reattachment.
pub struct AttachPoint {
    token: Token,
    rx: oneshot::Receiver<Arc<FramedConnection>>,
}

/// Result of waiting on an attach point.
pub enum WaitOutcome {
    /// A new transport arrived for the token within the deadline.
    Attached(Arc<FramedConnection>),
    /// The deadline elapsed; the registration has been removed.
    Expired,
}

/// Process-wide token → attach-point map.
#[derive(Default)]
pub struct ReconnectRegistry {
    entries: Mutex<HashMap<Token, Entry>>,
}

impl ReconnectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an attach point for `token`.
    ///
    /// A `Bound` tombstone left by an earlier reattachment of the same
    /// slot is replaced, since only the owning match ever re-registers
    /// its own token. A `Pending` entry is someone else's open window
    /// and is rejected.
    pub fn register(
        &self,
        token: &Token,
    ) -> Result<AttachPoint, RegistryError> {
        let mut entries = self.entries.lock().expect("registry lock");
        if matches!(entries.get(token), Some(Entry::Pending(_))) {
            return Err(RegistryError::TokenInUse(token.clone()));
        }
        let (tx, rx) = oneshot::channel();
        entries.insert(token.clone(), Entry::Pending(tx));
        tracing::debug!(%token, "reconnect window opened");
        Ok(AttachPoint {
            token: token.clone(),
            rx,
        })
    }

    /// Routes a reconnecting transport to the slot waiting for `token`.
    ///
    /// Exactly one transport can win: the entry moves to `Bound`
    /// atomically with the delivery. A loser gets
    /// [`RegistryError::TokenInUse`] and the caller must send a single
    /// `err duplicate_token` frame and close it, leaving the existing
    /// binding untouched. A token with no entry at all yields
    /// [`RegistryError::UnknownToken`].
    pub fn attach(
        &self,
        token: &Token,
        conn: Arc<FramedConnection>,
    ) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock().expect("registry lock");
        match entries.get(token) {
            None => Err(RegistryError::UnknownToken(token.clone())),
            Some(Entry::Bound) => {
                Err(RegistryError::TokenInUse(token.clone()))
            }
            Some(Entry::Pending(_)) => {
                let Some(Entry::Pending(tx)) =
                    entries.insert(token.clone(), Entry::Bound)
                else {
                    unreachable!("entry state checked under the same lock");
                };
                if tx.send(conn).is_err() {
                    // The waiter gave up between our check and the send;
                    // drop the tombstone so the token reads as unknown.
                    entries.remove(token);
                    return Err(RegistryError::UnknownToken(token.clone()));
                }
                tracing::info!(%token, "transport reattached");
                Ok(())
            }
        }
    }

    /// Blocks until the attach point fires or `timeout` elapses.
    ///
    /// On expiry the registration is removed, so a late reconnect with
    /// this token is treated as a fresh client. A reattachment that
    /// races the deadline still wins: the delivered transport is
    /// checked one last time before giving up.
    pub async fn wait(
        &self,
        mut point: AttachPoint,
        timeout: Duration,
    ) -> WaitOutcome {
        match tokio::time::timeout(timeout, &mut point.rx).await {
            Ok(Ok(conn)) => WaitOutcome::Attached(conn),
            Ok(Err(_)) => {
                // Sender vanished without delivering; clean up.
                self.cancel(&point.token);
                WaitOutcome::Expired
            }
            Err(_elapsed) => {
                let still_pending = {
                    let mut entries =
                        self.entries.lock().expect("registry lock");
                    match entries.get(&point.token) {
                        Some(Entry::Pending(_)) => {
                            entries.remove(&point.token);
                            true
                        }
                        _ => false,
                    }
                };
                if still_pending {
                    tracing::info!(
                        token = %point.token,
                        "reconnect window expired"
                    );
                    return WaitOutcome::Expired;
                }
                // attach() won the race against the deadline.
                match point.rx.try_recv() {
                    Ok(conn) => WaitOutcome::Attached(conn),
                    Err(_) => WaitOutcome::Expired,
                }
            }
        }
    }

    /// Removes the entry for `token`, whatever its state, without
    /// signalling anyone. Used on cancelled waits and at match end.
    pub fn cancel(&self, token: &Token) {
        if self
            .entries
            .lock()
            .expect("registry lock")
            .remove(token)
            .is_some()
        {
            tracing::debug!(%token, "registration cancelled");
        }
    }

    /// Whether any entry (pending or bound) exists for `token`.
    pub fn contains(&self, token: &Token) -> bool {
        self.entries
            .lock()
            .expect("registry lock")
            .contains_key(token)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use beer_protocol::FrameCodec;
    use tokio::net::{TcpListener, TcpStream};

    /// Builds a real loopback connection; the registry only moves the
    /// `Arc` around, but a genuine socket keeps the types honest.
    async fn test_conn() -> Arc<FramedConnection> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client =
            tokio::spawn(
                async move { TcpStream::connect(addr).await.unwrap() },
            );
        let (stream, peer) = listener.accept().await.unwrap();
        let _keep_alive = client.await.unwrap();
        // Leak the client half so the server side stays open.
        std::mem::forget(_keep_alive);
        Arc::new(FramedConnection::new(
            stream,
            peer,
            FrameCodec::plaintext(),
        ))
    }

    fn token(s: &str) -> Token {
        Token::from(s)
    }

    // =====================================================================
    // register()
    // =====================================================================

    #[tokio::test]
    async fn test_register_new_token_succeeds() {
        let registry = ReconnectRegistry::new();

        let point = registry.register(&token("PID1")).unwrap();

        assert!(registry.contains(&token("PID1")));
        assert_eq!(point.token, token("PID1"));
    }

    #[tokio::test]
    async fn test_register_pending_token_is_rejected() {
        let registry = ReconnectRegistry::new();
        let _point = registry.register(&token("PID1")).unwrap();

        let result = registry.register(&token("PID1"));

        assert!(matches!(
            result,
            Err(RegistryError::TokenInUse(t)) if t == token("PID1")
        ));
    }

    #[tokio::test]
    async fn test_register_replaces_bound_tombstone() {
        // After a slot reattaches, the entry stays Bound until the
        // match clears it. If the slot drops again, the same match
        // re-registers the token and must not be locked out.
        let registry = ReconnectRegistry::new();
        let point = registry.register(&token("PID1")).unwrap();
        registry.attach(&token("PID1"), test_conn().await).unwrap();
        let _ = registry.wait(point, Duration::from_secs(1)).await;

        assert!(registry.register(&token("PID1")).is_ok());
    }

    // =====================================================================
    // attach() / wait()
    // =====================================================================

    #[tokio::test]
    async fn test_attach_delivers_transport_to_waiter() {
        let registry = Arc::new(ReconnectRegistry::new());
        let point = registry.register(&token("PID1")).unwrap();
        let conn = test_conn().await;
        let conn_id = conn.id();

        let attacher = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry.attach(&token("PID1"), conn)
            })
        };

        let outcome = registry.wait(point, Duration::from_secs(1)).await;
        attacher.await.unwrap().unwrap();

        match outcome {
            WaitOutcome::Attached(delivered) => {
                assert_eq!(delivered.id(), conn_id)
            }
            WaitOutcome::Expired => panic!("should have attached"),
        }
    }

    #[tokio::test]
    async fn test_attach_unknown_token_is_rejected() {
        let registry = ReconnectRegistry::new();

        let result = registry.attach(&token("NOPE"), test_conn().await);

        assert!(matches!(
            result,
            Err(RegistryError::UnknownToken(t)) if t == token("NOPE")
        ));
    }

    #[tokio::test]
    async fn test_second_attach_is_duplicate_and_first_binding_survives() {
        let registry = ReconnectRegistry::new();
        let point = registry.register(&token("PID1")).unwrap();

        let first = test_conn().await;
        let first_id = first.id();
        registry.attach(&token("PID1"), first).unwrap();

        let result = registry.attach(&token("PID1"), test_conn().await);
        assert!(matches!(result, Err(RegistryError::TokenInUse(_))));

        // The original binding is untouched: the waiter still receives
        // the first transport.
        match registry.wait(point, Duration::from_secs(1)).await {
            WaitOutcome::Attached(conn) => assert_eq!(conn.id(), first_id),
            WaitOutcome::Expired => panic!("first binding was lost"),
        }
    }

    #[tokio::test]
    async fn test_concurrent_attaches_exactly_one_wins() {
        let registry = Arc::new(ReconnectRegistry::new());
        let _point = registry.register(&token("PID1")).unwrap();

        let mut tasks = Vec::new();
        for _ in 0..2 {
            let registry = Arc::clone(&registry);
            let conn = test_conn().await;
            tasks.push(tokio::spawn(async move {
                registry.attach(&token("PID1"), conn).is_ok()
            }));
        }

        let mut wins = 0;
        for task in tasks {
            if task.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1, "exactly one attach must bind the slot");
    }

    #[tokio::test]
    async fn test_wait_expires_and_removes_registration() {
        let registry = ReconnectRegistry::new();
        let point = registry.register(&token("PID1")).unwrap();

        let outcome =
            registry.wait(point, Duration::from_millis(20)).await;

        assert!(matches!(outcome, WaitOutcome::Expired));
        assert!(
            !registry.contains(&token("PID1")),
            "expired registration must be removed"
        );
    }

    #[tokio::test]
    async fn test_late_reconnect_after_expiry_is_unknown() {
        let registry = ReconnectRegistry::new();
        let point = registry.register(&token("PID1")).unwrap();
        let _ = registry.wait(point, Duration::from_millis(20)).await;

        let result = registry.attach(&token("PID1"), test_conn().await);

        assert!(matches!(result, Err(RegistryError::UnknownToken(_))));
    }

    // =====================================================================
    // cancel()
    // =====================================================================

    #[tokio::test]
    async fn test_cancel_removes_pending_entry() {
        let registry = ReconnectRegistry::new();
        let _point = registry.register(&token("PID1")).unwrap();

        registry.cancel(&token("PID1"));

        assert!(!registry.contains(&token("PID1")));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_removes_bound_tombstone() {
        let registry = ReconnectRegistry::new();
        let _point = registry.register(&token("PID1")).unwrap();
        registry.attach(&token("PID1"), test_conn().await).unwrap();

        registry.cancel(&token("PID1"));

        let result = registry.attach(&token("PID1"), test_conn().await);
        assert!(matches!(result, Err(RegistryError::UnknownToken(_))));
    }

    #[tokio::test]
    async fn test_cancel_unknown_token_is_noop() {
        let registry = ReconnectRegistry::new();
        registry.cancel(&token("GHOST"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_independent_tokens_do_not_interfere() {
        let registry = ReconnectRegistry::new();
        let point1 = registry.register(&token("PID1")).unwrap();
        let _point2 = registry.register(&token("PID2")).unwrap();

        registry.attach(&token("PID1"), test_conn().await).unwrap();

        assert!(matches!(
            registry.wait(point1, Duration::from_secs(1)).await,
            WaitOutcome::Attached(_)
        ));
        assert!(registry.contains(&token("PID2")));
    }
}
