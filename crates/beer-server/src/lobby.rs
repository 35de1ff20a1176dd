//! The lobby: accept, classify, pair, requeue.
//!
//! The lobby task owns the waiting list outright: classification
//! happens in short-lived per-connection tasks that hand finished
//! seats back over a channel, so no lock ever guards the list. One
//! match runs at a time; arrivals during a match spectate it.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use beer_match::{MatchReport, MatchSession, Seat, SpectatorHub};
use beer_protocol::{AppMessage, ErrCode, FrameCodec};
use beer_session::{ReconnectRegistry, RegistryError};
use beer_transport::{FramedConnection, TcpTransport, TransportError};

use crate::{ServerConfig, ServerError};

/// Why the lobby loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// SIGINT: the process should exit with status 130.
    Interrupted,
    /// SIGTERM: a normal, zero-status shutdown.
    Terminated,
}

/// One iteration's worth of lobby input.
enum Tick {
    Accepted(Result<FramedConnection, TransportError>),
    Joined(Seat),
    MatchDone(MatchReport),
    Signal(Shutdown),
}

/// The running server: listener, registry, spectator hub and waiting
/// list.
pub struct Lobby {
    transport: TcpTransport,
    config: ServerConfig,
    registry: Arc<ReconnectRegistry>,
    spectators: Arc<SpectatorHub>,
    waiting: VecDeque<Seat>,
    joins_tx: mpsc::UnboundedSender<Seat>,
    joins_rx: mpsc::UnboundedReceiver<Seat>,
    done_tx: mpsc::UnboundedSender<MatchReport>,
    done_rx: mpsc::UnboundedReceiver<MatchReport>,
    running: Option<JoinHandle<()>>,
}

impl Lobby {
    /// Binds the listening socket and prepares an empty lobby.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let codec = match &config.key {
            Some(key) => FrameCodec::encrypted(key)?,
            None => FrameCodec::plaintext(),
        };
        let transport =
            TcpTransport::bind(&config.bind_addr(), codec).await?;
        let (joins_tx, joins_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Ok(Self {
            transport,
            config,
            registry: Arc::new(ReconnectRegistry::new()),
            spectators: Arc::new(SpectatorHub::new()),
            waiting: VecDeque::new(),
            joins_tx,
            joins_rx,
            done_tx,
            done_rx,
            running: None,
        })
    }

    /// The bound address (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs until SIGINT or SIGTERM.
    pub async fn run(mut self) -> Result<Shutdown, ServerError> {
        #[cfg(unix)]
        let mut sigterm = tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        )
        .map_err(ServerError::Signal)?;

        tracing::info!("lobby open, matching pairs of clients");
        loop {
            #[cfg(unix)]
            let tick = tokio::select! {
                accepted = self.transport.accept() => Tick::Accepted(accepted),
                Some(seat) = self.joins_rx.recv() => Tick::Joined(seat),
                Some(report) = self.done_rx.recv() => Tick::MatchDone(report),
                _ = tokio::signal::ctrl_c() => Tick::Signal(Shutdown::Interrupted),
                _ = sigterm.recv() => Tick::Signal(Shutdown::Terminated),
            };
            #[cfg(not(unix))]
            let tick = tokio::select! {
                accepted = self.transport.accept() => Tick::Accepted(accepted),
                Some(seat) = self.joins_rx.recv() => Tick::Joined(seat),
                Some(report) = self.done_rx.recv() => Tick::MatchDone(report),
                _ = tokio::signal::ctrl_c() => Tick::Signal(Shutdown::Interrupted),
            };

            match tick {
                Tick::Accepted(Ok(conn)) => {
                    self.spawn_classifier(Arc::new(conn));
                }
                Tick::Accepted(Err(e)) => {
                    tracing::error!(error = %e, "accept failed");
                }
                Tick::Joined(seat) => self.admit(seat).await,
                Tick::MatchDone(report) => {
                    self.running = None;
                    self.requeue(report).await;
                    self.try_pair();
                }
                Tick::Signal(kind) => {
                    tracing::info!(?kind, "shutting down");
                    self.shutdown().await;
                    return Ok(kind);
                }
            }
        }
    }

    /// Reads the handshake off-loop and classifies the connection:
    /// reconnect (token pending in the registry), duplicate (token
    /// already re-bound), or a fresh join handed back to the lobby.
    fn spawn_classifier(&self, conn: Arc<FramedConnection>) {
        let registry = Arc::clone(&self.registry);
        let joins = self.joins_tx.clone();
        let deadline = self.config.handshake_timeout;
        tokio::spawn(async move {
            let token = match conn.read_handshake(deadline).await {
                Ok(token) => token,
                Err(e) => {
                    tracing::info!(
                        id = %conn.id(), error = %e,
                        "dropping unclassified connection"
                    );
                    conn.close().await;
                    return;
                }
            };
            match registry.attach(&token, Arc::clone(&conn)) {
                Ok(()) => {
                    // The waiting match owns the transport now.
                }
                Err(RegistryError::TokenInUse(_)) => {
                    let rejection = AppMessage::err(
                        ErrCode::DuplicateToken,
                        "token is already bound to a live transport",
                    );
                    let _ = conn.send_msg(&rejection).await;
                    conn.close().await;
                }
                Err(RegistryError::UnknownToken(_)) => {
                    let _ = joins.send(Seat { token, conn });
                }
            }
        });
    }

    /// Routes a handshaken seat: spectator while a match runs, waiting
    /// list otherwise.
    async fn admit(&mut self, seat: Seat) {
        if self.running.is_some() {
            tracing::info!(token = %seat.token, "joining as spectator");
            self.spectators.add(seat.token, seat.conn).await;
        } else {
            tracing::info!(token = %seat.token, "player waiting");
            let _ = seat
                .conn
                .send_msg(&AppMessage::info("Waiting for an opponent"))
                .await;
            self.waiting.push_back(seat);
            self.try_pair();
        }
    }

    /// Starts a match when two players wait and none is running. The
    /// first popped seat becomes slot A.
    fn try_pair(&mut self) {
        if self.running.is_some() || self.waiting.len() < 2 {
            return;
        }
        let seat_a = self.waiting.pop_front().expect("len checked");
        let seat_b = self.waiting.pop_front().expect("len checked");
        tracing::info!(
            a = %seat_a.token, b = %seat_b.token, "starting match"
        );

        let session = MatchSession::new(
            self.config.match_config(),
            Arc::clone(&self.registry),
            Arc::clone(&self.spectators),
            seat_a,
            seat_b,
        );
        let done = self.done_tx.clone();
        self.running = Some(tokio::spawn(async move {
            let report = session.run().await;
            let _ = done.send(report);
        }));
    }

    /// Post-match requeue: winner at the head, an eligible loser at
    /// the tail (the session already withholds losers closed by
    /// timeout or concession), then the drained spectators.
    async fn requeue(&mut self, report: MatchReport) {
        tracing::info!(
            outcome = %report.outcome,
            cause = ?report.cause,
            shots = report.shots,
            "match over"
        );
        if let Some(winner) = report.winner {
            // A "winner" whose transport died during termination is
            // not requeued.
            if winner.conn.is_alive() {
                tracing::info!(
                    token = %winner.token,
                    "winner requeued at the head"
                );
                self.waiting.push_front(winner);
            }
        }
        if let Some(loser) = report.loser {
            if loser.conn.is_alive() {
                tracing::info!(
                    token = %loser.token,
                    "loser requeued at the tail"
                );
                self.waiting.push_back(loser);
            }
        }
        // Match rotation boundary: spectator entries dissolve into the
        // waiting list so onlookers get to play.
        for (token, conn) in self.spectators.drain().await {
            self.waiting.push_back(Seat { token, conn });
        }
    }

    /// Stops the running session and closes every held transport.
    async fn shutdown(&mut self) {
        if let Some(session) = self.running.take() {
            session.abort();
        }
        for seat in self.waiting.drain(..) {
            seat.conn.close().await;
        }
        for (_, conn) in self.spectators.drain().await {
            conn.close().await;
        }
    }
}
