//! The match session: two slots, two boards, one coordinator task.
//!
//! All game-state mutation happens on the coordinator. Each slot's
//! transport is read by a dedicated reader task that parses payloads at
//! the edge and forwards them over one mpsc channel; a reader that hits
//! EOF (or the transport's three-strike kill) forwards a drop event and
//! exits. Reader tasks are tagged with the slot's epoch, which is
//! bumped on every rebind, so input from a replaced transport is
//! discarded instead of being attributed to the new occupant.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use beer_board::Coord;
use beer_protocol::{
    AppMessage, EndCause, ErrCode, MatchOutcome, ShotResult, Token,
};
use beer_session::{ReconnectRegistry, WaitOutcome};
use beer_transport::FramedConnection;

use crate::command::{parse_command, parse_placement, Command};
use crate::{MatchConfig, SpectatorHub};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One of the two roles in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    /// The opposing slot.
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    /// The player name used in chat and info messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A token-bearing transport, as held in the waiting list, the
/// spectator queue and the match slots.
#[derive(Clone)]
pub struct Seat {
    pub token: Token,
    pub conn: Arc<FramedConnection>,
}

/// What the lobby receives back when a session terminates.
#[derive(Debug)]
pub struct MatchReport {
    pub outcome: MatchOutcome,
    pub cause: EndCause,
    /// The winner's seat, if its transport survived the match.
    pub winner: Option<Seat>,
    /// The loser's seat, if alive and eligible for requeueing
    /// (terminations by timeout or concession close it instead).
    pub loser: Option<Seat>,
    /// Total shots fired over the whole match.
    pub shots: u32,
}

impl std::fmt::Debug for Seat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seat")
            .field("token", &self.token)
            .field("conn", &self.conn.id())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Internal types
// ---------------------------------------------------------------------------

/// Input forwarded from a reader task.
enum Input {
    /// A `cmd` payload: one command line to parse.
    Line(String),
    /// A `chat` payload: relay as-is.
    Chat(String),
}

/// One event on the session channel. `input: None` signals that the
/// slot's transport died.
struct SlotEvent {
    slot: SlotId,
    epoch: u64,
    input: Option<Input>,
}

struct Slot {
    token: Token,
    conn: Arc<FramedConnection>,
    board: beer_board::Board,
    alive: bool,
    /// Bumped on every rebind; stale reader events are filtered by it.
    epoch: u64,
    reader: Option<JoinHandle<()>>,
    /// Set on promotion, cleared by the occupant's first command.
    /// While set, a drop skips the reconnect wait and goes straight
    /// back to the spectator queue.
    promoted_awaiting_turn: bool,
}

/// How a match ended, internally.
enum Ending {
    Win { winner: SlotId, cause: EndCause },
    Abandoned,
}

/// Result of a suspension.
enum Recovery {
    Resumed,
    Ended(Ending),
}

/// Result of one turn.
enum TurnFlow {
    Continue,
    Ended(Ending),
}

/// Result of resolving one FIRE.
enum ShotFlow {
    /// Already-shot cell: same player goes again.
    Repeat,
    NextTurn,
    Won,
}

// ---------------------------------------------------------------------------
// MatchSession
// ---------------------------------------------------------------------------

/// A single two-player match, run to completion by [`MatchSession::run`].
pub struct MatchSession {
    config: MatchConfig,
    registry: Arc<ReconnectRegistry>,
    spectators: Arc<SpectatorHub>,
    slot_a: Slot,
    slot_b: Slot,
    events_tx: mpsc::UnboundedSender<SlotEvent>,
    events_rx: mpsc::UnboundedReceiver<SlotEvent>,
    /// Events deferred while a suspension drained the channel.
    pending: VecDeque<SlotEvent>,
    active: SlotId,
    shots: u32,
    half_turns: u32,
}

impl MatchSession {
    /// Builds a session over two already-handshaken seats. The first
    /// seat becomes slot A and fires first.
    pub fn new(
        config: MatchConfig,
        registry: Arc<ReconnectRegistry>,
        spectators: Arc<SpectatorHub>,
        seat_a: Seat,
        seat_b: Seat,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let board_size = config.board_size;
        let make_slot = |seat: Seat| Slot {
            token: seat.token,
            conn: seat.conn,
            board: beer_board::Board::new(board_size),
            alive: true,
            epoch: 0,
            reader: None,
            promoted_awaiting_turn: false,
        };
        Self {
            config,
            registry,
            spectators,
            slot_a: make_slot(seat_a),
            slot_b: make_slot(seat_b),
            events_tx,
            events_rx,
            pending: VecDeque::new(),
            active: SlotId::A,
            shots: 0,
            half_turns: 0,
        }
    }

    /// Runs the match to a terminal outcome.
    pub async fn run(mut self) -> MatchReport {
        tracing::info!(
            a = %self.slot_a.token,
            b = %self.slot_b.token,
            "match session started"
        );
        self.start_reader(SlotId::A);
        self.start_reader(SlotId::B);
        let ending = self.play().await;
        self.finish(ending).await
    }

    // -- Slot plumbing -----------------------------------------------------

    fn slot(&self, id: SlotId) -> &Slot {
        match id {
            SlotId::A => &self.slot_a,
            SlotId::B => &self.slot_b,
        }
    }

    fn slot_mut(&mut self, id: SlotId) -> &mut Slot {
        match id {
            SlotId::A => &mut self.slot_a,
            SlotId::B => &mut self.slot_b,
        }
    }

    /// (Re)spawns the reader task for a slot's current transport.
    fn start_reader(&mut self, id: SlotId) {
        let tx = self.events_tx.clone();
        let slot = self.slot_mut(id);
        if let Some(old) = slot.reader.take() {
            old.abort();
        }
        slot.reader =
            Some(spawn_reader(id, slot.epoch, Arc::clone(&slot.conn), tx));
    }

    /// Installs a replacement transport into a slot.
    fn rebind(
        &mut self,
        id: SlotId,
        new_token: Option<Token>,
        conn: Arc<FramedConnection>,
        promoted: bool,
    ) {
        let slot = self.slot_mut(id);
        slot.epoch += 1;
        slot.conn = conn;
        slot.alive = true;
        slot.promoted_awaiting_turn = promoted;
        if let Some(token) = new_token {
            slot.token = token;
        }
        self.start_reader(id);
    }

    /// Marks a slot as having produced a real command; promoted
    /// occupants graduate to full reconnect rights at this point.
    fn note_activity(&mut self, id: SlotId) {
        self.slot_mut(id).promoted_awaiting_turn = false;
    }

    async fn send_to(&self, id: SlotId, msg: &AppMessage) {
        let slot = self.slot(id);
        if slot.alive && slot.conn.send_msg(msg).await.is_err() {
            tracing::debug!(slot = %id, "send failed; reader will report the drop");
        }
    }

    async fn relay_chat(&self, from: SlotId, msg: String) {
        let chat = AppMessage::Chat {
            name: from.name().to_string(),
            msg,
        };
        self.send_to(SlotId::A, &chat).await;
        self.send_to(SlotId::B, &chat).await;
        self.spectators.broadcast(&chat).await;
    }

    /// Replays the current board state to a freshly bound transport.
    async fn resync(&self, id: SlotId) {
        let own = self.slot(id).board.render_self();
        let opp = self.slot(id.other()).board.render_opponent_view();
        self.send_to(id, &AppMessage::Grid { rows: own }).await;
        self.send_to(id, &AppMessage::OppGrid { rows: opp }).await;
    }

    /// The full snapshot spectators need to render the match from
    /// scratch: whose turn it is, then both boards revealed.
    fn snapshot_frames(&self) -> Vec<AppMessage> {
        vec![
            AppMessage::info(format!("Player {} to move", self.active)),
            AppMessage::Grid {
                rows: self.slot_a.board.render_self(),
            },
            AppMessage::OppGrid {
                rows: self.slot_b.board.render_self(),
            },
        ]
    }

    // -- Event intake ------------------------------------------------------

    /// Next event with the stale-epoch filter applied, or `None` when
    /// `deadline` passes first.
    async fn next_event(&mut self, deadline: Instant) -> Option<SlotEvent> {
        loop {
            let ev = if let Some(ev) = self.pending.pop_front() {
                ev
            } else {
                match tokio::time::timeout_at(
                    deadline,
                    self.events_rx.recv(),
                )
                .await
                {
                    Err(_elapsed) => return None,
                    Ok(Some(ev)) => ev,
                    // Unreachable while we hold a sender; treat as quiet.
                    Ok(None) => return None,
                }
            };
            if self.slot(ev.slot).epoch != ev.epoch {
                continue;
            }
            return Some(ev);
        }
    }

    /// Waits for the next command line from `id`, relaying chat from
    /// either side and rejecting other out-of-turn commands. Returns
    /// the culpable slot if a transport drops or `id` stalls past the
    /// deadline.
    async fn wait_line(
        &mut self,
        id: SlotId,
        deadline: Instant,
    ) -> Result<String, SlotId> {
        loop {
            let Some(ev) = self.next_event(deadline).await else {
                self.slot(id).conn.close().await;
                return Err(id);
            };
            let from = ev.slot;
            let Some(input) = ev.input else {
                return Err(from);
            };
            match input {
                Input::Chat(msg) => {
                    self.note_activity(from);
                    self.relay_chat(from, msg).await;
                }
                Input::Line(line) if from == id => {
                    self.note_activity(id);
                    return Ok(line);
                }
                Input::Line(line) => {
                    match parse_command(&line, self.config.board_size) {
                        Ok(Command::Chat(msg)) => {
                            self.note_activity(from);
                            self.relay_chat(from, msg).await;
                        }
                        _ => {
                            self.send_to(
                                from,
                                &AppMessage::err(
                                    ErrCode::BadCommand,
                                    "not your turn",
                                ),
                            )
                            .await;
                        }
                    }
                }
            }
        }
    }

    // -- State machine -----------------------------------------------------

    async fn play(&mut self) -> Ending {
        self.send_to(
            SlotId::A,
            &AppMessage::info("Match found – you are player A and fire first"),
        )
        .await;
        self.send_to(
            SlotId::B,
            &AppMessage::info("Match found – you are player B"),
        )
        .await;

        for id in [SlotId::A, SlotId::B] {
            loop {
                match self.place_ships(id).await {
                    Ok(()) => break,
                    Err(dropped) => {
                        tracing::info!(
                            slot = %dropped,
                            "placement interrupted"
                        );
                        match self.suspend(dropped).await {
                            Recovery::Resumed => continue,
                            Recovery::Ended(ending) => return ending,
                        }
                    }
                }
            }
        }

        loop {
            match self.turn().await {
                TurnFlow::Continue => {}
                TurnFlow::Ended(ending) => return ending,
            }
        }
    }

    /// Runs the placement phase for one slot: random placement unless
    /// the player opts into the manual wizard, which places ship by
    /// ship with a fresh deadline for each.
    async fn place_ships(&mut self, id: SlotId) -> Result<(), SlotId> {
        self.slot_mut(id).board.reset();
        self.send_to(id, &AppMessage::info("Manual placement? [y/N]"))
            .await;

        let deadline = Instant::now() + self.config.place_timeout;
        let answer = self.wait_line(id, deadline).await?;

        if answer.trim().to_ascii_uppercase().starts_with('Y') {
            for &(name, len) in self.config.fleet() {
                // T_place resets at the start of each ship.
                let deadline = Instant::now() + self.config.place_timeout;
                let rows = self.slot(id).board.render_self();
                self.send_to(id, &AppMessage::Grid { rows }).await;
                self.send_to(
                    id,
                    &AppMessage::info(format!(
                        "Place your {name} (size {len}) – <coord> <H|V>"
                    )),
                )
                .await;

                loop {
                    let line = self.wait_line(id, deadline).await?;
                    match parse_placement(&line, self.config.board_size) {
                        Err(e) => {
                            self.send_to(
                                id,
                                &AppMessage::err(
                                    ErrCode::BadPlacement,
                                    e.to_string(),
                                ),
                            )
                            .await;
                        }
                        Ok((coord, orientation)) => {
                            let placed =
                                self.slot_mut(id).board.try_place_ship(
                                    name,
                                    coord.row,
                                    coord.col,
                                    len,
                                    orientation,
                                );
                            if placed {
                                break;
                            }
                            self.send_to(
                                id,
                                &AppMessage::err(
                                    ErrCode::BadPlacement,
                                    "overlap or out of bounds",
                                ),
                            )
                            .await;
                        }
                    }
                }
            }
        } else {
            let fleet = self.config.fleet();
            self.slot_mut(id).board.place_ships_randomly(fleet);
        }

        let rows = self.slot(id).board.render_self();
        self.send_to(id, &AppMessage::Grid { rows }).await;
        self.send_to(id, &AppMessage::info("All ships placed")).await;
        Ok(())
    }

    /// One pass through AWAIT_TURN (and EXECUTE_SHOT when a FIRE
    /// arrives).
    async fn turn(&mut self) -> TurnFlow {
        let active = self.active;
        let defender = active.other();

        // Spectators get a full snapshot every completed round.
        if self.half_turns % 2 == 0 {
            self.spectators
                .publish_snapshot(self.snapshot_frames())
                .await;
        }

        // Passive board refresh for the waiting side; the active side
        // gets its view of the defender plus the prompt.
        let own = self.slot(defender).board.render_self();
        self.send_to(defender, &AppMessage::Grid { rows: own }).await;
        let view = self.slot(defender).board.render_opponent_view();
        self.send_to(active, &AppMessage::OppGrid { rows: view }).await;
        self.send_to(active, &AppMessage::Prompt).await;

        let deadline = Instant::now() + self.config.turn_timeout;
        loop {
            let Some(ev) = self.next_event(deadline).await else {
                tracing::info!(slot = %active, "turn timer expired");
                self.slot(active).conn.close().await;
                return match self.suspend(active).await {
                    Recovery::Resumed => TurnFlow::Continue,
                    Recovery::Ended(e) => TurnFlow::Ended(e),
                };
            };
            let from = ev.slot;
            let Some(input) = ev.input else {
                return match self.suspend(from).await {
                    Recovery::Resumed => TurnFlow::Continue,
                    Recovery::Ended(e) => TurnFlow::Ended(e),
                };
            };
            match input {
                Input::Chat(msg) => {
                    // Chat never consumes the turn nor resets its timer.
                    self.note_activity(from);
                    self.relay_chat(from, msg).await;
                }
                Input::Line(line) if from != active => {
                    match parse_command(&line, self.config.board_size) {
                        Ok(Command::Chat(msg)) => {
                            self.note_activity(from);
                            self.relay_chat(from, msg).await;
                        }
                        _ => {
                            self.send_to(
                                from,
                                &AppMessage::err(
                                    ErrCode::BadCommand,
                                    "not your turn",
                                ),
                            )
                            .await;
                        }
                    }
                }
                Input::Line(line) => {
                    match parse_command(&line, self.config.board_size) {
                        Err(e) => {
                            self.send_to(
                                active,
                                &AppMessage::err(
                                    ErrCode::BadCommand,
                                    e.to_string(),
                                ),
                            )
                            .await;
                        }
                        Ok(Command::Chat(msg)) => {
                            self.note_activity(active);
                            self.relay_chat(active, msg).await;
                        }
                        Ok(Command::Quit) => {
                            self.note_activity(active);
                            tracing::info!(slot = %active, "player conceded");
                            return TurnFlow::Ended(Ending::Win {
                                winner: defender,
                                cause: EndCause::Concession,
                            });
                        }
                        Ok(Command::Fire(coord)) => {
                            self.note_activity(active);
                            match self.execute_shot(coord).await {
                                ShotFlow::Repeat => {
                                    self.send_to(active, &AppMessage::Prompt)
                                        .await;
                                }
                                ShotFlow::NextTurn => {
                                    return TurnFlow::Continue
                                }
                                ShotFlow::Won => {
                                    return TurnFlow::Ended(Ending::Win {
                                        winner: active,
                                        cause: EndCause::FleetDestroyed,
                                    })
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Resolves one FIRE from the active slot and broadcasts the
    /// outcome and updated views.
    async fn execute_shot(&mut self, coord: Coord) -> ShotFlow {
        let active = self.active;
        let defender = active.other();

        let (result, sunk) = self.slot_mut(defender).board.fire_at(coord);
        self.shots += 1;
        tracing::debug!(
            slot = %active, %coord, ?result, sunk = ?sunk, "shot resolved"
        );

        let shot = AppMessage::Shot {
            coord: coord.to_string(),
            result,
            sunk,
        };
        self.send_to(SlotId::A, &shot).await;
        self.send_to(SlotId::B, &shot).await;
        self.spectators.broadcast(&shot).await;

        if result == ShotResult::AlreadyShot {
            return ShotFlow::Repeat;
        }

        let view = self.slot(defender).board.render_opponent_view();
        self.send_to(active, &AppMessage::OppGrid { rows: view }).await;
        let own = self.slot(defender).board.render_self();
        self.send_to(defender, &AppMessage::Grid { rows: own }).await;

        if self.slot(defender).board.all_ships_sunk() {
            ShotFlow::Won
        } else {
            self.half_turns += 1;
            self.active = defender;
            ShotFlow::NextTurn
        }
    }

    /// The SUSPENDED state: one slot's transport is gone.
    ///
    /// Double drops abandon the match immediately. A single drop opens
    /// a reconnect window for the slot's token, falls back to promoting
    /// the head spectator, and only when the queue is empty terminates
    /// with an opponent win by timeout. A promoted occupant that dies
    /// before its first command skips the reconnect window and goes
    /// straight back to the queue, cascading until someone sticks.
    async fn suspend(&mut self, dropped: SlotId) -> Recovery {
        {
            let slot = self.slot_mut(dropped);
            slot.alive = false;
            if let Some(reader) = slot.reader.take() {
                reader.abort();
            }
        }
        self.slot(dropped).conn.close().await;
        tracing::info!(slot = %dropped, "slot suspended");

        // Drain already-queued events so a double drop in the same poll
        // window is seen now; everything else is deferred.
        let other = dropped.other();
        while let Ok(ev) = self.events_rx.try_recv() {
            if self.slot(ev.slot).epoch != ev.epoch {
                continue;
            }
            if ev.input.is_none() {
                if ev.slot == other {
                    self.slot_mut(other).alive = false;
                }
            } else {
                self.pending.push_back(ev);
            }
        }
        if !self.slot(other).alive {
            tracing::info!("both slots dropped, abandoning match");
            return Recovery::Ended(Ending::Abandoned);
        }

        let cascade = self.slot(dropped).promoted_awaiting_turn;
        if !cascade {
            let wait = self.config.reconnect_timeout;
            self.send_to(
                other,
                &AppMessage::info(format!(
                    "Player {dropped} disconnected – holding the slot \
                     for {}s",
                    wait.as_secs()
                )),
            )
            .await;

            let token = self.slot(dropped).token.clone();
            match self.registry.register(&token) {
                Ok(point) => match self.registry.wait(point, wait).await {
                    WaitOutcome::Attached(conn) => {
                        self.rebind(dropped, None, conn, false);
                        self.resync(dropped).await;
                        self.send_to(
                            dropped,
                            &AppMessage::info(
                                "You are reconnected – resuming the match",
                            ),
                        )
                        .await;
                        self.send_to(
                            other,
                            &AppMessage::info(
                                "Opponent reconnected – resuming the match",
                            ),
                        )
                        .await;
                        return Recovery::Resumed;
                    }
                    WaitOutcome::Expired => {}
                },
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "could not open a reconnect window"
                    );
                }
            }
        }

        while let Some((token, conn)) = self.spectators.promote().await {
            if !conn.is_alive() {
                continue;
            }
            self.rebind(dropped, Some(token), conn, true);
            self.send_to(
                dropped,
                &AppMessage::info(format!(
                    "You are now playing – you replaced the disconnected \
                     player {dropped}"
                )),
            )
            .await;
            self.resync(dropped).await;
            self.send_to(
                other,
                &AppMessage::info(
                    "A spectator took over the vacant slot",
                ),
            )
            .await;
            return Recovery::Resumed;
        }

        tracing::info!(
            slot = %dropped,
            "no reconnect and no spectators; opponent wins"
        );
        Recovery::Ended(Ending::Win {
            winner: other,
            cause: EndCause::Timeout,
        })
    }

    /// The TERMINAL state: broadcast the end event, release
    /// registrations and transports, and build the requeue report.
    async fn finish(&mut self, ending: Ending) -> MatchReport {
        let (outcome, cause, winner_id) = match ending {
            Ending::Win {
                winner: SlotId::A,
                cause,
            } => (MatchOutcome::SlotAWin, cause, Some(SlotId::A)),
            Ending::Win {
                winner: SlotId::B,
                cause,
            } => (MatchOutcome::SlotBWin, cause, Some(SlotId::B)),
            Ending::Abandoned => {
                (MatchOutcome::Abandoned, EndCause::Abandoned, None)
            }
        };

        let end = AppMessage::End {
            outcome,
            cause,
            shots: self.shots,
        };
        self.send_to(SlotId::A, &end).await;
        self.send_to(SlotId::B, &end).await;
        self.spectators.broadcast(&end).await;

        self.registry.cancel(&self.slot_a.token);
        self.registry.cancel(&self.slot_b.token);

        for slot in [&mut self.slot_a, &mut self.slot_b] {
            if let Some(reader) = slot.reader.take() {
                reader.abort();
            }
        }

        let mut winner = None;
        let mut loser = None;
        if let Some(w) = winner_id {
            let l = w.other();
            let winner_slot = self.slot(w);
            if winner_slot.alive && winner_slot.conn.is_alive() {
                winner = Some(Seat {
                    token: winner_slot.token.clone(),
                    conn: Arc::clone(&winner_slot.conn),
                });
            }
            let loser_slot = self.slot(l);
            if loser_slot.alive && loser_slot.conn.is_alive() {
                if cause == EndCause::FleetDestroyed {
                    loser = Some(Seat {
                        token: loser_slot.token.clone(),
                        conn: Arc::clone(&loser_slot.conn),
                    });
                } else {
                    // Timeout and concession losers are closed, never
                    // requeued.
                    loser_slot.conn.close().await;
                }
            }
        }

        tracing::info!(
            %outcome, ?cause, shots = self.shots, "match finished"
        );
        MatchReport {
            outcome,
            cause,
            winner,
            loser,
            shots: self.shots,
        }
    }
}

/// Reader task: parses frames at the edge and forwards input events.
/// Exits when the transport dies or the session drops the channel.
fn spawn_reader(
    id: SlotId,
    epoch: u64,
    conn: Arc<FramedConnection>,
    tx: mpsc::UnboundedSender<SlotEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match conn.recv().await {
                Ok((_, _, value)) => {
                    match serde_json::from_value::<AppMessage>(value) {
                        Ok(AppMessage::Cmd { line }) => {
                            if tx
                                .send(SlotEvent {
                                    slot: id,
                                    epoch,
                                    input: Some(Input::Line(line)),
                                })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Ok(AppMessage::Chat { msg, .. }) => {
                            if tx
                                .send(SlotEvent {
                                    slot: id,
                                    epoch,
                                    input: Some(Input::Chat(msg)),
                                })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Ok(_) | Err(_) => {
                            // Locally answered; never escalates.
                            let reply = AppMessage::err(
                                ErrCode::BadCommand,
                                "expected a cmd or chat payload",
                            );
                            if conn.send_msg(&reply).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Err(_) => {
                    let _ = tx.send(SlotEvent {
                        slot: id,
                        epoch,
                        input: None,
                    });
                    break;
                }
            }
        }
    })
}
