//! TCP listener and the framed connection type.
//!
//! Concurrency model: each direction of a connection is guarded by its
//! own mutex, so one writer cannot interleave bytes inside another
//! writer's frame, and the (single) reader loop owns all receive-side
//! state. The receive path handles the reliability protocol inline:
//! ACKs prune the peer's frames from our retransmit buffer, NAKs
//! trigger a single retransmission, corrupt frames are NAKed, and three
//! consecutive receive failures kill the stream.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use beer_protocol::{
    AppMessage, FrameCodec, FrameError, FrameType, Header, ReplayWindow,
    RetransmitBuffer, Token, HEADER_LEN,
};

use crate::{ConnectionId, TransportError};

/// Expected start of the handshake line.
pub const HANDSHAKE_PREFIX: &str = "TOKEN ";

/// Longest handshake line we will buffer before giving up.
const MAX_HANDSHAKE_LINE: usize = 128;

/// Consecutive receive-side failures tolerated before the stream dies.
const RECV_FAILURE_LIMIT: u32 = 3;

// ---------------------------------------------------------------------------
// TcpTransport
// ---------------------------------------------------------------------------

/// Listens for TCP connections and wraps them as [`FramedConnection`]s.
pub struct TcpTransport {
    listener: TcpListener,
    codec: FrameCodec,
}

impl TcpTransport {
    /// Binds to `addr`. All accepted connections share `codec` (and
    /// therefore the encryption key, when one is configured).
    pub async fn bind(
        addr: &str,
        codec: FrameCodec,
    ) -> Result<Self, TransportError> {
        let listener =
            TcpListener::bind(addr).await.map_err(TransportError::Accept)?;
        tracing::info!(addr, encrypted = codec.is_encrypted(), "listening");
        Ok(Self { listener, codec })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for and accepts the next incoming connection.
    pub async fn accept(&self) -> Result<FramedConnection, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        let conn = FramedConnection::new(stream, peer, self.codec.clone());
        tracing::debug!(id = %conn.id(), %peer, "accepted connection");
        Ok(conn)
    }
}

// ---------------------------------------------------------------------------
// FramedConnection
// ---------------------------------------------------------------------------

/// Send-side state: the write half, the outgoing sequence counter and
/// the retransmit buffer, mutated together under one lock.
struct SendHalf {
    stream: OwnedWriteHalf,
    next_seq: u32,
    retransmit: RetransmitBuffer,
}

/// Receive-side state: the buffered read half, the replay window and
/// the consecutive-failure streak.
struct RecvHalf {
    stream: BufReader<OwnedReadHalf>,
    replay: ReplayWindow,
    streak: u32,
}

/// One TCP connection speaking framed traffic.
///
/// Cheap to share behind an `Arc`; `send` and `recv` lock independent
/// halves so a session can be writing to a slot while that slot's
/// reader loop is blocked in `recv`.
pub struct FramedConnection {
    id: ConnectionId,
    peer: SocketAddr,
    codec: FrameCodec,
    send_half: Mutex<SendHalf>,
    recv_half: Mutex<RecvHalf>,
    alive: AtomicBool,
}

impl FramedConnection {
    /// Wraps an accepted stream.
    pub fn new(stream: TcpStream, peer: SocketAddr, codec: FrameCodec) -> Self {
        let (read, write) = stream.into_split();
        Self {
            id: ConnectionId::next(),
            peer,
            codec,
            send_half: Mutex::new(SendHalf {
                stream: write,
                next_seq: 0,
                retransmit: RetransmitBuffer::default(),
            }),
            recv_half: Mutex::new(RecvHalf {
                stream: BufReader::new(read),
                replay: ReplayWindow::default(),
                streak: 0,
            }),
            alive: AtomicBool::new(true),
        }
    }

    /// Returns the unique identifier for this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the peer address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether the connection has not yet been declared dead.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
    }

    // -- Handshake ---------------------------------------------------------

    /// Reads the one unframed `TOKEN <id>\n` line that opens every
    /// connection. Everything after it is framed.
    pub async fn read_handshake(
        &self,
        deadline: Duration,
    ) -> Result<Token, TransportError> {
        let mut recv = self.recv_half.lock().await;
        let mut line = Vec::with_capacity(32);

        let read = tokio::time::timeout(
            deadline,
            (&mut recv.stream).take(MAX_HANDSHAKE_LINE as u64)
                .read_until(b'\n', &mut line),
        )
        .await;

        match read {
            Err(_) => {
                self.mark_dead();
                Err(TransportError::HandshakeTimeout)
            }
            Ok(Err(e)) => {
                self.mark_dead();
                Err(TransportError::Io(e))
            }
            Ok(Ok(0)) => {
                self.mark_dead();
                Err(TransportError::Closed)
            }
            Ok(Ok(_)) => {
                let text = String::from_utf8_lossy(&line);
                let text = text.trim_end_matches(['\r', '\n']);
                let rest = text
                    .strip_prefix(HANDSHAKE_PREFIX)
                    .ok_or(TransportError::BadHandshake)?;
                let id = rest.trim();
                if id.is_empty() || id.contains(char::is_whitespace) {
                    return Err(TransportError::BadHandshake);
                }
                Ok(Token::from(id))
            }
        }
    }

    // -- Sending -----------------------------------------------------------

    /// Serializes and sends one application message, returning the
    /// sequence number it was assigned.
    pub async fn send_msg(
        &self,
        msg: &AppMessage,
    ) -> Result<u32, TransportError> {
        let payload = serde_json::to_value(msg)
            .map_err(|e| TransportError::Frame(FrameError::Parse(e)))?;
        self.send_value(msg.frame_type(), &payload).await
    }

    /// Sends a raw JSON payload in a frame of the given type.
    pub async fn send_value(
        &self,
        frame_type: FrameType,
        payload: &Value,
    ) -> Result<u32, TransportError> {
        let mut send = self.send_half.lock().await;
        let seq = send.next_seq;
        send.next_seq = send.next_seq.wrapping_add(1);

        let frame = self.codec.pack(frame_type, seq, payload)?;
        send.retransmit.stash(seq, frame.clone());

        if let Err(e) = write_all(&mut send.stream, &frame).await {
            self.mark_dead();
            return Err(e);
        }
        Ok(seq)
    }

    /// Sends an ACK or NAK for `seq`. Control frames are not stashed
    /// for retransmission and do not consume a sequence number.
    async fn send_control(
        &self,
        frame_type: FrameType,
        seq: u32,
    ) -> Result<(), TransportError> {
        let frame = self.codec.pack_control(frame_type, seq);
        let mut send = self.send_half.lock().await;
        if let Err(e) = write_all(&mut send.stream, &frame).await {
            self.mark_dead();
            return Err(e);
        }
        Ok(())
    }

    /// Number of frames currently held for retransmission.
    pub async fn retransmit_len(&self) -> usize {
        self.send_half.lock().await.retransmit.len()
    }

    /// Shuts the write half down and marks the connection dead.
    pub async fn close(&self) {
        self.mark_dead();
        let mut send = self.send_half.lock().await;
        let _ = send.stream.shutdown().await;
    }

    // -- Receiving ---------------------------------------------------------

    /// Receives the next valid data frame (GAME or CHAT).
    ///
    /// Control frames and recoverable decode failures are handled
    /// internally: a corrupt frame is NAKed and skipped, a replayed or
    /// unparseable one is skipped, an ACK prunes the retransmit buffer
    /// and a NAK re-emits the requested frame. Each failure bumps the
    /// consecutive-error streak; a valid frame resets it; the third
    /// strike returns [`TransportError::TooManyErrors`] and the
    /// connection is dead.
    pub async fn recv(
        &self,
    ) -> Result<(FrameType, u32, Value), TransportError> {
        loop {
            let (header, value) = {
                let mut recv = self.recv_half.lock().await;

                let mut header_bytes = [0u8; HEADER_LEN];
                if let Err(e) =
                    recv.stream.read_exact(&mut header_bytes).await
                {
                    self.mark_dead();
                    return Err(eof_or_io(e));
                }
                let header = match Header::parse(&header_bytes) {
                    Ok(h) => h,
                    Err(e) => {
                        // Desynchronised stream; no way to resync.
                        self.mark_dead();
                        return Err(e.into());
                    }
                };

                let mut payload = vec![0u8; header.len as usize];
                if let Err(e) = recv.stream.read_exact(&mut payload).await {
                    self.mark_dead();
                    return Err(eof_or_io(e));
                }

                match self.codec.unpack_payload(
                    &header,
                    &header_bytes,
                    &payload,
                ) {
                    Ok(value) => {
                        if header.frame_type.is_control() {
                            // Echoed seqs from our own send stream; not
                            // subject to the replay window.
                            (header, value)
                        } else {
                            match recv.replay.accept(header.seq) {
                                Ok(()) => {
                                    recv.streak = 0;
                                    (header, value)
                                }
                                Err(e) => {
                                    recv.streak += 1;
                                    let streak = recv.streak;
                                    drop(recv);
                                    tracing::debug!(
                                        id = %self.id, error = %e, streak,
                                        "discarding replayed frame"
                                    );
                                    self.check_streak(streak)?;
                                    continue;
                                }
                            }
                        }
                    }
                    Err(FrameError::Crc(seq)) => {
                        recv.streak += 1;
                        let streak = recv.streak;
                        drop(recv);
                        tracing::debug!(
                            id = %self.id, seq, streak,
                            "CRC mismatch, sending NAK"
                        );
                        self.send_control(FrameType::Nak, seq).await?;
                        self.check_streak(streak)?;
                        continue;
                    }
                    Err(e @ FrameError::Parse(_)) => {
                        recv.streak += 1;
                        let streak = recv.streak;
                        drop(recv);
                        tracing::debug!(
                            id = %self.id, error = %e, streak,
                            "discarding unparseable frame"
                        );
                        self.check_streak(streak)?;
                        continue;
                    }
                    Err(e) => {
                        self.mark_dead();
                        return Err(e.into());
                    }
                }
            };

            match header.frame_type {
                FrameType::Ack => {
                    let mut send = self.send_half.lock().await;
                    send.retransmit.acknowledge(header.seq);
                }
                FrameType::Nak => {
                    let mut send = self.send_half.lock().await;
                    if let Some(frame) = send
                        .retransmit
                        .get(header.seq)
                        .map(|f| f.to_vec())
                    {
                        tracing::debug!(
                            id = %self.id, seq = header.seq,
                            "retransmitting after NAK"
                        );
                        if let Err(e) =
                            write_all(&mut send.stream, &frame).await
                        {
                            self.mark_dead();
                            return Err(e);
                        }
                    }
                    // Evicted seqs are simply not retransmitted.
                }
                FrameType::Game | FrameType::Chat => {
                    self.send_control(FrameType::Ack, header.seq).await?;
                    return Ok((header.frame_type, header.seq, value));
                }
            }
        }
    }

    /// Receives the next data frame and decodes it as an [`AppMessage`].
    pub async fn recv_msg(&self) -> Result<AppMessage, TransportError> {
        let (_, _, value) = self.recv().await?;
        serde_json::from_value(value)
            .map_err(|e| TransportError::Frame(FrameError::Parse(e)))
    }

    fn check_streak(&self, streak: u32) -> Result<(), TransportError> {
        if streak >= RECV_FAILURE_LIMIT {
            tracing::warn!(
                id = %self.id,
                "{RECV_FAILURE_LIMIT} consecutive receive failures, \
                 closing connection"
            );
            self.mark_dead();
            Err(TransportError::TooManyErrors)
        } else {
            Ok(())
        }
    }
}

/// Maps a read error to `Closed` on EOF/reset, `Io` otherwise.
fn eof_or_io(e: std::io::Error) -> TransportError {
    use std::io::ErrorKind;
    match e.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::BrokenPipe => TransportError::Closed,
        _ => TransportError::Io(e),
    }
}

async fn write_all(
    stream: &mut OwnedWriteHalf,
    bytes: &[u8],
) -> Result<(), TransportError> {
    stream.write_all(bytes).await?;
    stream.flush().await?;
    Ok(())
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Accepts one connection on a loopback listener and returns both
    /// ends: the server-side `FramedConnection` and the raw client
    /// stream for hand-rolled traffic.
    async fn conn_pair(codec: FrameCodec) -> (FramedConnection, TcpStream) {
        let transport = TcpTransport::bind("127.0.0.1:0", codec)
            .await
            .expect("bind");
        let addr = transport.local_addr().unwrap();
        let client = tokio::spawn(async move {
            TcpStream::connect(addr).await.expect("connect")
        });
        let server = transport.accept().await.expect("accept");
        (server, client.await.unwrap())
    }

    /// Reads exactly one frame from the raw client side.
    async fn read_frame(stream: &mut TcpStream) -> (FrameType, u32, Value) {
        let mut header_bytes = [0u8; HEADER_LEN];
        stream.read_exact(&mut header_bytes).await.expect("header");
        let header = Header::parse(&header_bytes).expect("parse header");
        let mut payload = vec![0u8; header.len as usize];
        stream.read_exact(&mut payload).await.expect("payload");
        let value = FrameCodec::plaintext()
            .unpack_payload(&header, &header_bytes, &payload)
            .expect("payload decode");
        (header.frame_type, header.seq, value)
    }

    /// Reads frames until one that isn't an ACK shows up.
    async fn read_non_ack(stream: &mut TcpStream) -> (FrameType, u32, Value) {
        loop {
            let frame = read_frame(stream).await;
            if frame.0 != FrameType::Ack {
                return frame;
            }
        }
    }

    // =====================================================================
    // Handshake
    // =====================================================================

    #[tokio::test]
    async fn test_read_handshake_parses_token_line() {
        let (server, mut client) =
            conn_pair(FrameCodec::plaintext()).await;
        client.write_all(b"TOKEN PID1234\n").await.unwrap();

        let token = server
            .read_handshake(Duration::from_secs(1))
            .await
            .expect("handshake");

        assert_eq!(token, Token::from("PID1234"));
    }

    #[tokio::test]
    async fn test_read_handshake_times_out_on_silence() {
        let (server, _client) = conn_pair(FrameCodec::plaintext()).await;

        let result =
            server.read_handshake(Duration::from_millis(50)).await;

        assert!(matches!(result, Err(TransportError::HandshakeTimeout)));
        assert!(!server.is_alive());
    }

    #[tokio::test]
    async fn test_read_handshake_rejects_garbage_line() {
        let (server, mut client) =
            conn_pair(FrameCodec::plaintext()).await;
        client.write_all(b"HELLO WORLD\n").await.unwrap();

        let result = server.read_handshake(Duration::from_secs(1)).await;

        assert!(matches!(result, Err(TransportError::BadHandshake)));
    }

    #[tokio::test]
    async fn test_read_handshake_rejects_empty_token() {
        let (server, mut client) =
            conn_pair(FrameCodec::plaintext()).await;
        client.write_all(b"TOKEN \n").await.unwrap();

        let result = server.read_handshake(Duration::from_secs(1)).await;

        assert!(matches!(result, Err(TransportError::BadHandshake)));
    }

    // =====================================================================
    // Send / recv round trips
    // =====================================================================

    #[tokio::test]
    async fn test_send_msg_assigns_monotonic_seqs() {
        let (server, mut client) =
            conn_pair(FrameCodec::plaintext()).await;

        let s0 = server.send_msg(&AppMessage::Prompt).await.unwrap();
        let s1 = server
            .send_msg(&AppMessage::info("hello"))
            .await
            .unwrap();

        assert_eq!((s0, s1), (0, 1));
        let (ft, seq, _) = read_frame(&mut client).await;
        assert_eq!((ft, seq), (FrameType::Game, 0));
        let (_, seq, _) = read_frame(&mut client).await;
        assert_eq!(seq, 1);
    }

    #[tokio::test]
    async fn test_recv_returns_data_frame_and_acks_it() {
        let (server, mut client) =
            conn_pair(FrameCodec::plaintext()).await;
        let codec = FrameCodec::plaintext();

        let frame = codec
            .pack(FrameType::Game, 7, &json!({"type": "prompt"}))
            .unwrap();
        client.write_all(&frame).await.unwrap();

        let (ft, seq, value) = server.recv().await.expect("recv");
        assert_eq!((ft, seq), (FrameType::Game, 7));
        assert_eq!(value["type"], "prompt");

        // The server must ACK the frame on the return path.
        let (ft, seq, _) = read_frame(&mut client).await;
        assert_eq!((ft, seq), (FrameType::Ack, 7));
    }

    #[tokio::test]
    async fn test_ack_prunes_retransmit_buffer() {
        let (server, mut client) =
            conn_pair(FrameCodec::plaintext()).await;
        let codec = FrameCodec::plaintext();

        let seq = server.send_msg(&AppMessage::Prompt).await.unwrap();
        assert_eq!(server.retransmit_len().await, 1);

        client
            .write_all(&codec.pack_control(FrameType::Ack, seq))
            .await
            .unwrap();
        // Feed a data frame after the ACK so recv() has something to
        // return once the control frame is processed.
        client
            .write_all(
                &codec.pack(FrameType::Game, 0, &json!({"type": "prompt"})).unwrap(),
            )
            .await
            .unwrap();

        server.recv().await.expect("recv data frame");
        assert_eq!(server.retransmit_len().await, 0);
    }

    #[tokio::test]
    async fn test_nak_triggers_exactly_one_retransmission() {
        let (server, mut client) =
            conn_pair(FrameCodec::plaintext()).await;
        let codec = FrameCodec::plaintext();

        let seq = server
            .send_msg(&AppMessage::info("keep me"))
            .await
            .unwrap();
        let original = read_frame(&mut client).await;

        // NAK it, then a data frame so recv() returns.
        client
            .write_all(&codec.pack_control(FrameType::Nak, seq))
            .await
            .unwrap();
        client
            .write_all(
                &codec.pack(FrameType::Game, 0, &json!({"type": "prompt"})).unwrap(),
            )
            .await
            .unwrap();
        server.recv().await.expect("recv");

        let retransmitted = read_non_ack(&mut client).await;
        assert_eq!(retransmitted, original);
    }

    #[tokio::test]
    async fn test_nak_for_evicted_seq_is_ignored() {
        let (server, mut client) =
            conn_pair(FrameCodec::plaintext()).await;
        let codec = FrameCodec::plaintext();

        // Push seq 0 out of the 32-deep window.
        for i in 0..40u32 {
            server
                .send_msg(&AppMessage::info(format!("m{i}")))
                .await
                .unwrap();
        }
        for _ in 0..40 {
            read_frame(&mut client).await;
        }

        client
            .write_all(&codec.pack_control(FrameType::Nak, 0))
            .await
            .unwrap();
        client
            .write_all(
                &codec.pack(FrameType::Game, 0, &json!({"type": "prompt"})).unwrap(),
            )
            .await
            .unwrap();
        server.recv().await.expect("recv");

        // Nothing retransmitted: next outbound frame is the ACK for our
        // data frame, not message 0.
        let (ft, _, _) = read_frame(&mut client).await;
        assert_eq!(ft, FrameType::Ack);
    }

    // =====================================================================
    // Error streaks
    // =====================================================================

    #[tokio::test]
    async fn test_three_corrupt_frames_nak_then_kill_connection() {
        let (server, mut client) =
            conn_pair(FrameCodec::plaintext()).await;
        let codec = FrameCodec::plaintext();

        for seq in 0..3u32 {
            let mut frame = codec
                .pack(FrameType::Game, seq, &json!({"x": 1}))
                .unwrap();
            *frame.last_mut().unwrap() ^= 0xFF;
            client.write_all(&frame).await.unwrap();
        }

        let result = server.recv().await;
        assert!(matches!(result, Err(TransportError::TooManyErrors)));
        assert!(!server.is_alive());

        // Each corrupt frame got its NAK before the stream died.
        for seq in 0..3u32 {
            let (ft, s, _) = read_frame(&mut client).await;
            assert_eq!((ft, s), (FrameType::Nak, seq));
        }
    }

    #[tokio::test]
    async fn test_valid_frame_resets_error_streak() {
        let (server, mut client) =
            conn_pair(FrameCodec::plaintext()).await;
        let codec = FrameCodec::plaintext();

        // Two corrupt frames, then a good one, then two more corrupt:
        // never three in a row, so the connection survives.
        let corrupt = |seq: u32| {
            let mut f =
                codec.pack(FrameType::Game, seq, &json!({"x": 1})).unwrap();
            *f.last_mut().unwrap() ^= 0xFF;
            f
        };
        client.write_all(&corrupt(0)).await.unwrap();
        client.write_all(&corrupt(1)).await.unwrap();
        client
            .write_all(
                &codec.pack(FrameType::Game, 2, &json!({"type": "prompt"})).unwrap(),
            )
            .await
            .unwrap();

        let (_, seq, _) = server.recv().await.expect("good frame");
        assert_eq!(seq, 2);

        client.write_all(&corrupt(3)).await.unwrap();
        client.write_all(&corrupt(4)).await.unwrap();
        client
            .write_all(
                &codec.pack(FrameType::Game, 5, &json!({"type": "prompt"})).unwrap(),
            )
            .await
            .unwrap();

        let (_, seq, _) = server.recv().await.expect("still alive");
        assert_eq!(seq, 5);
        assert!(server.is_alive());
    }

    #[tokio::test]
    async fn test_duplicate_seq_is_skipped_as_replay() {
        let (server, mut client) =
            conn_pair(FrameCodec::plaintext()).await;
        let codec = FrameCodec::plaintext();

        let frame = codec
            .pack(FrameType::Game, 1, &json!({"type": "prompt"}))
            .unwrap();
        client.write_all(&frame).await.unwrap();
        server.recv().await.expect("first copy accepted");

        // Replay the exact same bytes, then send a fresh frame.
        client.write_all(&frame).await.unwrap();
        client
            .write_all(
                &codec.pack(FrameType::Game, 2, &json!({"type": "prompt"})).unwrap(),
            )
            .await
            .unwrap();

        let (_, seq, _) = server.recv().await.expect("fresh frame");
        assert_eq!(seq, 2, "replayed frame must not be surfaced");
    }

    #[tokio::test]
    async fn test_bad_magic_kills_connection_immediately() {
        let (server, mut client) =
            conn_pair(FrameCodec::plaintext()).await;

        client.write_all(&[0u8; HEADER_LEN]).await.unwrap();

        let result = server.recv().await;
        assert!(matches!(
            result,
            Err(TransportError::Frame(FrameError::BadHeader))
        ));
        assert!(!server.is_alive());
    }

    #[tokio::test]
    async fn test_peer_close_is_reported_as_closed() {
        let (server, client) = conn_pair(FrameCodec::plaintext()).await;
        drop(client);

        let result = server.recv().await;
        assert!(matches!(result, Err(TransportError::Closed)));
        assert!(!server.is_alive());
    }

    // =====================================================================
    // Encrypted traffic
    // =====================================================================

    #[tokio::test]
    async fn test_encrypted_round_trip_between_matching_codecs() {
        let key: Vec<u8> = (0u8..16).collect();
        let codec = FrameCodec::encrypted(&key).unwrap();
        let (server, mut client) = conn_pair(codec.clone()).await;

        let frame = codec
            .pack(FrameType::Game, 3, &json!({"type": "cmd", "line": "QUIT"}))
            .unwrap();
        client.write_all(&frame).await.unwrap();

        let (_, _, value) = server.recv().await.expect("recv");
        assert_eq!(value["line"], "QUIT");
    }
}
