//! Application-level reliability on top of TCP's own.
//!
//! TCP already delivers bytes in order, but the protocol tolerates
//! application-level corruption (fuzzing, misbehaving clients, test
//! injection): every data frame is ACKed, a corrupt frame is NAKed and
//! retransmitted from a bounded buffer, and a replay window rejects
//! stale or duplicated sequence numbers.
//!
//! Both structures are strictly per-direction, per-connection state;
//! they live inside the connection halves, never process-wide.

use std::collections::{BTreeSet, VecDeque};

use crate::FrameError;

/// How many sent frames are kept for retransmission, per direction.
pub const RETRANSMIT_WINDOW: usize = 32;

/// Reorder tolerance of the receive-side replay window.
pub const REPLAY_WINDOW: u32 = 64;

// ---------------------------------------------------------------------------
// RetransmitBuffer
// ---------------------------------------------------------------------------

/// A bounded buffer of the most recently sent frames, keyed by seq.
///
/// Frames enter on send and leave either on ACK or by falling off the
/// back once more than [`RETRANSMIT_WINDOW`] newer frames have been
/// stashed. A NAK for an evicted seq is simply not honoured.
#[derive(Debug)]
pub struct RetransmitBuffer {
    capacity: usize,
    /// Oldest first. Seqs are monotonic, so eviction pops the front.
    frames: VecDeque<(u32, Vec<u8>)>,
}

impl RetransmitBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            frames: VecDeque::with_capacity(capacity),
        }
    }

    /// Stashes a just-sent frame, evicting the oldest past capacity.
    pub fn stash(&mut self, seq: u32, frame: Vec<u8>) {
        self.frames.push_back((seq, frame));
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
    }

    /// Drops the entry for `seq` after an ACK. Returns whether it was
    /// still buffered.
    pub fn acknowledge(&mut self, seq: u32) -> bool {
        let before = self.frames.len();
        self.frames.retain(|(s, _)| *s != seq);
        self.frames.len() != before
    }

    /// Looks up the raw bytes for `seq` after a NAK.
    pub fn get(&self, seq: u32) -> Option<&[u8]> {
        self.frames
            .iter()
            .find(|(s, _)| *s == seq)
            .map(|(_, f)| f.as_slice())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Default for RetransmitBuffer {
    fn default() -> Self {
        Self::new(RETRANSMIT_WINDOW)
    }
}

// ---------------------------------------------------------------------------
// ReplayWindow
// ---------------------------------------------------------------------------

/// Receive-side record of accepted sequence numbers.
///
/// Accepts any seq newer than `highest - window`, unless that exact seq
/// was already accepted once. Sequence numbers below the cutoff are
/// rejected outright: they can only be replays or grossly stale
/// retransmissions.
#[derive(Debug)]
pub struct ReplayWindow {
    window: u32,
    highest: Option<u32>,
    seen: BTreeSet<u32>,
}

impl ReplayWindow {
    pub fn new(window: u32) -> Self {
        Self {
            window,
            highest: None,
            seen: BTreeSet::new(),
        }
    }

    /// Checks `seq` against the window and records it on success.
    pub fn accept(&mut self, seq: u32) -> Result<(), FrameError> {
        if let Some(highest) = self.highest {
            if seq <= highest.saturating_sub(self.window) {
                return Err(FrameError::Replay(seq));
            }
        }
        if !self.seen.insert(seq) {
            return Err(FrameError::Replay(seq));
        }
        if self.highest.map_or(true, |h| seq > h) {
            self.highest = Some(seq);
        }
        // Purge entries that fell below the cutoff; the cutoff check
        // above makes them unreachable anyway.
        if let Some(highest) = self.highest {
            let cutoff = highest.saturating_sub(self.window);
            self.seen = self.seen.split_off(&(cutoff + 1));
        }
        Ok(())
    }

    /// The highest sequence number accepted so far.
    pub fn highest(&self) -> Option<u32> {
        self.highest
    }
}

impl Default for ReplayWindow {
    fn default() -> Self {
        Self::new(REPLAY_WINDOW)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // RetransmitBuffer
    // =====================================================================

    #[test]
    fn test_stash_then_get_returns_frame() {
        let mut buf = RetransmitBuffer::new(4);
        buf.stash(1, vec![0xAA]);

        assert_eq!(buf.get(1), Some(&[0xAA][..]));
        assert_eq!(buf.get(2), None);
    }

    #[test]
    fn test_stash_past_capacity_evicts_oldest() {
        let mut buf = RetransmitBuffer::new(3);
        for seq in 1..=4 {
            buf.stash(seq, vec![seq as u8]);
        }

        assert_eq!(buf.len(), 3);
        assert_eq!(buf.get(1), None, "oldest entry should be evicted");
        assert!(buf.get(4).is_some());
    }

    #[test]
    fn test_acknowledge_removes_entry() {
        let mut buf = RetransmitBuffer::new(4);
        buf.stash(1, vec![1]);
        buf.stash(2, vec![2]);

        assert!(buf.acknowledge(1));
        assert_eq!(buf.get(1), None);
        assert!(buf.get(2).is_some(), "other entries untouched");
    }

    #[test]
    fn test_acknowledge_unknown_seq_is_noop() {
        let mut buf = RetransmitBuffer::new(4);
        buf.stash(1, vec![1]);

        assert!(!buf.acknowledge(99));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_get_after_eviction_returns_none() {
        // A NAK for a seq that already fell out of the window must not
        // be honoured; there is nothing left to retransmit.
        let mut buf = RetransmitBuffer::new(2);
        buf.stash(1, vec![1]);
        buf.stash(2, vec![2]);
        buf.stash(3, vec![3]);

        assert_eq!(buf.get(1), None);
    }

    #[test]
    fn test_default_capacity_is_window_constant() {
        let mut buf = RetransmitBuffer::default();
        for seq in 0..(RETRANSMIT_WINDOW as u32 + 10) {
            buf.stash(seq, vec![]);
        }
        assert_eq!(buf.len(), RETRANSMIT_WINDOW);
    }

    // =====================================================================
    // ReplayWindow
    // =====================================================================

    #[test]
    fn test_accept_fresh_ascending_seqs() {
        let mut win = ReplayWindow::new(8);
        for seq in 0..20 {
            assert!(win.accept(seq).is_ok(), "seq {seq} should be fresh");
        }
        assert_eq!(win.highest(), Some(19));
    }

    #[test]
    fn test_accept_duplicate_is_replay_error() {
        let mut win = ReplayWindow::new(8);
        win.accept(5).unwrap();

        assert!(matches!(win.accept(5), Err(FrameError::Replay(5))));
    }

    #[test]
    fn test_accept_below_cutoff_is_replay_error() {
        let mut win = ReplayWindow::new(8);
        win.accept(100).unwrap();

        // 100 - 8 = 92; anything at or below 92 is stale.
        assert!(matches!(win.accept(92), Err(FrameError::Replay(92))));
        assert!(matches!(win.accept(0), Err(FrameError::Replay(0))));
    }

    #[test]
    fn test_accept_within_reorder_tolerance() {
        // Frames can arrive slightly out of order (retransmissions);
        // anything above the cutoff and not yet seen is accepted.
        let mut win = ReplayWindow::new(8);
        win.accept(100).unwrap();

        assert!(win.accept(95).is_ok());
        assert!(win.accept(99).is_ok());
    }

    #[test]
    fn test_out_of_order_then_duplicate_rejected() {
        let mut win = ReplayWindow::new(8);
        win.accept(100).unwrap();
        win.accept(95).unwrap();

        assert!(matches!(win.accept(95), Err(FrameError::Replay(95))));
    }

    #[test]
    fn test_highest_does_not_move_backwards() {
        let mut win = ReplayWindow::new(8);
        win.accept(100).unwrap();
        win.accept(95).unwrap();

        assert_eq!(win.highest(), Some(100));
    }

    #[test]
    fn test_low_seqs_near_zero_do_not_underflow() {
        let mut win = ReplayWindow::new(64);
        assert!(win.accept(0).is_ok());
        assert!(win.accept(1).is_ok());
        assert!(matches!(win.accept(0), Err(FrameError::Replay(0))));
    }
}
