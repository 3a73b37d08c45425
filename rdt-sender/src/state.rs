//! Finite-state-machine types for both ends of a transfer.
//!
//! Transitions are driven elsewhere ([`crate::stop_and_wait`],
//! [`crate::termination`], [`crate::receiver`]); keeping the state types in
//! their own module makes them easy to log and assert on in tests.

/// Stop-and-wait sender states.
///
/// ```text
///  IDLE ──▶ SENDING(seq) ──▶ WAITING_ACK(seq) ──valid ack──▶ SENDING(next) …
///                ▲                  │
///                └──── timeout ─────┘
///
///  last segment acked ──▶ CLOSING ──handshake done──▶ DONE
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderState {
    /// Nothing sent yet.
    #[default]
    Idle,
    /// Transmitting the segment at this offset.
    Sending(i32),
    /// Segment at this offset is outstanding.
    WaitingAck(i32),
    /// All data acknowledged; termination handshake in progress.
    Closing,
    /// Handshake finished; the session may be dropped.
    Done,
}

impl std::fmt::Display for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Sending(seq) => write!(f, "SENDING({seq})"),
            Self::WaitingAck(seq) => write!(f, "WAITING_ACK({seq})"),
            Self::Closing => write!(f, "CLOSING"),
            Self::Done => write!(f, "DONE"),
        }
    }
}

/// Reference receiver states.
///
/// ```text
///  RECEIVING ──probe(seq == expected)──▶ FIN_SENT ──finack──▶ CLOSED
///      │                                                        ▲
///      └──────────────── close(seq == -1) ──────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceiverState {
    #[default]
    Receiving,
    /// `fin` has been sent at least once; waiting for the finack.
    FinSent,
    Closed,
}

impl std::fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
