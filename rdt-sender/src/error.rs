//! Error taxonomy for a transfer session.
//!
//! Timeouts never show up here: they are absorbed by retransmission unless a
//! finite [`crate::timer::RetryPolicy`] runs out. Malformed inbound frames are
//! discarded by the senders and only reach this type when encoding our own
//! outbound frames fails.

use thiserror::Error;

use crate::packet::PacketError;

/// Fatal errors that abort a session.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Socket-level failure other than a receive timeout.
    #[error("transport failure: {0}")]
    Io(#[from] std::io::Error),

    /// An outbound frame could not be encoded.
    #[error("frame error: {0}")]
    Packet(#[from] PacketError),

    /// The input cannot be addressed with signed 32-bit byte offsets.
    #[error("stream of {0} bytes exceeds the addressable offset range")]
    StreamTooLarge(usize),

    /// The retry policy's attempt cap was reached without progress.
    #[error("gave up after {attempts} consecutive timeouts")]
    RetriesExhausted { attempts: u32 },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, TransferError>;
