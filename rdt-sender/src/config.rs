//! Sender configuration.
//!
//! Defaults mirror the deployment the protocol was tuned for: 1024-byte
//! frames with a 4-byte header, a receiver on `127.0.0.1:5001`, and
//! per-variant timeouts and termination strategies.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{Result, TransferError};
use crate::packet::{FrameCodec, HEADER_LEN, PACKET_SIZE};
use crate::termination::Termination;
use crate::timer::RetryPolicy;

/// Where the reference receiver listens unless told otherwise.
pub const DEFAULT_PEER: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 5001);

/// Segments allowed in flight by the sliding-window sender.
pub const DEFAULT_WINDOW_SIZE: usize = 100;

/// Which sender state machine drives the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Variant {
    /// One outstanding segment at a time.
    StopAndWait,
    /// Fixed window, cumulative acks, go-back-N.
    SlidingWindow,
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopAndWait => write!(f, "stop-and-wait"),
            Self::SlidingWindow => write!(f, "sliding-window"),
        }
    }
}

/// Everything a [`crate::session::Session`] needs to run one transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct SenderConfig {
    pub variant: Variant,
    pub peer: SocketAddr,
    pub packet_size: usize,
    pub header_size: usize,
    /// Ignored by stop-and-wait.
    pub window_size: usize,
    pub retransmit_timeout: Duration,
    pub termination: Termination,
    pub retry: RetryPolicy,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self::stop_and_wait()
    }
}

impl SenderConfig {
    /// 1 s timeout, three-way close.
    pub fn stop_and_wait() -> Self {
        Self {
            variant: Variant::StopAndWait,
            peer: DEFAULT_PEER,
            packet_size: PACKET_SIZE,
            header_size: HEADER_LEN,
            window_size: DEFAULT_WINDOW_SIZE,
            retransmit_timeout: Duration::from_secs(1),
            termination: Termination::ThreeWay,
            retry: RetryPolicy::unbounded(),
        }
    }

    /// 0.5 s timeout, single-shot close, window of 100.
    pub fn sliding_window() -> Self {
        Self {
            variant: Variant::SlidingWindow,
            retransmit_timeout: Duration::from_millis(500),
            termination: Termination::SingleShot,
            ..Self::stop_and_wait()
        }
    }

    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::StopAndWait => Self::stop_and_wait(),
            Variant::SlidingWindow => Self::sliding_window(),
        }
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = peer;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.retransmit_timeout = timeout;
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Frame codec for the configured layout.
    pub fn codec(&self) -> Result<FrameCodec> {
        FrameCodec::new(self.packet_size, self.header_size).ok_or_else(|| {
            TransferError::InvalidConfig(format!(
                "packet_size {} / header_size {} (header must be 1..=4 bytes and smaller than the packet)",
                self.packet_size, self.header_size
            ))
        })
    }

    /// Reject configurations no sender could run with.
    pub fn validate(&self) -> Result<()> {
        self.codec()?;
        if self.window_size == 0 {
            return Err(TransferError::InvalidConfig(
                "window_size must be at least 1".into(),
            ));
        }
        if self.retransmit_timeout.is_zero() {
            return Err(TransferError::InvalidConfig(
                "retransmit_timeout must be non-zero".into(),
            ));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(TransferError::InvalidConfig(
                "max attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
