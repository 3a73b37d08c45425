//! Retransmit timer and retry policy.
//!
//! Reliable delivery requires that unacknowledged frames are re-sent if no
//! ack arrives within a bounded time.  The timer here is not a separately
//! scheduled callback: the owning sender arms a deadline and then blocks in
//! [`RetransmitTimer::recv_frame`], which resolves with either the next
//! inbound frame or [`Inbound::Expired`] once the deadline passes.  That
//! call is the only suspension point of a transfer.
//!
//! How many consecutive timeouts are tolerated, and whether the timeout grows
//! between them, is decided by an explicit [`RetryPolicy`].  The default is
//! the classic behaviour: retry forever with a fixed timeout.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Result, TransferError};
use crate::packet::{FrameCodec, Packet, PacketError};
use crate::socket::Transport;

/// How the timeout evolves across consecutive expiries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Every wait uses the configured timeout.
    #[default]
    Fixed,
    /// Double the timeout on each expiry, capped at `max`.
    Exponential { max: Duration },
}

/// Bound on consecutive timeouts without progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Retry forever with a fixed timeout.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Give up after `max_attempts` consecutive timeouts.
    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            backoff: Backoff::Fixed,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Per-session retransmit timer.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    /// Timeout restored after every bit of progress.
    base_rto: Duration,
    /// Timeout used for the next wait.
    current_rto: Duration,
    policy: RetryPolicy,
    /// Consecutive expiries since the last call to [`reset`](Self::reset).
    timeouts: u32,
}

impl RetransmitTimer {
    pub fn new(rto: Duration, policy: RetryPolicy) -> Self {
        Self {
            base_rto: rto,
            current_rto: rto,
            policy,
            timeouts: 0,
        }
    }

    /// Deadline for a wait starting now.
    pub fn arm(&self) -> Instant {
        Instant::now() + self.current_rto
    }

    /// Timeout the next [`arm`](Self::arm) will use.
    pub fn current_rto(&self) -> Duration {
        self.current_rto
    }

    /// Consecutive expiries since the last progress.
    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }

    /// Resolve `fut` unless `deadline` passes first.
    pub async fn wait<F: Future>(&self, deadline: Instant, fut: F) -> Option<F::Output> {
        tokio::time::timeout_at(deadline, fut).await.ok()
    }

    /// Block until the next datagram from the peer or `deadline`, whichever
    /// comes first.
    ///
    /// `buf` should be one byte longer than the packet size so oversized
    /// frames are reported as malformed instead of silently truncated.
    /// Transport errors are fatal and propagate.
    pub async fn recv_frame<T: Transport>(
        &self,
        transport: &mut T,
        codec: &FrameCodec,
        buf: &mut [u8],
        deadline: Instant,
    ) -> Result<Inbound> {
        match self.wait(deadline, transport.recv(buf)).await {
            None => Ok(Inbound::Expired),
            Some(Err(e)) => Err(TransferError::Io(e)),
            Some(Ok(n)) => Ok(match codec.decode(&buf[..n]) {
                Ok(packet) => Inbound::Frame(packet),
                Err(e) => Inbound::Malformed(e),
            }),
        }
    }

    /// Account for one expiry.
    ///
    /// Applies the backoff strategy, and fails with
    /// [`TransferError::RetriesExhausted`] once the policy's cap is reached.
    pub fn on_timeout(&mut self) -> Result<()> {
        self.timeouts += 1;
        if let Some(max) = self.policy.max_attempts {
            if self.timeouts >= max {
                return Err(TransferError::RetriesExhausted {
                    attempts: self.timeouts,
                });
            }
        }
        if let Backoff::Exponential { max } = self.policy.backoff {
            self.current_rto = (self.current_rto * 2).min(max);
        }
        Ok(())
    }

    /// Progress was made: forget previous expiries and restore the base RTO.
    pub fn reset(&mut self) {
        self.timeouts = 0;
        self.current_rto = self.base_rto;
    }
}

/// Outcome of one deadline-bounded receive.
#[derive(Debug)]
pub enum Inbound {
    Frame(Packet),
    /// A datagram arrived but did not decode; callers discard it.
    Malformed(PacketError),
    /// The deadline passed first.
    Expired,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_never_changes_rto() {
        let mut t = RetransmitTimer::new(Duration::from_millis(500), RetryPolicy::unbounded());
        for _ in 0..50 {
            t.on_timeout().unwrap();
        }
        assert_eq!(t.current_rto(), Duration::from_millis(500));
        assert_eq!(t.timeouts(), 50);
    }

    #[test]
    fn bounded_policy_gives_up() {
        let mut t = RetransmitTimer::new(Duration::from_millis(10), RetryPolicy::bounded(3));
        t.on_timeout().unwrap();
        t.on_timeout().unwrap();
        assert!(matches!(
            t.on_timeout(),
            Err(TransferError::RetriesExhausted { attempts: 3 })
        ));
    }

    #[test]
    fn reset_clears_attempts() {
        let mut t = RetransmitTimer::new(Duration::from_millis(10), RetryPolicy::bounded(2));
        t.on_timeout().unwrap();
        t.reset();
        t.on_timeout().unwrap();
        assert_eq!(t.timeouts(), 1);
    }

    #[test]
    fn exponential_backoff_doubles_up_to_cap() {
        let policy = RetryPolicy::unbounded().with_backoff(Backoff::Exponential {
            max: Duration::from_millis(300),
        });
        let mut t = RetransmitTimer::new(Duration::from_millis(100), policy);
        t.on_timeout().unwrap();
        assert_eq!(t.current_rto(), Duration::from_millis(200));
        t.on_timeout().unwrap();
        assert_eq!(t.current_rto(), Duration::from_millis(300));
        t.reset();
        assert_eq!(t.current_rto(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_returns_none_after_deadline() {
        let t = RetransmitTimer::new(Duration::from_millis(100), RetryPolicy::unbounded());
        let deadline = t.arm();
        let out = t.wait(deadline, std::future::pending::<()>()).await;
        assert!(out.is_none());
        assert!(Instant::now() >= deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_returns_ready_value() {
        let t = RetransmitTimer::new(Duration::from_millis(100), RetryPolicy::unbounded());
        let out = t.wait(t.arm(), async { 7 }).await;
        assert_eq!(out, Some(7));
    }
}
