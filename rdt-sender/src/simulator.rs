//! Fault-injecting transport for deterministic testing.
//!
//! Real networks drop and duplicate datagrams.  To exercise the reliability
//! mechanisms without depending on actual network conditions, [`Simulator`]
//! wraps any [`Transport`] and applies a configurable fault model:
//!
//! | Fault              | Description                                         |
//! |--------------------|-----------------------------------------------------|
//! | Outbound loss      | Drop a sent frame with probability `loss_rate`.     |
//! | Inbound loss       | Drop a received frame with `inbound_loss_rate`.     |
//! | Duplication        | Send a frame twice with `duplicate_rate`.           |
//! | First-send drop    | Drop the first transmission of every non-negative   |
//! |                    | sequence id.                                        |
//!
//! Randomness comes from a seeded [`StdRng`] so failures are reproducible.
//! Every frame offered to [`Transport::send`] is recorded in
//! [`Simulator::offered`], whether or not it was dropped, so tests can assert
//! on retransmission order.

use std::collections::HashSet;
use std::io;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::packet::FrameCodec;
use crate::socket::Transport;

/// Configuration for the fault model.
///
/// Probabilities are clamped to `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that an outbound frame is silently dropped.
    pub loss_rate: f64,
    /// Probability that an inbound frame is silently dropped.
    pub inbound_loss_rate: f64,
    /// Probability that an outbound frame is delivered twice.
    pub duplicate_rate: f64,
    /// Drop the first transmission of each distinct sequence id.
    pub drop_first_transmission: bool,
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default: a transparent pass-through.
        Self {
            loss_rate: 0.0,
            inbound_loss_rate: 0.0,
            duplicate_rate: 0.0,
            drop_first_transmission: false,
            seed: 0x5eed,
        }
    }
}

/// A fault-injecting wrapper around another transport.
#[derive(Debug)]
pub struct Simulator<T> {
    inner: T,
    config: SimulatorConfig,
    codec: FrameCodec,
    rng: StdRng,
    /// Sequence ids whose first transmission has already been dropped.
    seen: HashSet<i32>,
    offered: Vec<i32>,
    dropped: usize,
}

impl<T: Transport> Simulator<T> {
    pub fn new(inner: T, config: SimulatorConfig) -> Self {
        Self::with_codec(inner, config, FrameCodec::default())
    }

    /// Use `codec` to read sequence ids from outbound frames.
    pub fn with_codec(inner: T, mut config: SimulatorConfig, codec: FrameCodec) -> Self {
        config.loss_rate = config.loss_rate.clamp(0.0, 1.0);
        config.inbound_loss_rate = config.inbound_loss_rate.clamp(0.0, 1.0);
        config.duplicate_rate = config.duplicate_rate.clamp(0.0, 1.0);
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            codec,
            rng,
            seen: HashSet::new(),
            offered: Vec::new(),
            dropped: 0,
        }
    }

    /// Sequence ids of every frame handed to `send`, in order.
    pub fn offered(&self) -> &[i32] {
        &self.offered
    }

    /// Number of outbound frames swallowed by the fault model.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn should_drop(&mut self, seq: Option<i32>) -> bool {
        // Sentinel ids such as the close frame are never dropped on first send.
        if self.config.drop_first_transmission {
            if let Some(seq) = seq.filter(|s| *s >= 0) {
                if self.seen.insert(seq) {
                    return true;
                }
            }
        }
        self.config.loss_rate > 0.0 && self.rng.random_bool(self.config.loss_rate)
    }
}

impl<T: Transport> Transport for Simulator<T> {
    async fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        let seq = self.codec.decode(frame).ok().map(|p| p.seq);
        if let Some(seq) = seq {
            self.offered.push(seq);
        }

        if self.should_drop(seq) {
            self.dropped += 1;
            log::trace!("[sim] dropped outbound seq={seq:?}");
            return Ok(());
        }

        self.inner.send(frame).await?;
        if self.config.duplicate_rate > 0.0 && self.rng.random_bool(self.config.duplicate_rate) {
            log::trace!("[sim] duplicated outbound seq={seq:?}");
            self.inner.send(frame).await?;
        }
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.inner.recv(buf).await?;
            if self.config.inbound_loss_rate > 0.0
                && self.rng.random_bool(self.config.inbound_loss_rate)
            {
                log::trace!("[sim] dropped inbound frame ({n} bytes)");
                continue;
            }
            return Ok(n);
        }
    }
}
