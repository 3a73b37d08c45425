//! Stop-and-wait sender.
//!
//! [`StopAndWaitSender`] transmits exactly one segment at a time and does not
//! move on until the peer acknowledges it.
//!
//! # Protocol contract
//! - At most **one** segment is in flight at any moment.
//! - Acks are cumulative byte offsets.  An ack is valid for the segment at
//!   offset `seq` iff `ack > seq`; anything else is a stale ack for an
//!   earlier segment and is ignored.
//! - On timeout the identical frame is resent and a fresh wait begins.
//!   Stale acks and malformed frames do not restart the wait.
//! - The delay recorded for a segment spans its first transmission to its
//!   valid ack, retransmissions included.

use std::time::{Duration, Instant};

use crate::error::{Result, TransferError};
use crate::metrics::MetricsCollector;
use crate::packet::FrameCodec;
use crate::segment::{Segment, Segmenter};
use crate::socket::Transport;
use crate::state::SenderState;
use crate::termination::{self, Termination};
use crate::timer::{Inbound, RetransmitTimer};

/// Stop-and-wait send side of one session.
#[derive(Debug)]
pub struct StopAndWaitSender<T> {
    transport: T,
    codec: FrameCodec,
    timer: RetransmitTimer,
    state: SenderState,
    /// Receive buffer, one byte past the packet size.
    buf: Vec<u8>,
}

impl<T: Transport> StopAndWaitSender<T> {
    pub fn new(transport: T, codec: FrameCodec, timer: RetransmitTimer) -> Self {
        Self {
            transport,
            codec,
            timer,
            state: SenderState::Idle,
            buf: vec![0u8; codec.packet_size() + 1],
        }
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    /// Send every segment of the stream, one at a time, in offset order.
    pub async fn send_all(
        &mut self,
        segmenter: &Segmenter<'_>,
        metrics: &mut MetricsCollector,
    ) -> Result<()> {
        if segmenter.final_seq() > self.codec.max_seq() {
            return Err(TransferError::StreamTooLarge(segmenter.total_bytes()));
        }
        for segment in segmenter.segments() {
            self.send_segment(segment, metrics).await?;
        }
        self.state = SenderState::Closing;
        Ok(())
    }

    /// Transmit one segment and block until it is acknowledged.
    ///
    /// Returns the delay from first transmission to the valid ack.
    pub async fn send_segment(
        &mut self,
        segment: Segment<'_>,
        metrics: &mut MetricsCollector,
    ) -> Result<Duration> {
        let seq = segment.seq;
        let frame = self.codec.encode(seq, segment.payload)?;
        let first_sent = Instant::now();
        metrics.record_send(seq, first_sent);

        let mut retransmission = false;
        loop {
            self.state = SenderState::Sending(seq);
            self.transport.send(&frame).await?;
            metrics.note_frame(retransmission);
            log::trace!("[saw] → DATA seq={seq} len={}", segment.payload.len());

            self.state = SenderState::WaitingAck(seq);
            if let Some(ack) = self.await_ack(seq).await? {
                let acked_at = Instant::now();
                metrics.record_ack(seq, acked_at);
                self.timer.reset();
                let delay = acked_at - first_sent;
                log::trace!("[saw] ← ACK ack={ack} delay={delay:?}");
                return Ok(delay);
            }

            self.timer.on_timeout()?;
            log::debug!(
                "[saw] timeout seq={seq} (attempt {}); retransmitting",
                self.timer.timeouts()
            );
            retransmission = true;
        }
    }

    /// Wait one timeout for an ack covering `seq`; `None` on expiry.
    async fn await_ack(&mut self, seq: i32) -> Result<Option<i32>> {
        let deadline = self.timer.arm();
        loop {
            match self
                .timer
                .recv_frame(&mut self.transport, &self.codec, &mut self.buf, deadline)
                .await?
            {
                Inbound::Frame(ack) if ack.seq > seq => return Ok(Some(ack.seq)),
                Inbound::Frame(stale) => {
                    log::trace!("[saw] stale ack={} for seq={seq}", stale.seq);
                }
                Inbound::Malformed(e) => log::debug!("[saw] discarding malformed frame: {e}"),
                Inbound::Expired => return Ok(None),
            }
        }
    }

    /// Close the session once all data is acknowledged.
    pub async fn finish(
        &mut self,
        strategy: Termination,
        final_seq: i32,
        metrics: &mut MetricsCollector,
    ) -> Result<Instant> {
        self.state = SenderState::Closing;
        let finished = termination::terminate(
            &mut self.transport,
            &self.codec,
            &mut self.timer,
            strategy,
            final_seq,
            metrics,
        )
        .await?;
        self.state = SenderState::Done;
        Ok(finished)
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}
