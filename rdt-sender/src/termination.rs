//! Session close once every data segment is acknowledged.
//!
//! Two contracts are in use by deployed receivers, so both are offered as
//! named strategies:
//!
//! ```text
//!  ThreeWay                               SingleShot
//!  sender                    receiver     sender                    receiver
//!    │ ── [final]() ──────────▶ │           │ ── [-1]"==FINACK" ─────▶ │
//!    │    (repeat on timeout)   │           │  close                   │
//!    │ ◀─────── [..]"fin" ───── │
//!    │ ── [final]"==FINACK==" ▶ │
//!    │  close                   │
//! ```
//!
//! Neither strategy ever retransmits data; the caller must only start the
//! handshake after the last segment has been acknowledged.

use std::time::Instant;

use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::packet::{FrameCodec, CLOSE_MARKER, CLOSE_SEQ, FINACK_MARKER, FIN_MARKER};
use crate::socket::Transport;
use crate::timer::{Inbound, RetransmitTimer};

/// How a sender closes the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Termination {
    /// Probe with the final sequence id until the peer replies `fin`, then
    /// send one unacknowledged finack.
    #[default]
    ThreeWay,
    /// Send one sentinel close frame and leave.
    SingleShot,
}

/// Run the handshake for a stream of `final_seq` bytes.
///
/// Returns the instant the transfer counts as finished: when the peer's
/// `fin` arrived (three-way) or when the close frame was sent (single-shot).
pub async fn terminate<T: Transport>(
    transport: &mut T,
    codec: &FrameCodec,
    timer: &mut RetransmitTimer,
    strategy: Termination,
    final_seq: i32,
    metrics: &mut MetricsCollector,
) -> Result<Instant> {
    match strategy {
        Termination::ThreeWay => three_way(transport, codec, timer, final_seq, metrics).await,
        Termination::SingleShot => {
            let close = codec.encode(CLOSE_SEQ, CLOSE_MARKER)?;
            transport.send(&close).await?;
            metrics.note_frame(false);
            log::debug!("[term] → CLOSE seq={CLOSE_SEQ}");
            Ok(Instant::now())
        }
    }
}

async fn three_way<T: Transport>(
    transport: &mut T,
    codec: &FrameCodec,
    timer: &mut RetransmitTimer,
    final_seq: i32,
    metrics: &mut MetricsCollector,
) -> Result<Instant> {
    let probe = codec.encode(final_seq, &[])?;
    let mut buf = vec![0u8; codec.packet_size() + 1];

    let fin_at = 'probe: loop {
        transport.send(&probe).await?;
        metrics.note_frame(false);
        log::debug!("[term] → PROBE seq={final_seq}");

        let deadline = timer.arm();
        loop {
            match timer.recv_frame(transport, codec, &mut buf, deadline).await? {
                Inbound::Frame(reply) if reply.carries(FIN_MARKER) => {
                    log::debug!("[term] ← FIN");
                    break 'probe Instant::now();
                }
                Inbound::Frame(other) => {
                    log::trace!("[term] ignoring seq={} while awaiting fin", other.seq);
                }
                Inbound::Malformed(e) => log::debug!("[term] discarding malformed frame: {e}"),
                Inbound::Expired => {
                    timer.on_timeout()?;
                    log::debug!("[term] timeout awaiting fin; re-probing");
                    continue 'probe;
                }
            }
        }
    };
    timer.reset();

    let finack = codec.encode(final_seq, FINACK_MARKER)?;
    transport.send(&finack).await?;
    metrics.note_frame(false);
    log::debug!("[term] → FINACK seq={final_seq}");
    Ok(fin_at)
}
