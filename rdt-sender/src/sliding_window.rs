//! Go-Back-N sliding-window sender.
//!
//! [`Window`] is the pure send-side state; [`SlidingWindowSender`] drives it
//! against a transport.  Unlike stop-and-wait, up to `window_size` segments
//! may be outstanding simultaneously.
//!
//! # Protocol contract
//!
//! - At most `window_size` segments are in flight at once.
//! - Acks are **cumulative** byte offsets: an ack of `K` acknowledges every
//!   in-flight segment whose offset is below `K`.
//! - Stale, duplicate or out-of-order acks never move `base` backwards.
//! - On timeout the whole window is presumed lost: `next` goes back to
//!   `base` and every in-flight segment is resent, oldest first.
//!
//! # Window layout
//!
//! ```text
//!   base              next             sent_end
//!     │                 │                  │
//!  ───┼─────────────────┼──────────────────┼──────────────▶ offsets
//!     │ <── resent ───▶ │ <── to resend ──▶│ <── unsent ──▶
//!     │ <───────── in flight (≤ N) ───────▶│
//! ```
//!
//! Outside a go-back-N round `next == sent_end`.

use std::collections::VecDeque;
use std::iter::Peekable;
use std::time::Instant;

use crate::error::{Result, TransferError};
use crate::metrics::MetricsCollector;
use crate::packet::FrameCodec;
use crate::segment::{Segment, Segmenter, Segments};
use crate::socket::Transport;
use crate::termination::{self, Termination};
use crate::timer::{Inbound, RetransmitTimer};

/// Go-Back-N send-side state for one stream.
#[derive(Debug)]
pub struct Window<'a> {
    window_size: usize,
    /// Segments sent at least once and not yet acknowledged, oldest first.
    in_flight: VecDeque<Segment<'a>>,
    /// Index into `in_flight` of the next segment to (re)transmit.
    cursor: usize,
    /// Segments never transmitted.
    pending: Peekable<Segments<'a>>,
    /// Offset just past the newest segment ever transmitted.
    sent_end: i32,
}

impl<'a> Window<'a> {
    /// Fails with [`TransferError::InvalidConfig`] if `window_size` is zero.
    pub fn new(segmenter: &Segmenter<'a>, window_size: usize) -> Result<Self> {
        check_window_size(window_size)?;
        Ok(Self {
            window_size,
            in_flight: VecDeque::with_capacity(window_size),
            cursor: 0,
            pending: segmenter.segments().peekable(),
            sent_end: 0,
        })
    }

    /// Offset of the oldest unacknowledged segment.
    pub fn base(&self) -> i32 {
        self.in_flight.front().map_or(self.sent_end, |s| s.seq)
    }

    /// Offset of the next segment [`next_to_send`](Self::next_to_send) will
    /// hand out.
    pub fn next(&self) -> i32 {
        self.in_flight.get(self.cursor).map_or(self.sent_end, |s| s.seq)
    }

    /// Number of unacknowledged segments sent at least once.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// `true` when there is room for at least one more in-flight segment.
    pub fn can_send(&self) -> bool {
        self.in_flight.len() < self.window_size
    }

    /// `true` once every segment has been acknowledged.
    pub fn is_done(&mut self) -> bool {
        self.in_flight.is_empty() && self.pending.peek().is_none()
    }

    /// Next segment to put on the wire during the fill phase, and whether it
    /// is a retransmission.  `None` when the window is full or the stream is
    /// exhausted.
    pub fn next_to_send(&mut self) -> Option<(Segment<'a>, bool)> {
        if let Some(&segment) = self.in_flight.get(self.cursor) {
            self.cursor += 1;
            return Some((segment, true));
        }
        if !self.can_send() {
            return None;
        }
        let segment = self.pending.next()?;
        self.in_flight.push_back(segment);
        self.cursor += 1;
        self.sent_end = segment.end();
        Some((segment, false))
    }

    /// Process a cumulative ack, returning the offsets of the segments it
    /// newly acknowledged (oldest first).  Empty for stale or duplicate acks.
    pub fn on_ack(&mut self, ack: i32) -> Vec<i32> {
        let mut acked = Vec::new();
        while let Some(front) = self.in_flight.front() {
            if front.seq >= ack {
                break;
            }
            acked.push(front.seq);
            self.in_flight.pop_front();
        }
        self.cursor = self.cursor.saturating_sub(acked.len());
        acked
    }

    /// Go back N: the next fill resends every in-flight segment from `base`.
    pub fn on_timeout(&mut self) {
        self.cursor = 0;
    }
}

/// Sliding-window send side of one session.
#[derive(Debug)]
pub struct SlidingWindowSender<T> {
    transport: T,
    codec: FrameCodec,
    timer: RetransmitTimer,
    window_size: usize,
    /// Largest in-flight count observed.
    peak_in_flight: usize,
    buf: Vec<u8>,
}

fn check_window_size(window_size: usize) -> Result<()> {
    if window_size == 0 {
        return Err(TransferError::InvalidConfig(
            "window_size must be at least 1".into(),
        ));
    }
    Ok(())
}

impl<T: Transport> SlidingWindowSender<T> {
    /// Fails with [`TransferError::InvalidConfig`] if `window_size` is zero.
    pub fn new(
        transport: T,
        codec: FrameCodec,
        timer: RetransmitTimer,
        window_size: usize,
    ) -> Result<Self> {
        check_window_size(window_size)?;
        Ok(Self {
            transport,
            codec,
            timer,
            window_size,
            peak_in_flight: 0,
            buf: vec![0u8; codec.packet_size() + 1],
        })
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight
    }

    /// Deliver the whole stream; returns once every segment is acknowledged.
    pub async fn send_all(
        &mut self,
        segmenter: &Segmenter<'_>,
        metrics: &mut MetricsCollector,
    ) -> Result<()> {
        if segmenter.final_seq() > self.codec.max_seq() {
            return Err(TransferError::StreamTooLarge(segmenter.total_bytes()));
        }
        let mut window = Window::new(segmenter, self.window_size)?;
        // Re-armed after every transmission burst, progress or expiry; stale
        // acks and malformed frames wait out the current deadline.
        let mut deadline = None;

        while !window.is_done() {
            let sent = self.fill(&mut window, metrics).await?;
            let wait_until = match deadline {
                Some(d) if sent == 0 => d,
                _ => self.timer.arm(),
            };
            deadline = Some(wait_until);

            match self
                .timer
                .recv_frame(&mut self.transport, &self.codec, &mut self.buf, wait_until)
                .await?
            {
                Inbound::Frame(ack) => {
                    let acked = window.on_ack(ack.seq);
                    if acked.is_empty() {
                        log::trace!("[gbn] ← stale ack={} base={}", ack.seq, window.base());
                        continue;
                    }
                    let now = Instant::now();
                    for seq in &acked {
                        metrics.record_ack(*seq, now);
                    }
                    self.timer.reset();
                    deadline = None;
                    log::trace!(
                        "[gbn] ← ACK ack={} slid={} base={} in_flight={}",
                        ack.seq,
                        acked.len(),
                        window.base(),
                        window.in_flight()
                    );
                }
                Inbound::Malformed(e) => log::debug!("[gbn] discarding malformed frame: {e}"),
                Inbound::Expired => {
                    self.timer.on_timeout()?;
                    log::debug!(
                        "[gbn] timeout; going back to base={} ({} segment(s))",
                        window.base(),
                        window.in_flight()
                    );
                    window.on_timeout();
                    deadline = None;
                }
            }
        }
        Ok(())
    }

    /// Fill phase: transmit until the window is full or the stream is out.
    /// Returns the number of frames sent.
    async fn fill(
        &mut self,
        window: &mut Window<'_>,
        metrics: &mut MetricsCollector,
    ) -> Result<usize> {
        let mut sent = 0;
        while let Some((segment, retransmission)) = window.next_to_send() {
            let frame = self.codec.encode(segment.seq, segment.payload)?;
            metrics.record_send(segment.seq, Instant::now());
            self.transport.send(&frame).await?;
            metrics.note_frame(retransmission);
            self.peak_in_flight = self.peak_in_flight.max(window.in_flight());
            log::trace!(
                "[gbn] → DATA seq={} len={} in_flight={}{}",
                segment.seq,
                segment.payload.len(),
                window.in_flight(),
                if retransmission { " (resend)" } else { "" }
            );
            sent += 1;
        }
        Ok(sent)
    }

    /// Close the session once all data is acknowledged.
    pub async fn finish(
        &mut self,
        strategy: Termination,
        final_seq: i32,
        metrics: &mut MetricsCollector,
    ) -> Result<Instant> {
        termination::terminate(
            &mut self.transport,
            &self.codec,
            &mut self.timer,
            strategy,
            final_seq,
            metrics,
        )
        .await
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::RetryPolicy;
    use std::collections::HashSet;
    use std::io;
    use std::time::Duration;

    fn drain(w: &mut Window<'_>) -> Vec<(i32, bool)> {
        std::iter::from_fn(|| w.next_to_send())
            .map(|(s, resend)| (s.seq, resend))
            .collect()
    }

    #[test]
    fn initial_state() {
        let data = [0u8; 50];
        let seg = Segmenter::new(&data, 10).unwrap();
        let mut w = Window::new(&seg, 4).unwrap();
        assert_eq!(w.base(), 0);
        assert_eq!(w.next(), 0);
        assert_eq!(w.in_flight(), 0);
        assert!(w.can_send());
        assert!(!w.is_done());
    }

    #[test]
    fn fill_stops_at_window_size() {
        let data = [0u8; 100];
        let seg = Segmenter::new(&data, 10).unwrap();
        let mut w = Window::new(&seg, 3).unwrap();
        assert_eq!(drain(&mut w), vec![(0, false), (10, false), (20, false)]);
        assert!(!w.can_send());
        assert_eq!(w.in_flight(), 3);
        assert_eq!(w.base(), 0);
        assert_eq!(w.next(), 30);
        assert!(w.next_to_send().is_none());
    }

    #[test]
    fn cumulative_ack_slides_multiple() {
        let data = [0u8; 100];
        let seg = Segmenter::new(&data, 10).unwrap();
        let mut w = Window::new(&seg, 4).unwrap();
        drain(&mut w);

        assert_eq!(w.on_ack(30), vec![0, 10, 20]);
        assert_eq!(w.base(), 30);
        assert_eq!(w.in_flight(), 1);
        assert_eq!(drain(&mut w), vec![(40, false), (50, false), (60, false)]);
    }

    #[test]
    fn ack_mid_segment_counts_segment_as_acked() {
        let data = [0u8; 30];
        let seg = Segmenter::new(&data, 10).unwrap();
        let mut w = Window::new(&seg, 4).unwrap();
        drain(&mut w);
        // Offset strictly below the ack is enough.
        assert_eq!(w.on_ack(11), vec![0, 10]);
    }

    #[test]
    fn stale_and_duplicate_acks_ignored() {
        let data = [0u8; 40];
        let seg = Segmenter::new(&data, 10).unwrap();
        let mut w = Window::new(&seg, 4).unwrap();
        drain(&mut w);

        assert_eq!(w.on_ack(20), vec![0, 10]);
        assert!(w.on_ack(20).is_empty());
        assert!(w.on_ack(10).is_empty());
        assert!(w.on_ack(-1).is_empty());
        assert_eq!(w.base(), 20);
    }

    #[test]
    fn ack_beyond_sent_only_covers_in_flight() {
        let data = [0u8; 100];
        let seg = Segmenter::new(&data, 10).unwrap();
        let mut w = Window::new(&seg, 2).unwrap();
        drain(&mut w);
        assert_eq!(w.on_ack(1000), vec![0, 10]);
        assert_eq!(w.base(), 20);
        assert_eq!(w.next(), 20);
    }

    #[test]
    fn timeout_goes_back_to_base_in_order() {
        let data = [0u8; 100];
        let seg = Segmenter::new(&data, 10).unwrap();
        let mut w = Window::new(&seg, 4).unwrap();
        drain(&mut w);
        w.on_ack(10);

        w.on_timeout();
        assert_eq!(w.next(), w.base());
        // Resends the three unacked segments first, then one new one.
        assert_eq!(
            drain(&mut w),
            vec![(10, true), (20, true), (30, true), (40, false)]
        );
    }

    #[test]
    fn ack_during_go_back_round_keeps_cursor_consistent() {
        let data = [0u8; 40];
        let seg = Segmenter::new(&data, 10).unwrap();
        let mut w = Window::new(&seg, 4).unwrap();
        drain(&mut w);
        w.on_timeout();
        // Resend two, then an ack for the first three arrives.
        w.next_to_send();
        w.next_to_send();
        assert_eq!(w.on_ack(30), vec![0, 10, 20]);
        assert_eq!(w.next(), 30);
        assert_eq!(drain(&mut w), vec![(30, true)]);
    }

    #[test]
    fn in_flight_never_exceeds_window() {
        let data = [0u8; 1000];
        let seg = Segmenter::new(&data, 7).unwrap();
        let mut w = Window::new(&seg, 5).unwrap();
        let mut round = 0;
        while !w.is_done() {
            while w.next_to_send().is_some() {
                assert!(w.in_flight() <= w.window_size());
            }
            round += 1;
            if round % 3 == 0 {
                w.on_timeout();
            } else {
                let ack = w.base() + 15;
                w.on_ack(ack);
            }
            assert!(w.base() <= w.next());
        }
        assert_eq!(w.base(), 1000);
    }

    #[test]
    fn empty_stream_is_done_immediately() {
        let seg = Segmenter::new(&[], 10).unwrap();
        let mut w = Window::new(&seg, 4).unwrap();
        assert!(w.is_done());
        assert!(w.next_to_send().is_none());
    }

    // -----------------------------------------------------------------------
    // SlidingWindowSender against a scripted peer
    // -----------------------------------------------------------------------

    /// In-memory peer: each data frame releases its scripted acks, each one
    /// delivered `delay` after the frame was sent.
    #[derive(Default)]
    struct Scripted {
        sent: Vec<(tokio::time::Instant, i32)>,
        script: VecDeque<Vec<(Duration, i32)>>,
        ready: VecDeque<(tokio::time::Instant, Vec<u8>)>,
    }

    impl Scripted {
        fn seqs(&self) -> Vec<i32> {
            self.sent.iter().map(|(_, seq)| *seq).collect()
        }
    }

    impl Transport for Scripted {
        async fn send(&mut self, frame: &[u8]) -> io::Result<()> {
            let now = tokio::time::Instant::now();
            self.sent
                .push((now, FrameCodec::default().decode(frame).unwrap().seq));
            for (delay, ack) in self.script.pop_front().unwrap_or_default() {
                let reply = FrameCodec::default().encode(ack, b"ack").unwrap();
                self.ready.push_back((now + delay, reply));
            }
            Ok(())
        }

        async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let at = match self.ready.front() {
                Some((at, _)) => *at,
                None => return std::future::pending().await,
            };
            // Dequeue only after the wait so a cancelled recv loses nothing.
            tokio::time::sleep_until(at).await;
            let (_, frame) = self.ready.pop_front().unwrap();
            buf[..frame.len()].copy_from_slice(&frame);
            Ok(frame.len())
        }
    }

    const RTO: Duration = Duration::from_millis(100);

    fn sender(peer: &mut Scripted, window_size: usize) -> SlidingWindowSender<&mut Scripted> {
        SlidingWindowSender::new(
            peer,
            FrameCodec::default(),
            RetransmitTimer::new(RTO, RetryPolicy::bounded(5)),
            window_size,
        )
        .unwrap()
    }

    #[test]
    fn zero_window_rejected() {
        let seg = Segmenter::new(b"abc", 1).unwrap();
        assert!(matches!(
            Window::new(&seg, 0),
            Err(TransferError::InvalidConfig(_))
        ));
        let mut peer = Scripted::default();
        let built = SlidingWindowSender::new(
            &mut peer,
            FrameCodec::default(),
            RetransmitTimer::new(RTO, RetryPolicy::unbounded()),
            0,
        );
        assert!(matches!(built, Err(TransferError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_ack_keeps_current_deadline() {
        let mut peer = Scripted::default();
        // Stale ack 60 ms into the wait, then nothing until the resend.
        peer.script.push_back(vec![(Duration::from_millis(60), 0)]);
        peer.script.push_back(vec![(Duration::ZERO, 5)]);

        let segmenter = Segmenter::new(b"hello", 5).unwrap();
        let mut metrics = MetricsCollector::new(Instant::now());
        sender(&mut peer, 4)
            .send_all(&segmenter, &mut metrics)
            .await
            .unwrap();

        assert_eq!(peer.seqs(), vec![0, 0]);
        let gap = peer.sent[1].0 - peer.sent[0].0;
        // A re-armed wait would have resent at 160 ms.
        assert!(gap >= RTO && gap < RTO + Duration::from_millis(60), "resent after {gap:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_cumulative_acks_record_each_segment_once() {
        let mut peer = Scripted::default();
        peer.script.push_back(vec![]);
        peer.script.push_back(vec![]);
        peer.script.push_back(vec![]);
        peer.script.push_back(vec![
            (Duration::from_millis(10), 10),
            (Duration::from_millis(20), 10),
            (Duration::from_millis(30), 5),
            (Duration::from_millis(40), 20),
        ]);

        let data = [7u8; 20];
        let segmenter = Segmenter::new(&data, 5).unwrap();
        let mut metrics = MetricsCollector::new(Instant::now());
        let mut s = sender(&mut peer, 4);
        s.send_all(&segmenter, &mut metrics).await.unwrap();
        assert_eq!(s.peak_in_flight(), 4);

        assert_eq!(peer.seqs(), vec![0, 5, 10, 15]);
        let acked: Vec<_> = [0, 5, 10, 15]
            .iter()
            .map(|seq| metrics.record(*seq).unwrap().acked_at.unwrap())
            .collect();
        // Two sliding acks, one timestamp each; the duplicate and the stale
        // ack in between recorded nothing.
        assert_eq!(acked[0], acked[1]);
        assert_eq!(acked[2], acked[3]);
        assert!(acked[0] <= acked[2]);
        assert!(acked.iter().collect::<HashSet<_>>().len() <= 2);
        let report = metrics.report(20, Instant::now());
        assert_eq!(report.frames_sent, 4);
        assert_eq!(report.retransmissions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_resends_whole_window_in_order() {
        let mut peer = Scripted::default();
        peer.script.push_back(vec![]);
        peer.script.push_back(vec![]);
        peer.script.push_back(vec![]);
        peer.script.push_back(vec![(Duration::ZERO, 15)]);

        let data = [1u8; 15];
        let segmenter = Segmenter::new(&data, 5).unwrap();
        let mut metrics = MetricsCollector::new(Instant::now());
        sender(&mut peer, 3)
            .send_all(&segmenter, &mut metrics)
            .await
            .unwrap();

        assert_eq!(peer.seqs(), vec![0, 5, 10, 0, 5, 10]);
        assert_eq!(metrics.report(15, Instant::now()).retransmissions, 3);
    }

    #[tokio::test]
    async fn stream_too_long_for_header_sends_nothing() {
        let mut peer = Scripted::default();
        let data = vec![0u8; 300];
        let codec = FrameCodec::new(16, 1).unwrap();
        let segmenter = Segmenter::new(&data, codec.max_payload()).unwrap();
        let mut metrics = MetricsCollector::new(Instant::now());
        let mut s = SlidingWindowSender::new(
            &mut peer,
            codec,
            RetransmitTimer::new(RTO, RetryPolicy::unbounded()),
            4,
        )
        .unwrap();
        let err = s.send_all(&segmenter, &mut metrics).await.unwrap_err();
        assert!(matches!(err, TransferError::StreamTooLarge(300)));
        assert!(peer.sent.is_empty());
    }
}
