//! Per-segment timing and the derived transfer metrics.
//!
//! The collector is written only by the active sender and read once, when
//! the session ends.  Nothing here influences protocol decisions.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Send/ack timestamps for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingRecord {
    /// First transmission.
    pub sent_at: Instant,
    /// First valid acknowledgment, if any.
    pub acked_at: Option<Instant>,
}

impl TimingRecord {
    pub fn delay(&self) -> Option<Duration> {
        self.acked_at.map(|ack| ack.saturating_duration_since(self.sent_at))
    }
}

/// Accumulates timing records and frame counters for one session.
#[derive(Debug)]
pub struct MetricsCollector {
    started: Instant,
    records: BTreeMap<i32, TimingRecord>,
    frames_sent: u64,
    retransmissions: u64,
}

impl MetricsCollector {
    /// `started` is the beginning of the wall-clock window for throughput.
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            records: BTreeMap::new(),
            frames_sent: 0,
            retransmissions: 0,
        }
    }

    /// Record the first transmission of `seq`.  Later calls for the same
    /// segment are ignored; returns `true` if this was the first.
    pub fn record_send(&mut self, seq: i32, at: Instant) -> bool {
        if self.records.contains_key(&seq) {
            return false;
        }
        self.records.insert(
            seq,
            TimingRecord {
                sent_at: at,
                acked_at: None,
            },
        );
        true
    }

    /// Record the first acknowledgment of `seq`.  Idempotent; returns `true`
    /// only when the ack time was newly set.
    pub fn record_ack(&mut self, seq: i32, at: Instant) -> bool {
        match self.records.get_mut(&seq) {
            Some(record) if record.acked_at.is_none() => {
                record.acked_at = Some(at);
                true
            }
            _ => false,
        }
    }

    /// Count one frame handed to the transport.
    pub fn note_frame(&mut self, retransmission: bool) {
        self.frames_sent += 1;
        if retransmission {
            self.retransmissions += 1;
        }
    }

    pub fn record(&self, seq: i32) -> Option<&TimingRecord> {
        self.records.get(&seq)
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    /// Mean send-to-ack delay over acknowledged segments.
    pub fn average_delay(&self) -> Option<Duration> {
        let delays: Vec<Duration> = self.records.values().filter_map(TimingRecord::delay).collect();
        if delays.is_empty() {
            return None;
        }
        Some(delays.iter().sum::<Duration>() / delays.len() as u32)
    }

    /// Freeze the collector into a [`Report`].
    pub fn report(&self, total_bytes: usize, finished: Instant) -> Report {
        let elapsed = finished.saturating_duration_since(self.started);
        let tput = throughput(total_bytes, elapsed);
        let average_delay = self.average_delay().map_or(0.0, |d| d.as_secs_f64());
        Report {
            total_bytes,
            segments: self.records.len(),
            elapsed,
            throughput: tput,
            average_delay,
            performance: performance_metric(tput, average_delay),
            frames_sent: self.frames_sent,
            retransmissions: self.retransmissions,
        }
    }
}

/// Bytes per second; 0 when no time elapsed.
pub fn throughput(total_bytes: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        total_bytes as f64 / secs
    } else {
        0.0
    }
}

/// `0.3 * throughput/1000 + 0.7 / average_delay`, or 0 when the delay is
/// zero or not a finite positive number.
pub fn performance_metric(throughput: f64, average_delay: f64) -> f64 {
    if average_delay > 0.0 && average_delay.is_finite() {
        0.3 * (throughput / 1000.0) + 0.7 / average_delay
    } else {
        0.0
    }
}

/// Outcome of one transfer session.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub total_bytes: usize,
    /// Segments transmitted at least once.
    pub segments: usize,
    pub elapsed: Duration,
    /// Bytes per second.
    pub throughput: f64,
    /// Seconds.
    pub average_delay: f64,
    pub performance: f64,
    pub frames_sent: u64,
    pub retransmissions: u64,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "throughput={:.7} B/s, delay={:.7} s, metric={:.7} ({} bytes in {} segments, {} frames, {} retransmitted, {:.3} s)",
            self.throughput,
            self.average_delay,
            self.performance,
            self.total_bytes,
            self.segments,
            self.frames_sent,
            self.retransmissions,
            self.elapsed.as_secs_f64(),
        )
    }
}

/// Means across several trials.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrialSummary {
    pub trials: usize,
    pub throughput: f64,
    pub average_delay: f64,
    pub performance: f64,
}

impl TrialSummary {
    pub fn from_reports(reports: &[Report]) -> Self {
        if reports.is_empty() {
            return Self::default();
        }
        let n = reports.len() as f64;
        let mean = |f: fn(&Report) -> f64| reports.iter().map(f).sum::<f64>() / n;
        Self {
            trials: reports.len(),
            throughput: mean(|r| r.throughput),
            average_delay: mean(|r| r.average_delay),
            performance: mean(|r| r.performance),
        }
    }
}

impl fmt::Display for TrialSummary {
    /// One value per line, seven decimals: throughput, delay, metric.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.7},\n{:.7},\n{:.7}",
            self.throughput, self.average_delay, self.performance
        )
    }
}
