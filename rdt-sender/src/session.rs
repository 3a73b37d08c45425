//! One transfer, end to end.
//!
//! A [`Session`] owns the transport for a single run: it segments the input,
//! drives the configured sender variant to completion, closes the session and
//! turns the collected timings into a [`Report`].  Sessions are single use;
//! [`run_trials`] opens a fresh one per trial so no state leaks between runs.

use std::time::Instant;

use crate::config::{SenderConfig, Variant};
use crate::error::Result;
use crate::metrics::{MetricsCollector, Report, TrialSummary};
use crate::packet::FrameCodec;
use crate::segment::Segmenter;
use crate::sliding_window::SlidingWindowSender;
use crate::socket::{Transport, UdpTransport};
use crate::stop_and_wait::StopAndWaitSender;
use crate::timer::RetransmitTimer;

#[derive(Debug)]
pub struct Session<T> {
    transport: T,
    config: SenderConfig,
    codec: FrameCodec,
    /// Start of the wall-clock measurement.
    opened: Instant,
}

impl Session<UdpTransport> {
    /// Bind a fresh UDP socket towards `config.peer`.
    pub async fn open(config: SenderConfig) -> Result<Self> {
        config.validate()?;
        let opened = Instant::now();
        let transport = UdpTransport::open(config.peer).await?;
        log::debug!(
            "session {} -> {} ({})",
            transport.local_addr(),
            transport.peer(),
            config.variant
        );
        Self::start(transport, config, opened)
    }
}

impl<T: Transport> Session<T> {
    /// Run a session over an existing transport.
    pub fn with_transport(transport: T, config: SenderConfig) -> Result<Self> {
        config.validate()?;
        Self::start(transport, config, Instant::now())
    }

    fn start(transport: T, config: SenderConfig, opened: Instant) -> Result<Self> {
        let codec = config.codec()?;
        Ok(Self {
            transport,
            config,
            codec,
            opened,
        })
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Deliver `data` reliably, close the session and report.
    pub async fn transfer(self, data: &[u8]) -> Result<Report> {
        let Self {
            transport,
            config,
            codec,
            opened,
        } = self;

        let segmenter = Segmenter::for_codec(data, &codec)?;
        let final_seq = segmenter.final_seq();
        let mut metrics = MetricsCollector::new(opened);
        let timer = RetransmitTimer::new(config.retransmit_timeout, config.retry);

        let finished = match config.variant {
            Variant::StopAndWait => {
                let mut sender = StopAndWaitSender::new(transport, codec, timer);
                sender.send_all(&segmenter, &mut metrics).await?;
                sender
                    .finish(config.termination, final_seq, &mut metrics)
                    .await?
            }
            Variant::SlidingWindow => {
                let mut sender =
                    SlidingWindowSender::new(transport, codec, timer, config.window_size)?;
                sender.send_all(&segmenter, &mut metrics).await?;
                log::debug!("[gbn] peak in flight {}", sender.peak_in_flight());
                sender
                    .finish(config.termination, final_seq, &mut metrics)
                    .await?
            }
        };

        let report = metrics.report(segmenter.total_bytes(), finished);
        log::info!("{} transfer complete: {report}", config.variant);
        Ok(report)
    }
}

/// Run `trials` independent transfers of `data` and average them.
pub async fn run_trials(
    config: &SenderConfig,
    data: &[u8],
    trials: usize,
) -> Result<(Vec<Report>, TrialSummary)> {
    let mut reports = Vec::with_capacity(trials);
    for trial in 1..=trials {
        log::info!("trial {trial}/{trials}");
        let session = Session::open(config.clone()).await?;
        reports.push(session.transfer(data).await?);
    }
    let summary = TrialSummary::from_reports(&reports);
    Ok((reports, summary))
}
