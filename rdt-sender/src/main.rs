//! Entry point for `rdt-sender`.
//!
//! Parses CLI arguments and dispatches into either **send** or **receive**
//! mode.  All protocol work is delegated to library modules; `main.rs` owns
//! only process setup (logging, argument parsing, file I/O).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rdt_sender::config::{SenderConfig, Variant, DEFAULT_PEER};
use rdt_sender::packet::{FrameCodec, HEADER_LEN, PACKET_SIZE};
use rdt_sender::receiver;
use rdt_sender::session;
use rdt_sender::socket::Socket;
use rdt_sender::termination::Termination;
use rdt_sender::timer::RetryPolicy;

/// Reliable byte-stream delivery over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Send a file to a receiver and report throughput and delay.
    Send {
        /// File whose bytes are transferred.
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Variant::StopAndWait)]
        variant: Variant,
        /// Independent transfers to run and average.
        #[arg(short = 'n', long, default_value_t = 1)]
        trials: usize,
        /// Receiver address.
        #[arg(short, long, default_value_t = DEFAULT_PEER)]
        peer: SocketAddr,
        /// Retransmit timeout in milliseconds (default depends on the variant).
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Segments in flight for the sliding-window variant.
        #[arg(long)]
        window_size: Option<usize>,
        #[arg(long, default_value_t = PACKET_SIZE)]
        packet_size: usize,
        #[arg(long, default_value_t = HEADER_LEN)]
        header_size: usize,
        /// Close strategy (default depends on the variant).
        #[arg(long, value_enum)]
        termination: Option<Termination>,
        /// Give up after this many consecutive timeouts (default: never).
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Run the reference receiver.
    Receive {
        /// Local address to bind.
        #[arg(short, long, default_value_t = DEFAULT_PEER)]
        bind: SocketAddr,
        /// Sessions to serve before exiting.
        #[arg(short, long, default_value_t = 1)]
        sessions: usize,
        /// Write the last received stream here.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, default_value_t = PACKET_SIZE)]
        packet_size: usize,
        #[arg(long, default_value_t = HEADER_LEN)]
        header_size: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Send {
            file,
            variant,
            trials,
            peer,
            timeout_ms,
            window_size,
            packet_size,
            header_size,
            termination,
            max_attempts,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;

            let mut config = SenderConfig::for_variant(variant).with_peer(peer);
            config.packet_size = packet_size;
            config.header_size = header_size;
            if let Some(ms) = timeout_ms {
                config = config.with_timeout(Duration::from_millis(ms));
            }
            if let Some(n) = window_size {
                config = config.with_window_size(n);
            }
            if let Some(t) = termination {
                config = config.with_termination(t);
            }
            if let Some(n) = max_attempts {
                config = config.with_retry(RetryPolicy::bounded(n));
            }

            log::info!(
                "sending {} ({} bytes) to {peer} with {variant}, {trials} trial(s)",
                file.display(),
                data.len()
            );
            let (reports, summary) = session::run_trials(&config, &data, trials)
                .await
                .context("transfer failed")?;
            for (i, report) in reports.iter().enumerate() {
                println!("trial {}: {report}", i + 1);
            }
            println!("{summary}");
        }
        Mode::Receive {
            bind,
            sessions,
            output,
            packet_size,
            header_size,
        } => {
            let codec = FrameCodec::new(packet_size, header_size)
                .context("invalid packet/header size")?;
            let socket = Socket::bind(bind)
                .await
                .with_context(|| format!("binding {bind}"))?;
            log::info!("receiver listening on {}", socket.local_addr);

            for n in 1..=sessions {
                let data = receiver::serve(&socket, codec)
                    .await
                    .context("receive failed")?;
                log::info!("session {n}/{sessions}: received {} bytes", data.len());
                if let Some(path) = &output {
                    tokio::fs::write(path, &data)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                }
            }
        }
    }
    Ok(())
}
