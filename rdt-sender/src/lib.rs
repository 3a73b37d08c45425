//! `rdt-sender`: reliable byte-stream delivery over UDP.
//!
//! # Architecture
//!
//! ```text
//!  ┌───────────┐  segments  ┌────────────────────────────┐
//!  │ Segmenter │───────────▶│ StopAndWaitSender          │
//!  └───────────┘            │   or SlidingWindowSender   │
//!                           └──┬──────────────────────┬──┘
//!             RetransmitTimer  │                      │ MetricsCollector
//!                              │ frames / acks        │
//!                           ┌──▼──────────────────┐   ▼
//!                           │ Transport           │  Report
//!                           │ (UdpTransport,      │
//!                           │  Simulator<T>)      │
//!                           └─────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]: wire format (encode / decode)
//! - [`segment`]: splitting the input into offset-addressed segments
//! - [`stop_and_wait`]: one-segment-at-a-time sender
//! - [`sliding_window`]: Go-Back-N window state machine and sender
//! - [`termination`]: session close handshakes
//! - [`timer`]: retransmit deadlines and retry policy
//! - [`metrics`]: per-segment timing, throughput and the performance metric
//! - [`session`]: one transfer end to end, and multi-trial runs
//! - [`receiver`]: in-order reference receiver
//! - [`state`]: finite-state-machine types
//! - [`config`]: sender configuration and defaults
//! - [`simulator`]: optional lossy network layer for testing
//! - [`socket`]: async UDP socket abstraction
//! - [`error`]: fatal session errors

pub mod config;
pub mod error;
pub mod metrics;
pub mod packet;
pub mod receiver;
pub mod segment;
pub mod session;
pub mod simulator;
pub mod sliding_window;
pub mod socket;
pub mod state;
pub mod stop_and_wait;
pub mod termination;
pub mod timer;

pub use error::TransferError;
