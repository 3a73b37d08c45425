//! Wire-format definitions for data, acknowledgment and control frames.
//!
//! Every datagram exchanged between peers is a [`Packet`]: a fixed-width
//! sequence field followed directly by payload bytes.  This module is
//! responsible for:
//! - Defining the on-wire layout and the protocol constants both ends share.
//! - Serialising a [`Packet`] into a frame ready for transmission.
//! - Deserialising a received frame back into a [`Packet`], rejecting frames
//!   that are truncated or larger than the agreed packet size.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! The sequence field is a **signed big-endian** integer so that the sentinel
//! [`CLOSE_SEQ`] (`-1`) can never collide with a real byte offset.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Sequence / Ack offset (i32)                   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     Payload ... (≤ 1020)                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The header width defaults to [`HEADER_LEN`] but [`FrameCodec`] accepts
//! any width from 1 to 4 bytes; narrower headers simply address a smaller
//! stream.

use thiserror::Error;

/// Total frame size, header included.
pub const PACKET_SIZE: usize = 1024;

/// Byte length of the sequence header on the wire.
pub const HEADER_LEN: usize = 4;

/// Largest payload that fits in one frame with the default layout.
pub const MAX_PAYLOAD: usize = PACKET_SIZE - HEADER_LEN;

/// Sequence value of the single-shot close frame.
pub const CLOSE_SEQ: i32 = -1;

/// Payload of the peer's reply to a termination probe.
pub const FIN_MARKER: &[u8] = b"fin";

/// Payload of the final frame of the three-way close.
pub const FINACK_MARKER: &[u8] = b"==FINACK==";

/// Payload of the single-shot close frame.
pub const CLOSE_MARKER: &[u8] = b"==FINACK";

/// Payload the reference receiver attaches to cumulative acks.
pub const ACK_MARKER: &[u8] = b"ack";

/// A decoded datagram: sequence (or ack) offset plus payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Byte offset of the first payload byte, a cumulative ack offset, or
    /// [`CLOSE_SEQ`].
    pub seq: i32,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(seq: i32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            seq,
            payload: payload.into(),
        }
    }

    /// A payload-less frame: termination probe or bare ack.
    pub fn empty(seq: i32) -> Self {
        Self::new(seq, Vec::new())
    }

    /// `true` when the payload equals `marker` byte for byte.
    pub fn carries(&self, marker: &[u8]) -> bool {
        self.payload == marker
    }
}

/// Errors that can arise when building or parsing a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    /// Frame shorter than the header.
    #[error("frame of {len} bytes is shorter than the {header}-byte header")]
    BufferTooShort { len: usize, header: usize },
    /// Frame (or payload being encoded) exceeds the packet size.
    #[error("frame of {len} bytes exceeds the {max}-byte packet size")]
    Oversized { len: usize, max: usize },
    /// Sequence value does not fit in the configured header width.
    #[error("sequence {seq} does not fit in a {header}-byte header")]
    SequenceOutOfRange { seq: i32, header: usize },
}

/// Encoder/decoder for one agreed `(packet_size, header_size)` layout.
///
/// Both ends must use the same layout; the default matches the constants
/// above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    packet_size: usize,
    header_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            packet_size: PACKET_SIZE,
            header_size: HEADER_LEN,
        }
    }
}

impl FrameCodec {
    /// Build a codec for a custom layout.
    ///
    /// Returns `None` unless `1 <= header_size <= 4` and the packet leaves
    /// room for at least one payload byte.
    pub fn new(packet_size: usize, header_size: usize) -> Option<Self> {
        if !(1..=HEADER_LEN).contains(&header_size) || packet_size <= header_size {
            return None;
        }
        Some(Self {
            packet_size,
            header_size,
        })
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Largest payload a single frame can carry.
    pub fn max_payload(&self) -> usize {
        self.packet_size - self.header_size
    }

    /// Largest sequence value the header can carry; also the longest stream
    /// this layout can address.
    pub fn max_seq(&self) -> i32 {
        let bits = 8 * self.header_size as u32;
        ((1i64 << (bits - 1)) - 1) as i32
    }

    /// Serialise `seq` and `payload` into a newly allocated frame.
    pub fn encode(&self, seq: i32, payload: &[u8]) -> Result<Vec<u8>, PacketError> {
        if payload.len() > self.max_payload() {
            return Err(PacketError::Oversized {
                len: self.header_size + payload.len(),
                max: self.packet_size,
            });
        }

        let max = self.max_seq();
        if !(-max - 1..=max).contains(&seq) {
            return Err(PacketError::SequenceOutOfRange {
                seq,
                header: self.header_size,
            });
        }

        let mut buf = Vec::with_capacity(self.header_size + payload.len());
        buf.extend_from_slice(&seq.to_be_bytes()[HEADER_LEN - self.header_size..]);
        buf.extend_from_slice(payload);
        Ok(buf)
    }

    /// Shorthand for `encode(packet.seq, &packet.payload)`.
    pub fn encode_packet(&self, packet: &Packet) -> Result<Vec<u8>, PacketError> {
        self.encode(packet.seq, &packet.payload)
    }

    /// Parse a [`Packet`] from a received frame.
    ///
    /// The header is sign-extended to `i32`; everything after it is payload.
    pub fn decode(&self, buf: &[u8]) -> Result<Packet, PacketError> {
        if buf.len() < self.header_size {
            return Err(PacketError::BufferTooShort {
                len: buf.len(),
                header: self.header_size,
            });
        }
        if buf.len() > self.packet_size {
            return Err(PacketError::Oversized {
                len: buf.len(),
                max: self.packet_size,
            });
        }

        let (header, payload) = buf.split_at(self.header_size);
        let fill = if header[0] & 0x80 != 0 { 0xff } else { 0x00 };
        let mut raw = [fill; HEADER_LEN];
        raw[HEADER_LEN - self.header_size..].copy_from_slice(header);

        Ok(Packet {
            seq: i32::from_be_bytes(raw),
            payload: payload.to_vec(),
        })
    }
}
