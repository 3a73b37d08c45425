//! Reference receiver.
//!
//! The sender is designed against a receiver it does not own; this module
//! implements the receiving half of the wire contract so the senders can be
//! exercised end to end (integration tests, `rdt-sender receive`).
//!
//! - Only **in-order** segments are accepted (`seq == expected`).
//!   Out-of-order and duplicate segments are discarded without buffering.
//! - Every data frame, accepted or not, is answered with a cumulative ack
//!   `[expected]"ack"`.
//! - An empty frame with `seq == expected` is a termination probe and is
//!   answered with `[expected]"fin"`.  After that, a `==FINACK==` frame
//!   closes the session.
//! - A `[-1]"==FINACK"` frame closes the session at any time.
//!
//! [`Receiver`] only manages state; [`serve`] owns the socket loop.

use std::io;
use std::net::SocketAddr;

use crate::packet::{
    FrameCodec, Packet, ACK_MARKER, CLOSE_MARKER, CLOSE_SEQ, FINACK_MARKER, FIN_MARKER,
};
use crate::socket::Socket;
use crate::state::ReceiverState;

/// Receive-side state for one session.
#[derive(Debug, Default)]
pub struct Receiver {
    state: ReceiverState,
    /// Next expected byte offset; the cumulative ack value.
    expected: i32,
    data: Vec<u8>,
}

impl Receiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ReceiverState::Closed
    }

    /// Cumulative ack value: every byte before this offset has arrived.
    pub fn ack_number(&self) -> i32 {
        self.expected
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Process one inbound frame and return the reply to send, if any.
    pub fn on_packet(&mut self, packet: &Packet) -> Option<Packet> {
        if self.is_closed() {
            return None;
        }

        if packet.seq == CLOSE_SEQ {
            if packet.carries(CLOSE_MARKER) {
                log::debug!("[rx] ← CLOSE; {} bytes received", self.data.len());
                self.state = ReceiverState::Closed;
            }
            return None;
        }
        if self.state == ReceiverState::FinSent && packet.carries(FINACK_MARKER) {
            log::debug!("[rx] ← FINACK; {} bytes received", self.data.len());
            self.state = ReceiverState::Closed;
            return None;
        }

        if packet.payload.is_empty() {
            if packet.seq == self.expected {
                self.state = ReceiverState::FinSent;
                log::debug!("[rx] ← PROBE seq={}; → FIN", packet.seq);
                return Some(Packet::new(self.expected, FIN_MARKER.to_vec()));
            }
            return Some(self.ack());
        }

        let accepted = self.state == ReceiverState::Receiving && packet.seq == self.expected;
        if accepted {
            // A frame that would overflow the offset space is dropped.
            if let Some(next) = i32::try_from(packet.payload.len())
                .ok()
                .and_then(|len| self.expected.checked_add(len))
            {
                self.data.extend_from_slice(&packet.payload);
                self.expected = next;
            }
        }
        log::trace!(
            "[rx] ← DATA seq={} len={} accepted={accepted}; → ACK ack={}",
            packet.seq,
            packet.payload.len(),
            self.expected
        );
        Some(self.ack())
    }

    fn ack(&self) -> Packet {
        Packet::new(self.expected, ACK_MARKER.to_vec())
    }
}

/// Receive one session on `socket` and return the reassembled stream.
///
/// The first address to send a frame becomes the peer; frames from anyone
/// else are ignored.  Malformed frames are discarded.
pub async fn serve(socket: &Socket, codec: FrameCodec) -> io::Result<Vec<u8>> {
    let mut receiver = Receiver::new();
    let mut peer: Option<SocketAddr> = None;
    let mut buf = vec![0u8; codec.packet_size() + 1];

    while !receiver.is_closed() {
        let (n, from) = socket.recv_from(&mut buf).await?;
        match peer {
            Some(p) if p != from => {
                log::trace!("[rx] ignoring datagram from {from}");
                continue;
            }
            None => {
                log::debug!("[rx] session from {from}");
                peer = Some(from);
            }
            Some(_) => {}
        }

        let packet = match codec.decode(&buf[..n]) {
            Ok(packet) => packet,
            Err(e) => {
                log::debug!("[rx] discarding malformed frame: {e}");
                continue;
            }
        };

        if let Some(reply) = receiver.on_packet(&packet) {
            let frame = codec
                .encode_packet(&reply)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            socket.send_to(&frame, from).await?;
        }
    }
    Ok(receiver.into_data())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(seq: i32, payload: &[u8]) -> Packet {
        Packet::new(seq, payload.to_vec())
    }

    #[test]
    fn initial_state() {
        let r = Receiver::new();
        assert_eq!(r.ack_number(), 0);
        assert_eq!(r.state(), ReceiverState::Receiving);
        assert!(r.data().is_empty());
    }

    #[test]
    fn in_order_segment_accepted() {
        let mut r = Receiver::new();
        let reply = r.on_packet(&data(0, b"hello")).unwrap();
        assert_eq!(reply, Packet::new(5, ACK_MARKER.to_vec()));
        assert_eq!(r.data(), b"hello");
    }

    #[test]
    fn out_of_order_segment_discarded() {
        let mut r = Receiver::new();
        let reply = r.on_packet(&data(10, b"future")).unwrap();
        assert_eq!(reply.seq, 0);
        assert!(r.data().is_empty());
    }

    #[test]
    fn duplicate_segment_discarded() {
        let mut r = Receiver::new();
        r.on_packet(&data(0, b"hello"));
        let reply = r.on_packet(&data(0, b"hello")).unwrap();
        assert_eq!(reply.seq, 5);
        assert_eq!(r.data(), b"hello");
    }

    #[test]
    fn three_way_close() {
        let mut r = Receiver::new();
        r.on_packet(&data(0, b"abc"));

        // Probe at the wrong offset is just re-acked.
        assert_eq!(r.on_packet(&Packet::empty(1)).unwrap().seq, 3);
        assert_eq!(r.state(), ReceiverState::Receiving);

        let fin = r.on_packet(&Packet::empty(3)).unwrap();
        assert!(fin.carries(FIN_MARKER));
        assert_eq!(r.state(), ReceiverState::FinSent);

        // A repeated probe gets another fin.
        assert!(r.on_packet(&Packet::empty(3)).unwrap().carries(FIN_MARKER));

        assert!(r.on_packet(&data(3, FINACK_MARKER)).is_none());
        assert!(r.is_closed());
        assert_eq!(r.into_data(), b"abc");
    }

    #[test]
    fn finack_payload_before_fin_is_data() {
        let mut r = Receiver::new();
        r.on_packet(&data(0, FINACK_MARKER));
        assert!(!r.is_closed());
        assert_eq!(r.data(), FINACK_MARKER);
    }

    #[test]
    fn single_shot_close() {
        let mut r = Receiver::new();
        r.on_packet(&data(0, b"xy"));
        assert!(r.on_packet(&data(CLOSE_SEQ, b"junk")).is_none());
        assert!(!r.is_closed());
        assert!(r.on_packet(&data(CLOSE_SEQ, CLOSE_MARKER)).is_none());
        assert!(r.is_closed());
        assert!(r.on_packet(&data(2, b"late")).is_none());
    }

    #[tokio::test]
    async fn serve_replies_and_returns_stream() {
        let codec = FrameCodec::default();
        let server = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = server.local_addr;
        let task = tokio::spawn(async move { serve(&server, codec).await });

        let client = Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let mut buf = [0u8; 1025];

        client.send_to(&[0x01], addr).await.unwrap(); // malformed, ignored
        client.send_to(&codec.encode(0, b"hi").unwrap(), addr).await.unwrap();
        let (n, _) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(codec.decode(&buf[..n]).unwrap().seq, 2);

        client
            .send_to(&codec.encode(CLOSE_SEQ, CLOSE_MARKER).unwrap(), addr)
            .await
            .unwrap();
        let received = task.await.unwrap().unwrap();
        assert_eq!(received, b"hi");
    }
}
