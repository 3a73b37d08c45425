//! Datagram transport abstraction.
//!
//! [`Transport`] is the seam between the protocol state machines and the
//! network: a sender only ever sends whole frames to its one peer and
//! receives whole frames back.  [`UdpTransport`] is the production
//! implementation on top of `tokio::net::UdpSocket`;
//! [`crate::simulator::Simulator`] wraps any transport to inject faults.
//!
//! [`Socket`] is the thin address-aware wrapper both the transport and the
//! reference receiver are built on.  All protocol logic lives elsewhere; this
//! module owns only byte I/O.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;

/// Frame-oriented, peer-bound datagram transport.
///
/// `recv` must be cancel safe: senders race it against a deadline.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Send one frame to the peer.
    async fn send(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Receive the next frame from the peer into `buf`, returning its length.
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<T: Transport> Transport for &mut T {
    async fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        (**self).send(frame).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).recv(buf).await
    }
}

/// An async UDP socket that reports who each datagram came from.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after the OS assigns an
    /// ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing port `0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Send `frame` as a single datagram to `dest`.
    pub async fn send_to(&self, frame: &[u8], dest: SocketAddr) -> io::Result<()> {
        self.inner.send_to(frame, dest).await?;
        Ok(())
    }

    /// Receive the next datagram into `buf`.
    ///
    /// Datagrams longer than `buf` are truncated by the OS; callers size
    /// `buf` one byte past the packet size so truncation is detectable.
    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }
}

/// A [`Socket`] bound to an ephemeral port and paired with one fixed peer.
///
/// The socket is not connected, so an ICMP "port unreachable" from a
/// receiver that is not up yet shows up as loss rather than an error.
/// Datagrams from any other address are dropped.
#[derive(Debug)]
pub struct UdpTransport {
    socket: Socket,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral socket of the peer's address family.
    pub async fn open(peer: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = Socket::bind(local).await?;
        log::debug!("bound {} for peer {peer}", socket.local_addr);
        Ok(Self { socket, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }
}

impl Transport for UdpTransport {
    async fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        self.socket.send_to(frame, self.peer).await
    }

    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let (n, from) = self.socket.recv_from(buf).await?;
            if from == self.peer {
                return Ok(n);
            }
            log::trace!("dropping {n}-byte datagram from stranger {from}");
        }
    }
}
