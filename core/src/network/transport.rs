//! # Raw Transport
//!
//! Owns the raw IPv4 sockets a scanner sends probes on and reads replies from.
//!
//! Sockets are opened at layer 4: the kernel builds the IPv4 header on send,
//! and every read returns a complete IPv4 datagram (header included).
//!
//! For TCP scans the kernel itself answers unexpected SYN+ACKs with RST.
//! That does not affect what this module sees, but it tears down the remote
//! half-open connection; operators who mind drop the resets with a firewall
//! rule on the scan's source port.

use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use thiserror::Error;
use tracing::debug;

use super::filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProtocol {
    Icmp,
    Tcp,
}

impl TransportProtocol {
    fn socket_protocol(self) -> Protocol {
        match self {
            TransportProtocol::Icmp => Protocol::ICMPV4,
            TransportProtocol::Tcp => Protocol::TCP,
        }
    }

    /// Address the receive socket binds to: every local address for ICMP,
    /// only the scan's source address for TCP.
    fn receive_bind(self, local: Ipv4Addr) -> Ipv4Addr {
        match self {
            TransportProtocol::Icmp => Ipv4Addr::UNSPECIFIED,
            TransportProtocol::Tcp => local,
        }
    }
}

impl std::fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportProtocol::Icmp => write!(f, "icmp"),
            TransportProtocol::Tcp => write!(f, "tcp"),
        }
    }
}

/// What a socket is used for. Chosen once, at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Only sends. Inbound traffic is filtered out in the kernel.
    SendOnly,
    RecvOnly,
    Bidirectional,
}

impl Capability {
    fn can_send(self) -> bool {
        matches!(self, Capability::SendOnly | Capability::Bidirectional)
    }

    fn can_recv(self) -> bool {
        matches!(self, Capability::RecvOnly | Capability::Bidirectional)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open raw {protocol} socket (requires root or CAP_NET_RAW): {source}")]
    Open {
        protocol: TransportProtocol,
        source: io::Error,
    },
    #[error("failed to bind raw socket to {addr}: {source}")]
    Bind { addr: Ipv4Addr, source: io::Error },
    #[error("failed to configure raw socket: {0}")]
    Configure(io::Error),
    #[error("failed to send to {dst}: {source}")]
    Send { dst: Ipv4Addr, source: io::Error },
    #[error("failed to read from raw socket: {0}")]
    Recv(io::Error),
    #[error("socket opened as {0:?} does not support this operation")]
    Unsupported(Capability),
}

/// Blocking packet I/O used by the scanners.
///
/// Implementations must be safe to share between one reader and any number
/// of writers; each call moves exactly one packet.
pub trait Transport: Send + Sync + 'static {
    /// Sends one layer 4 packet to `dst`.
    fn send_to(&self, packet: &[u8], dst: Ipv4Addr) -> Result<usize, TransportError>;

    /// Reads one IPv4 datagram into `buf`.
    ///
    /// Returns `Ok(None)` when nothing arrived within the read timeout so the
    /// caller can check whether it should keep waiting.
    fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>, TransportError>;
}

pub struct RawSocket {
    socket: Socket,
    capability: Capability,
}

impl RawSocket {
    pub fn open(
        protocol: TransportProtocol,
        bind_addr: Ipv4Addr,
        capability: Capability,
        read_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(protocol.socket_protocol()))
            .map_err(|source| TransportError::Open { protocol, source })?;

        socket
            .bind(&SockAddr::from(SocketAddrV4::new(bind_addr, 0)))
            .map_err(|source| TransportError::Bind {
                addr: bind_addr,
                source,
            })?;

        if capability == Capability::SendOnly {
            filter::attach_drop_all(&socket).map_err(TransportError::Configure)?;
        }

        if capability.can_recv() {
            // A zero duration would mean "block forever" to the kernel.
            let timeout = read_timeout.max(Duration::from_millis(1));
            socket
                .set_read_timeout(Some(timeout))
                .map_err(TransportError::Configure)?;
        }

        debug!("opened raw {protocol} socket on {bind_addr} ({capability:?})");
        Ok(Self { socket, capability })
    }
}

impl Transport for RawSocket {
    fn send_to(&self, packet: &[u8], dst: Ipv4Addr) -> Result<usize, TransportError> {
        if !self.capability.can_send() {
            return Err(TransportError::Unsupported(self.capability));
        }
        self.socket
            .send_to(packet, &SockAddr::from(SocketAddrV4::new(dst, 0)))
            .map_err(|source| TransportError::Send { dst, source })
    }

    fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
        if !self.capability.can_recv() {
            return Err(TransportError::Unsupported(self.capability));
        }
        match (&self.socket).read(buf) {
            Ok(n) => Ok(Some(n)),
            Err(e) if is_timeout(&e) => Ok(None),
            Err(e) => Err(TransportError::Recv(e)),
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// A send-only socket bound to the source address paired with a receive-only
/// socket, one per protocol.
pub struct RawTransport {
    tx: RawSocket,
    rx: RawSocket,
}

impl RawTransport {
    pub fn open(
        protocol: TransportProtocol,
        local: Ipv4Addr,
        read_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let tx = RawSocket::open(protocol, local, Capability::SendOnly, read_timeout)?;
        let rx = RawSocket::open(
            protocol,
            protocol.receive_bind(local),
            Capability::RecvOnly,
            read_timeout,
        )?;
        Ok(Self { tx, rx })
    }
}

impl Transport for RawTransport {
    fn send_to(&self, packet: &[u8], dst: Ipv4Addr) -> Result<usize, TransportError> {
        self.tx.send_to(packet, dst)
    }

    fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
        self.rx.recv(buf)
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
