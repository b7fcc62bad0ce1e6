//! TCP SYN scan of a single port.
//!
//! Every probe of a run uses the same port pair and the same sequence number,
//! so one [`SynIdentity`] describes all of them. A host is reported only when
//! its SYN+ACK acknowledges exactly that sequence number.

use std::net::Ipv4Addr;

use shoal_common::config::{ScanConfig, TcpPorts};
use shoal_protocols::CodecError;
use shoal_protocols::ipv4::{self, IpNextHeaderProtocols};
use shoal_protocols::tcp::{self, SynIdentity, TcpHeader};
use tokio::sync::mpsc;
use tracing::trace;

use super::{IntoTargets, Prober, ScanHandle, Scanner};
use crate::network::transport::{RawTransport, Transport, TransportError, TransportProtocol};

/// Sequence number used for every SYN this process sends.
pub fn initial_sequence() -> u32 {
    std::process::id()
}

pub struct TcpProber {
    local: Ipv4Addr,
    identity: SynIdentity,
}

impl TcpProber {
    pub fn new(local: Ipv4Addr, ports: TcpPorts, sequence: u32) -> Self {
        Self {
            local,
            identity: SynIdentity::new(ports.source, ports.destination, sequence),
        }
    }

    pub fn identity(&self) -> SynIdentity {
        self.identity
    }
}

impl Prober for TcpProber {
    fn build_probe(&self, dst: Ipv4Addr) -> Result<Vec<u8>, CodecError> {
        let SynIdentity {
            source_port,
            destination_port,
            sequence,
        } = self.identity;
        Ok(tcp::build_syn(self.local, dst, source_port, destination_port, sequence).to_vec())
    }

    fn match_reply(&self, datagram: &[u8]) -> Option<Ipv4Addr> {
        let dgram = ipv4::parse(datagram)
            .and_then(|d| d.expect_protocol(IpNextHeaderProtocols::Tcp))
            .inspect_err(|e| trace!("discarding inbound packet: {e}"))
            .ok()?;

        let segment = TcpHeader::parse(dgram.payload)
            .inspect_err(|e| trace!("discarding TCP from {}: {e}", dgram.source))
            .ok()?;
        self.identity.matches(&segment).then_some(dgram.source)
    }
}

/// SYN scanner: one sender, one receiver, one destination port.
pub struct TcpScanner<T = RawTransport> {
    inner: Scanner<TcpProber, T>,
}

impl TcpScanner<RawTransport> {
    /// Opens raw TCP sockets on `config.source_addr`.
    pub fn open(config: ScanConfig, ports: TcpPorts) -> Result<Self, TransportError> {
        let transport =
            RawTransport::open(TransportProtocol::Tcp, config.source_addr, config.read_timeout)?;
        Ok(Self::with_transport(transport, config, ports))
    }
}

impl<T: Transport> TcpScanner<T> {
    pub fn with_transport(transport: T, config: ScanConfig, ports: TcpPorts) -> Self {
        Self::with_sequence(transport, config, ports, initial_sequence())
    }

    pub fn with_sequence(transport: T, config: ScanConfig, ports: TcpPorts, sequence: u32) -> Self {
        let prober = TcpProber::new(config.source_addr, ports, sequence);
        Self {
            inner: Scanner::new(prober, transport, config.with_concurrency(1)),
        }
    }

    pub fn identity(&self) -> SynIdentity {
        self.inner.prober().identity()
    }

    pub fn scan<I: IntoTargets>(&self, input: mpsc::Receiver<I>) -> ScanHandle {
        self.inner.scan(input)
    }
}
