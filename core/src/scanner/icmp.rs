//! ICMP echo sweep.
//!
//! Every sender stamps its requests with the process identifier and the next
//! value of one shared sequence counter. Replies are matched on the
//! identifier only; the replying host is read from the IPv4 source address.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU16, Ordering};

use shoal_common::config::ScanConfig;
use shoal_protocols::icmp::{self, EchoIdentity};
use shoal_protocols::ipv4::{self, IpNextHeaderProtocols};
use shoal_protocols::CodecError;
use tokio::sync::mpsc;
use tracing::trace;

use super::{IntoTargets, Prober, ScanHandle, Scanner};
use crate::network::transport::{RawTransport, Transport, TransportError, TransportProtocol};

pub struct IcmpProber {
    identity: EchoIdentity,
    sequence: AtomicU16,
}

impl IcmpProber {
    pub fn new(identifier: u16) -> Self {
        Self {
            identity: EchoIdentity::new(identifier),
            sequence: AtomicU16::new(0),
        }
    }

    pub fn identity(&self) -> EchoIdentity {
        self.identity
    }

    /// Number of requests built so far, modulo 2^16.
    pub fn sequence(&self) -> u16 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl Prober for IcmpProber {
    fn build_probe(&self, _dst: Ipv4Addr) -> Result<Vec<u8>, CodecError> {
        // fetch_add wraps at 65536.
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        icmp::build_echo_request(self.identity.identifier, seq)
    }

    fn match_reply(&self, datagram: &[u8]) -> Option<Ipv4Addr> {
        let dgram = ipv4::parse(datagram)
            .and_then(|d| d.expect_protocol(IpNextHeaderProtocols::Icmp))
            .inspect_err(|e| trace!("discarding inbound packet: {e}"))
            .ok()?;

        let echo = icmp::parse_echo_reply(dgram.payload)
            .inspect_err(|e| trace!("discarding ICMP from {}: {e}", dgram.source))
            .ok()?;
        if !self.identity.accepts(&echo) {
            trace!("echo reply from {} carries foreign id {}", dgram.source, echo.identifier);
            return None;
        }
        Some(dgram.source)
    }
}

/// Ping sweep over a pool of senders sharing one transport.
pub struct IcmpScanner<T = RawTransport> {
    inner: Scanner<IcmpProber, T>,
}

impl IcmpScanner<RawTransport> {
    /// Opens raw ICMP sockets on `config.source_addr`.
    pub fn open(config: ScanConfig) -> Result<Self, TransportError> {
        let transport =
            RawTransport::open(TransportProtocol::Icmp, config.source_addr, config.read_timeout)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> IcmpScanner<T> {
    pub fn with_transport(transport: T, config: ScanConfig) -> Self {
        Self::with_identifier(transport, config, icmp::process_identifier())
    }

    pub fn with_identifier(transport: T, config: ScanConfig, identifier: u16) -> Self {
        Self {
            inner: Scanner::new(IcmpProber::new(identifier), transport, config),
        }
    }

    pub fn identifier(&self) -> u16 {
        self.inner.prober().identity().identifier
    }

    pub fn scan<I: IntoTargets>(&self, input: mpsc::Receiver<I>) -> ScanHandle {
        self.inner.scan(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_from(src: Ipv4Addr, identifier: u16, sequence: u16) -> Vec<u8> {
        let request = icmp::build_echo_request(identifier, sequence).unwrap();
        let reply = icmp::build_echo_reply(&request).unwrap();
        ipv4::encapsulate(src, Ipv4Addr::new(10, 0, 0, 1), IpNextHeaderProtocols::Icmp, &reply).unwrap()
    }

    #[test]
    fn sequence_advances_per_probe() {
        let prober = IcmpProber::new(7);
        for expected in 0..3u16 {
            let probe = prober.build_probe(Ipv4Addr::LOCALHOST).unwrap();
            assert_eq!(icmp::parse_echo_request(&probe).unwrap().sequence, expected);
        }
        assert_eq!(prober.sequence(), 3);
    }

    #[test]
    fn sequence_wraps() {
        let prober = IcmpProber::new(7);
        prober.sequence.store(u16::MAX, Ordering::Relaxed);
        let last = prober.build_probe(Ipv4Addr::LOCALHOST).unwrap();
        let first = prober.build_probe(Ipv4Addr::LOCALHOST).unwrap();
        assert_eq!(icmp::parse_echo_request(&last).unwrap().sequence, u16::MAX);
        assert_eq!(icmp::parse_echo_request(&first).unwrap().sequence, 0);
    }

    #[test]
    fn matches_own_identifier_only() {
        let prober = IcmpProber::new(0x4242);
        let host = Ipv4Addr::new(198, 51, 100, 7);

        assert_eq!(prober.match_reply(&reply_from(host, 0x4242, 999)), Some(host));
        assert_eq!(prober.match_reply(&reply_from(host, 0x4243, 0)), None);
    }

    #[test]
    fn ignores_requests_and_other_protocols() {
        let prober = IcmpProber::new(1);
        let host = Ipv4Addr::new(198, 51, 100, 7);

        let request = icmp::build_echo_request(1, 0).unwrap();
        let looped = ipv4::encapsulate(host, host, IpNextHeaderProtocols::Icmp, &request).unwrap();
        assert_eq!(prober.match_reply(&looped), None);

        let reply = icmp::build_echo_reply(&request).unwrap();
        let as_tcp = ipv4::encapsulate(host, host, IpNextHeaderProtocols::Tcp, &reply).unwrap();
        assert_eq!(prober.match_reply(&as_tcp), None);

        assert_eq!(prober.match_reply(&[0x45, 0, 0]), None);
    }

    #[test]
    fn scanner_exposes_identifier() {
        struct Null;
        impl Transport for Null {
            fn send_to(&self, packet: &[u8], _dst: Ipv4Addr) -> Result<usize, TransportError> {
                Ok(packet.len())
            }
            fn recv(&self, _buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
                Ok(None)
            }
        }

        let config = ScanConfig::new(Ipv4Addr::LOCALHOST);
        assert_eq!(IcmpScanner::with_identifier(Null, config.clone(), 0xbeef).identifier(), 0xbeef);
        assert_eq!(IcmpScanner::with_transport(Null, config).identifier(), icmp::process_identifier());
    }
}
