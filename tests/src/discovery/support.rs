//! In-process stand-ins for the network.
//!
//! Each responder implements `Transport`: probes handed to `send_to` are
//! answered by queueing the IPv4 datagram a real host would send back, and
//! `recv` pops from that queue with a short timeout like a raw socket would.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use shoal_core::network::transport::{Transport, TransportError};
use shoal_protocols::icmp;
use shoal_protocols::ipv4::{self, IpNextHeaderProtocols};
use shoal_protocols::tcp::{TcpHeader, flags};

pub const LOCAL: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const READ_TIMEOUT: Duration = Duration::from_millis(20);

struct Wire {
    tx: Sender<Vec<u8>>,
    rx: Mutex<Receiver<Vec<u8>>>,
}

impl Wire {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    fn deliver(&self, datagram: Vec<u8>) {
        let _ = self.tx.send(datagram);
    }

    fn read(&self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
        let next = self.rx.lock().unwrap().recv_timeout(READ_TIMEOUT);
        match next {
            Ok(datagram) => {
                buf[..datagram.len()].copy_from_slice(&datagram);
                Ok(Some(datagram.len()))
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}

/// Answers echo requests sent to any of its `alive` hosts.
pub struct EchoResponder {
    alive: HashSet<Ipv4Addr>,
    /// Added to the identifier of every reply, to look like another prober.
    id_offset: u16,
    wire: Wire,
}

impl EchoResponder {
    pub fn new(alive: &[Ipv4Addr]) -> Self {
        Self {
            alive: alive.iter().copied().collect(),
            id_offset: 0,
            wire: Wire::new(),
        }
    }

    pub fn with_foreign_identifier(mut self) -> Self {
        self.id_offset = 1;
        self
    }
}

impl Transport for EchoResponder {
    fn send_to(&self, packet: &[u8], dst: Ipv4Addr) -> Result<usize, TransportError> {
        if self.alive.contains(&dst) {
            let request = icmp::parse_echo_request(packet).unwrap();
            let echoed = icmp::build_echo_request(
                request.identifier.wrapping_add(self.id_offset),
                request.sequence,
            )
            .unwrap();
            let reply = icmp::build_echo_reply(&echoed).unwrap();
            self.wire
                .deliver(ipv4::encapsulate(dst, LOCAL, IpNextHeaderProtocols::Icmp, &reply).unwrap());
        }
        Ok(packet.len())
    }

    fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
        self.wire.read(buf)
    }
}

/// How a simulated host answers a SYN.
#[derive(Clone, Copy)]
pub enum SynBehavior {
    /// SYN+ACK acknowledging the probe's sequence number.
    Open,
    /// SYN+ACK with mirrored ports but an ack that does not match.
    Spoofed,
    /// RST+ACK, as a closed port would.
    Closed,
}

pub struct SynResponder {
    hosts: Vec<(Ipv4Addr, SynBehavior)>,
    wire: Wire,
}

impl SynResponder {
    pub fn new(hosts: &[(Ipv4Addr, SynBehavior)]) -> Self {
        Self {
            hosts: hosts.to_vec(),
            wire: Wire::new(),
        }
    }
}

impl Transport for SynResponder {
    fn send_to(&self, packet: &[u8], dst: Ipv4Addr) -> Result<usize, TransportError> {
        let syn = TcpHeader::parse(packet).unwrap();
        let behavior = self.hosts.iter().find(|(ip, _)| *ip == dst).map(|(_, b)| *b);

        let (ack, reply_flags) = match behavior {
            None => return Ok(packet.len()),
            Some(SynBehavior::Open) => (syn.sequence.wrapping_add(1), flags::SYN_ACK),
            Some(SynBehavior::Spoofed) => (syn.sequence.wrapping_add(7), flags::SYN_ACK),
            Some(SynBehavior::Closed) => (syn.sequence.wrapping_add(1), flags::RST | flags::ACK),
        };

        let reply = TcpHeader {
            source_port: syn.destination_port,
            destination_port: syn.source_port,
            sequence: 0x1000,
            acknowledgment: ack,
            data_offset: 5,
            flags: reply_flags,
            window: 65535,
            checksum: 0,
            urgent: 0,
        }
        .with_checksum(dst, LOCAL)
        .marshal();

        self.wire
            .deliver(ipv4::encapsulate(dst, LOCAL, IpNextHeaderProtocols::Tcp, &reply).unwrap());
        Ok(packet.len())
    }

    fn recv(&self, buf: &mut [u8]) -> Result<Option<usize>, TransportError> {
        self.wire.read(buf)
    }
}
