//! ICMP echo request / echo reply.
//!
//! Requests are marked with the process identifier so replies to other
//! programs' pings (which share the same raw receive socket) can be told apart.

use pnet::packet::Packet;
use pnet::packet::icmp::echo_reply::{EchoReplyPacket, MutableEchoReplyPacket};
use pnet::packet::icmp::echo_request::{EchoRequestPacket, MutableEchoRequestPacket};
use pnet::packet::icmp::{self, IcmpCode, IcmpPacket, IcmpTypes};

use crate::{CodecError, ensure_len};

pub const ECHO_HDR_LEN: usize = 8;

/// Fixed marker carried in every echo request.
pub const ECHO_PAYLOAD: &[u8] = b"Hello, are you there!";

/// Low 16 bits of the process id.
pub fn process_identifier() -> u16 {
    (std::process::id() & 0xffff) as u16
}

/// The part of an echo we correlate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Echo {
    pub identifier: u16,
    pub sequence: u16,
}

/// Accepts echo replies carrying our identifier, regardless of sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoIdentity {
    pub identifier: u16,
}

impl EchoIdentity {
    pub fn new(identifier: u16) -> Self {
        Self { identifier }
    }

    pub fn accepts(&self, reply: &Echo) -> bool {
        reply.identifier == self.identifier
    }
}

pub fn build_echo_request(identifier: u16, sequence: u16) -> Result<Vec<u8>, CodecError> {
    let mut buf = vec![0u8; ECHO_HDR_LEN + ECHO_PAYLOAD.len()];
    let len = buf.len();
    {
        let mut echo = MutableEchoRequestPacket::new(&mut buf).ok_or(CodecError::Truncated {
            what: "echo request buffer",
            needed: ECHO_HDR_LEN,
            actual: len,
        })?;

        echo.set_icmp_type(IcmpTypes::EchoRequest);
        echo.set_icmp_code(IcmpCode(0));
        echo.set_identifier(identifier);
        echo.set_sequence_number(sequence);
        echo.set_payload(ECHO_PAYLOAD);
        echo.set_checksum(0);

        let csum = checksum_of(echo.to_immutable().packet())?;
        echo.set_checksum(csum);
    }
    Ok(buf)
}

/// Builds the reply a well-behaved host would send for `request`.
pub fn build_echo_reply(request: &[u8]) -> Result<Vec<u8>, CodecError> {
    let req = parse_echo_request(request)?;
    let payload = EchoRequestPacket::new(request)
        .map(|pkt| pkt.payload().to_vec())
        .unwrap_or_default();

    let mut buf = vec![0u8; ECHO_HDR_LEN + payload.len()];
    let len = buf.len();
    {
        let mut echo = MutableEchoReplyPacket::new(&mut buf).ok_or(CodecError::Truncated {
            what: "echo reply buffer",
            needed: ECHO_HDR_LEN,
            actual: len,
        })?;

        echo.set_icmp_type(IcmpTypes::EchoReply);
        echo.set_icmp_code(IcmpCode(0));
        echo.set_identifier(req.identifier);
        echo.set_sequence_number(req.sequence);
        echo.set_payload(&payload);
        echo.set_checksum(0);

        let csum = checksum_of(echo.to_immutable().packet())?;
        echo.set_checksum(csum);
    }
    Ok(buf)
}

pub fn parse_echo_request(buf: &[u8]) -> Result<Echo, CodecError> {
    ensure_len("echo request", buf, ECHO_HDR_LEN)?;
    let pkt = EchoRequestPacket::new(buf).ok_or(CodecError::Truncated {
        what: "echo request",
        needed: ECHO_HDR_LEN,
        actual: buf.len(),
    })?;
    if pkt.get_icmp_type() != IcmpTypes::EchoRequest {
        return Err(CodecError::UnexpectedIcmpType(pkt.get_icmp_type().0));
    }
    Ok(Echo {
        identifier: pkt.get_identifier(),
        sequence: pkt.get_sequence_number(),
    })
}

/// Decodes an ICMP message that must be an echo reply.
pub fn parse_echo_reply(buf: &[u8]) -> Result<Echo, CodecError> {
    ensure_len("echo reply", buf, ECHO_HDR_LEN)?;
    let pkt = EchoReplyPacket::new(buf).ok_or(CodecError::Truncated {
        what: "echo reply",
        needed: ECHO_HDR_LEN,
        actual: buf.len(),
    })?;
    if pkt.get_icmp_type() != IcmpTypes::EchoReply {
        return Err(CodecError::UnexpectedIcmpType(pkt.get_icmp_type().0));
    }
    Ok(Echo {
        identifier: pkt.get_identifier(),
        sequence: pkt.get_sequence_number(),
    })
}

fn checksum_of(bytes: &[u8]) -> Result<u16, CodecError> {
    let pkt = IcmpPacket::new(bytes).ok_or(CodecError::Truncated {
        what: "ICMP message",
        needed: 4,
        actual: bytes.len(),
    })?;
    Ok(icmp::checksum(&pkt))
}
