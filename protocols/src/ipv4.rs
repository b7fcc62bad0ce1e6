use std::net::Ipv4Addr;

use pnet::packet::ipv4::{self, Ipv4Packet, MutableIpv4Packet};

pub use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};

use crate::{CodecError, ensure_len};

pub const IPV4_HDR_LEN: usize = 20;
const DEFAULT_TTL: u8 = 64;

/// A received IPv4 datagram, borrowed from the receive buffer.
#[derive(Debug, Clone, Copy)]
pub struct Datagram<'a> {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub protocol: IpNextHeaderProtocol,
    pub payload: &'a [u8],
}

impl Datagram<'_> {
    /// Fails unless the payload belongs to `protocol`.
    pub fn expect_protocol(self, protocol: IpNextHeaderProtocol) -> Result<Self, CodecError> {
        if self.protocol != protocol {
            return Err(CodecError::UnexpectedProtocol(self.protocol.0));
        }
        Ok(self)
    }
}

/// Splits a raw IPv4 datagram, as raw sockets deliver it, into header facts and payload.
///
/// The payload ends at the header's total length when that is consistent with
/// the buffer, and at the end of the buffer otherwise.
pub fn parse(buf: &[u8]) -> Result<Datagram<'_>, CodecError> {
    let pkt = Ipv4Packet::new(buf).ok_or(CodecError::Truncated {
        what: "IPv4 header",
        needed: IPV4_HDR_LEN,
        actual: buf.len(),
    })?;

    if pkt.get_version() != 4 {
        return Err(CodecError::NotIpv4(pkt.get_version()));
    }

    let header_len = usize::from(pkt.get_header_length()) * 4;
    ensure_len("IPv4 header", buf, header_len.max(IPV4_HDR_LEN))?;

    let total_len = usize::from(pkt.get_total_length());
    let end = if (header_len..=buf.len()).contains(&total_len) {
        total_len
    } else {
        buf.len()
    };

    Ok(Datagram {
        source: pkt.get_source(),
        destination: pkt.get_destination(),
        protocol: pkt.get_next_level_protocol(),
        payload: &buf[header_len.max(IPV4_HDR_LEN)..end],
    })
}

/// Wraps `payload` in a minimal IPv4 header with a valid header checksum.
pub fn encapsulate(
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
    protocol: IpNextHeaderProtocol,
    payload: &[u8],
) -> Result<Vec<u8>, CodecError> {
    let total_len = IPV4_HDR_LEN + payload.len();
    let mut buf = vec![0u8; total_len];
    {
        let mut pkt = MutableIpv4Packet::new(&mut buf).ok_or(CodecError::Truncated {
            what: "IPv4 buffer",
            needed: IPV4_HDR_LEN,
            actual: total_len,
        })?;

        pkt.set_version(4);
        pkt.set_header_length(5); // 5 x 32 bits, no options
        pkt.set_total_length(total_len as u16);
        pkt.set_flags(2); // don't fragment
        pkt.set_ttl(DEFAULT_TTL);
        pkt.set_next_level_protocol(protocol);
        pkt.set_source(src_addr);
        pkt.set_destination(dst_addr);
        pkt.set_payload(payload);

        let csum = ipv4::checksum(&pkt.to_immutable());
        pkt.set_checksum(csum);
    }

    Ok(buf)
}
