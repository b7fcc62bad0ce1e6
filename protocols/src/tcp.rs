//! # TCP Header Codec
//!
//! A hand-written, option-less 20 byte TCP header together with the checksum
//! over the IPv4 pseudo-header. Only what a SYN scan needs: build a SYN, read
//! back whatever arrives, and decide whether it answers one of our probes.

use std::net::Ipv4Addr;

use crate::checksum::{self, PSEUDO_HEADER_LEN};
use crate::{CodecError, ensure_len};

pub const TCP_HDR_LEN: usize = 20;
pub const PROTOCOL_NUMBER: u8 = 6;

/// Data offset in 32-bit words; 5 means no options.
const DATA_OFFSET: u8 = 5;
const DEFAULT_WINDOW: u16 = 65535;

pub mod flags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
    pub const URG: u8 = 0x20;
    pub const SYN_ACK: u8 = SYN | ACK;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence: u32,
    pub acknowledgment: u32,
    /// Header length in 32-bit words (upper nibble of byte 12).
    pub data_offset: u8,
    pub flags: u8,
    pub window: u16,
    pub checksum: u16,
    pub urgent: u16,
}

impl TcpHeader {
    /// A bare SYN with a zero checksum. Call [`TcpHeader::with_checksum`] before sending.
    pub fn syn(source_port: u16, destination_port: u16, sequence: u32) -> Self {
        Self {
            source_port,
            destination_port,
            sequence,
            acknowledgment: 0,
            data_offset: DATA_OFFSET,
            flags: flags::SYN,
            window: DEFAULT_WINDOW,
            checksum: 0,
            urgent: 0,
        }
    }

    pub fn marshal(&self) -> [u8; TCP_HDR_LEN] {
        let mut buf = [0u8; TCP_HDR_LEN];
        buf[0..2].copy_from_slice(&self.source_port.to_be_bytes());
        buf[2..4].copy_from_slice(&self.destination_port.to_be_bytes());
        buf[4..8].copy_from_slice(&self.sequence.to_be_bytes());
        buf[8..12].copy_from_slice(&self.acknowledgment.to_be_bytes());
        buf[12] = self.data_offset << 4;
        buf[13] = self.flags;
        buf[14..16].copy_from_slice(&self.window.to_be_bytes());
        buf[16..18].copy_from_slice(&self.checksum.to_be_bytes());
        buf[18..20].copy_from_slice(&self.urgent.to_be_bytes());
        buf
    }

    /// Reads the fixed part of a TCP header. Options, if any, are ignored.
    pub fn parse(buf: &[u8]) -> Result<Self, CodecError> {
        ensure_len("TCP header", buf, TCP_HDR_LEN)?;
        let u16_at = |i: usize| u16::from_be_bytes([buf[i], buf[i + 1]]);
        let u32_at = |i: usize| u32::from_be_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);

        Ok(Self {
            source_port: u16_at(0),
            destination_port: u16_at(2),
            sequence: u32_at(4),
            acknowledgment: u32_at(8),
            data_offset: buf[12] >> 4,
            flags: buf[13],
            window: u16_at(14),
            checksum: u16_at(16),
            urgent: u16_at(18),
        })
    }

    /// Checksum of this header over the IPv4 pseudo-header, computed as if the
    /// checksum field were zero.
    pub fn compute_checksum(&self, src: Ipv4Addr, dst: Ipv4Addr) -> u16 {
        let mut buf = [0u8; PSEUDO_HEADER_LEN + TCP_HDR_LEN];
        buf[..PSEUDO_HEADER_LEN].copy_from_slice(&checksum::pseudo_header(
            src,
            dst,
            PROTOCOL_NUMBER,
            TCP_HDR_LEN as u16,
        ));

        let zeroed = Self { checksum: 0, ..*self };
        buf[PSEUDO_HEADER_LEN..].copy_from_slice(&zeroed.marshal());
        checksum::internet_checksum(&buf)
    }

    pub fn with_checksum(self, src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Self {
            checksum: self.compute_checksum(src, dst),
            ..self
        }
    }

    pub fn has_flags(&self, mask: u8) -> bool {
        self.flags & mask == mask
    }
}

/// Ready-to-send bytes of a SYN probe from `src:source_port` to `dst:destination_port`.
pub fn build_syn(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    source_port: u16,
    destination_port: u16,
    sequence: u32,
) -> [u8; TCP_HDR_LEN] {
    TcpHeader::syn(source_port, destination_port, sequence)
        .with_checksum(src, dst)
        .marshal()
}

/// What a SYN probe committed to on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynIdentity {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence: u32,
}

impl SynIdentity {
    pub fn new(source_port: u16, destination_port: u16, sequence: u32) -> Self {
        Self {
            source_port,
            destination_port,
            sequence,
        }
    }

    /// True when `reply` is a SYN+ACK to one of our probes.
    ///
    /// The port pair must be the mirror of ours and the acknowledgment must be
    /// exactly the sequence we sent plus one. A segment whose own fields agree
    /// with each other proves nothing about what we sent.
    pub fn matches(&self, reply: &TcpHeader) -> bool {
        reply.source_port == self.destination_port
            && reply.destination_port == self.source_port
            && reply.has_flags(flags::SYN_ACK)
            && !reply.has_flags(flags::RST)
            && reply.acknowledgment == self.sequence.wrapping_add(1)
    }
}
