use std::net::Ipv4Addr;

pub const PSEUDO_HEADER_LEN: usize = 12;

/// One's-complement sum of `data` read as big-endian 16-bit words.
///
/// An odd trailing byte is treated as the high byte of a final word padded
/// with zero. Carries above bit 15 are folded back until none remain.
pub fn ones_complement_sum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        sum += u32::from(*last) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum as u16
}

/// RFC 1071 Internet checksum.
pub fn internet_checksum(data: &[u8]) -> u16 {
    !ones_complement_sum(data)
}

/// The IPv4 pseudo-header that TCP and UDP fold into their checksum.
pub fn pseudo_header(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, length: u16) -> [u8; PSEUDO_HEADER_LEN] {
    let mut buf = [0u8; PSEUDO_HEADER_LEN];
    buf[0..4].copy_from_slice(&src.octets());
    buf[4..8].copy_from_slice(&dst.octets());
    buf[9] = protocol;
    buf[10..12].copy_from_slice(&length.to_be_bytes());
    buf
}
