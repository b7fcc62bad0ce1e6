//! # Address Range Expansion
//!
//! Turns CIDR notation into the ordered sequence of IPv4 host addresses it covers.
//!
//! Expansion is inclusive: the network and broadcast addresses are part of the
//! output. Callers that want to skip them filter the result themselves.

use std::net::Ipv4Addr;

use pnet::ipnetwork::Ipv4Network;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid address '{0}'")]
    Address(String),
    #[error("invalid prefix length '{0}'")]
    Prefix(String),
}

/// A CIDR block, always stored in its masked (network) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Range {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, RangeError> {
        let block = Ipv4Network::new(addr, prefix)
            .map_err(|_| RangeError::Prefix(prefix.to_string()))?;
        Ok(Self {
            network: block.network(),
            prefix,
        })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn mask(&self) -> u32 {
        match self.prefix {
            0 => 0,
            p => u32::MAX << (32 - u32::from(p)),
        }
    }

    /// Number of addresses in the block, `2^(32 - prefix)`.
    pub fn len(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix))
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & self.mask() == u32::from(self.network)
    }

    /// Lazily walks the block in ascending order.
    pub fn iter(&self) -> HostIter {
        HostIter {
            next: Some(u32::from(self.network)),
            network: u32::from(self.network),
            mask: self.mask(),
        }
    }
}

impl IntoIterator for Ipv4Range {
    type Item = Ipv4Addr;
    type IntoIter = HostIter;

    fn into_iter(self) -> HostIter {
        self.iter()
    }
}

/// Iterator over the addresses of an [`Ipv4Range`].
///
/// Increments the address as a big-endian `u32` and stops as soon as the
/// masked value leaves the network, or the address space is exhausted.
#[derive(Debug, Clone)]
pub struct HostIter {
    next: Option<u32>,
    network: u32,
    mask: u32,
}

impl Iterator for HostIter {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Ipv4Addr> {
        let current = self.next?;
        self.next = current
            .checked_add(1)
            .filter(|candidate| candidate & self.mask == self.network);
        Some(Ipv4Addr::from(current))
    }
}

/// Parses `"a.b.c.d/p"` into a range. A bare address is read as a `/32`.
pub fn parse_cidr(cidr: &str) -> Result<Ipv4Range, RangeError> {
    let cidr = cidr.trim();
    let (addr_str, prefix) = match cidr.split_once('/') {
        Some((addr_str, prefix_str)) => {
            let prefix = prefix_str
                .parse::<u8>()
                .map_err(|_| RangeError::Prefix(prefix_str.to_string()))?;
            (addr_str, prefix)
        }
        None => (cidr, 32),
    };

    let addr = addr_str
        .parse::<Ipv4Addr>()
        .map_err(|_| RangeError::Address(addr_str.to_string()))?;

    Ipv4Range::new(addr, prefix)
}

/// Expands a CIDR string into every address it covers.
///
/// Malformed input is logged and yields an empty list so one bad line never
/// aborts a whole scan.
pub fn expand(cidr: &str) -> Vec<Ipv4Addr> {
    if cidr.trim().is_empty() {
        return Vec::new();
    }

    match parse_cidr(cidr) {
        Ok(range) => range.iter().collect(),
        Err(e) => {
            warn!("failed to parse CIDR {cidr}: {e}");
            Vec::new()
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_slash_30() {
        let ips: Vec<String> = expand("10.0.0.0/30").iter().map(|ip| ip.to_string()).collect();
        assert_eq!(ips, ["10.0.0.0", "10.0.0.1", "10.0.0.2", "10.0.0.3"]);
    }

    #[test]
    fn expand_masks_host_bits() {
        let ips = expand("192.168.1.42/30");
        assert_eq!(ips.first(), Some(&Ipv4Addr::new(192, 168, 1, 40)));
        assert_eq!(ips.last(), Some(&Ipv4Addr::new(192, 168, 1, 43)));
    }

    #[test]
    fn expand_counts_are_powers_of_two() {
        for prefix in 16..=32u8 {
            let ips = expand(&format!("172.16.5.10/{prefix}"));
            assert_eq!(ips.len() as u64, 1u64 << (32 - prefix), "prefix /{prefix}");
            assert!(ips.windows(2).all(|w| u32::from(w[0]) < u32::from(w[1])));
        }
    }

    #[test]
    fn expand_single_host() {
        assert_eq!(expand("203.0.113.7/32"), vec![Ipv4Addr::new(203, 0, 113, 7)]);
        assert_eq!(expand("203.0.113.7"), vec![Ipv4Addr::new(203, 0, 113, 7)]);
    }

    #[test]
    fn iter_stops_at_top_of_address_space() {
        let range = parse_cidr("255.255.255.252/30").unwrap();
        let ips: Vec<Ipv4Addr> = range.iter().collect();
        assert_eq!(ips.len(), 4);
        assert_eq!(ips.last(), Some(&Ipv4Addr::BROADCAST));
    }

    #[test]
    fn slash_zero_is_lazy() {
        let range = parse_cidr("10.20.30.40/0").unwrap();
        assert_eq!(range.len(), 1 << 32);
        let first: Vec<Ipv4Addr> = range.iter().take(2).collect();
        assert_eq!(first, vec![Ipv4Addr::new(0, 0, 0, 0), Ipv4Addr::new(0, 0, 0, 1)]);
    }

    #[test]
    fn iteration_is_restartable() {
        let range = parse_cidr("10.1.2.0/29").unwrap();
        let a: Vec<Ipv4Addr> = range.iter().collect();
        let b: Vec<Ipv4Addr> = range.into_iter().collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|ip| range.contains(*ip)));
        assert!(!range.contains(Ipv4Addr::new(10, 1, 2, 8)));
    }

    #[test]
    fn malformed_input_yields_nothing() {
        assert!(expand("").is_empty());
        assert!(expand("not-an-ip/24").is_empty());
        assert!(expand("10.0.0.0/33").is_empty());
        assert!(expand("10.0.0.0/abc").is_empty());
        assert!(expand("999.1.2.3/24").is_empty());
    }

    #[test]
    fn parse_errors_name_the_bad_part() {
        assert_eq!(parse_cidr("1.2.3/8"), Err(RangeError::Address("1.2.3".into())));
        assert_eq!(parse_cidr("1.2.3.4/40"), Err(RangeError::Prefix("40".into())));
    }
}
