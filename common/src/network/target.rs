//! # Scan Target Lines
//!
//! Target lists are plain text. Each line either holds an address or CIDR block
//! directly, or is a result line from an earlier run such as
//! `[+] 1.27.222.121 is alive`, in which case the first token that looks like
//! a target is used.

use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::network::range::{self, Ipv4Range, RangeError};

/// A single entry of a target list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// One specific host.
    Host(Ipv4Addr),
    /// A CIDR block (e.g., `192.168.1.0/24`).
    Block(Ipv4Range),
}

impl FromStr for Target {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.contains('/') {
            return s
                .parse::<Ipv4Addr>()
                .map(Target::Host)
                .map_err(|_| RangeError::Address(s.to_string()));
        }
        range::parse_cidr(s).map(Target::Block)
    }
}

impl Target {
    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        match self {
            Target::Host(addr) => vec![*addr],
            Target::Block(block) => block.iter().collect(),
        }
    }
}

/// Returns the first whitespace-separated token of `line` that parses as a target.
///
/// Blank lines and `#` comments yield `None`.
pub fn extract_target(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    line.split_whitespace()
        .find(|token| Target::from_str(token).is_ok())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
