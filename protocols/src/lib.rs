//! Wire formats used by the scanners.
//!
//! Everything here is pure: functions take and return byte buffers and report
//! problems as [`CodecError`] values. Nothing logs and nothing touches a socket.

pub mod checksum;
pub mod icmp;
pub mod ipv4;
pub mod tcp;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated {what}: need {needed} bytes, got {actual}")]
    Truncated {
        what: &'static str,
        needed: usize,
        actual: usize,
    },
    #[error("not an IPv4 datagram (version {0})")]
    NotIpv4(u8),
    #[error("unexpected protocol {0}")]
    UnexpectedProtocol(u8),
    #[error("unexpected ICMP type {0}")]
    UnexpectedIcmpType(u8),
}

pub(crate) fn ensure_len(what: &'static str, buf: &[u8], needed: usize) -> Result<(), CodecError> {
    if buf.len() < needed {
        return Err(CodecError::Truncated {
            what,
            needed,
            actual: buf.len(),
        });
    }
    Ok(())
}
