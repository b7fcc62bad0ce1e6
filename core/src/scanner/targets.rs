use std::iter::{FlatMap, Flatten, Once};
use std::net::Ipv4Addr;
use std::{option, vec};

use shoal_common::network::range::{self, HostIter};
use tracing::warn;

/// An item of a scanner's input queue: one address, or a batch of them.
///
/// String items are CIDR blocks (a bare address counts as a `/32`), parsed by
/// the sender that picks them up; anything unparsable is logged and skipped.
pub trait IntoTargets: Send + 'static {
    type Iter: Iterator<Item = Ipv4Addr>;

    fn into_targets(self) -> Self::Iter;
}

/// Every address of one target string, or nothing when it does not parse.
pub type Resolved = Flatten<option::IntoIter<HostIter>>;

impl IntoTargets for Ipv4Addr {
    type Iter = Once<Ipv4Addr>;

    fn into_targets(self) -> Self::Iter {
        std::iter::once(self)
    }
}

impl IntoTargets for Vec<Ipv4Addr> {
    type Iter = vec::IntoIter<Ipv4Addr>;

    fn into_targets(self) -> Self::Iter {
        self.into_iter()
    }
}

impl IntoTargets for String {
    type Iter = Resolved;

    fn into_targets(self) -> Self::Iter {
        resolve(self)
    }
}

impl IntoTargets for Vec<String> {
    type Iter = FlatMap<vec::IntoIter<String>, Resolved, fn(String) -> Resolved>;

    fn into_targets(self) -> Self::Iter {
        self.into_iter().flat_map(resolve as fn(String) -> Resolved)
    }
}

fn resolve(target: String) -> Resolved {
    range::parse_cidr(&target)
        .inspect_err(|e| warn!("skipping target {target}: {e}"))
        .ok()
        .map(|block| block.iter())
        .into_iter()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_skip_garbage() {
        let batch = vec!["10.0.0.1".to_string(), "nope".to_string(), " 10.0.0.2 ".to_string()];
        let ips: Vec<Ipv4Addr> = batch.into_targets().collect();
        assert_eq!(ips, vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]);
        assert_eq!("300.1.1.1".to_string().into_targets().count(), 0);
    }

    #[test]
    fn strings_expand_blocks() {
        let ips: Vec<Ipv4Addr> = "10.0.0.4/31".to_string().into_targets().collect();
        assert_eq!(ips, vec![Ipv4Addr::new(10, 0, 0, 4), Ipv4Addr::new(10, 0, 0, 5)]);

        let batch = vec!["10.0.0.0/30".to_string(), "10.9.9.9".to_string(), "10.0.0.0/33".to_string()];
        assert_eq!(batch.into_targets().count(), 5);
    }

    #[test]
    fn single_address_is_one_target() {
        let ips: Vec<Ipv4Addr> = Ipv4Addr::LOCALHOST.into_targets().collect();
        assert_eq!(ips, vec![Ipv4Addr::LOCALHOST]);
    }
}
