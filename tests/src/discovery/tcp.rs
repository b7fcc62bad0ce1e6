use std::net::Ipv4Addr;
use std::time::Duration;

use shoal_common::config::{ScanConfig, TcpPorts};
use shoal_core::scanner::TcpScanner;
use tokio::sync::mpsc;

use super::support::{LOCAL, SynBehavior, SynResponder};

const OPEN: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 1);
const SPOOFED: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 2);
const CLOSED: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 3);
const SILENT: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 4);

fn scanner(sequence: u32) -> TcpScanner<SynResponder> {
    let responder = SynResponder::new(&[
        (OPEN, SynBehavior::Open),
        (SPOOFED, SynBehavior::Spoofed),
        (CLOSED, SynBehavior::Closed),
    ]);
    let config = ScanConfig::new(LOCAL).with_grace_period(Duration::from_millis(300));
    TcpScanner::with_sequence(responder, config, TcpPorts::default(), sequence)
}

async fn run(scanner: TcpScanner<SynResponder>) -> Vec<Ipv4Addr> {
    let (tx, rx) = mpsc::channel(8);
    let handle = scanner.scan(rx);
    for host in [OPEN, SPOOFED, CLOSED, SILENT] {
        tx.send(host).await.unwrap();
    }
    drop(tx);

    let (found, report) = handle.collect().await.unwrap();
    assert_eq!(report.sent, 4);
    found
}

/// Only the SYN+ACK that acknowledges our own sequence number counts.
#[tokio::test]
async fn only_bound_ack_is_alive() {
    assert_eq!(run(scanner(40_000)).await, vec![OPEN]);
}

#[tokio::test]
async fn ack_wraps_at_max_sequence() {
    assert_eq!(run(scanner(u32::MAX)).await, vec![OPEN]);
}
