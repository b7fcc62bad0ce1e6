use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use shoal_common::config::ScanConfig;
use shoal_common::network::range;
use shoal_core::scanner::IcmpScanner;
use tokio::sync::mpsc;

use super::support::{EchoResponder, LOCAL};

const GRACE: Duration = Duration::from_millis(300);
const SLACK: Duration = Duration::from_secs(2);

fn config() -> ScanConfig {
    ScanConfig::new(LOCAL)
        .with_concurrency(4)
        .with_grace_period(GRACE)
        .with_queue_capacity(256)
}

/// A single address string on the queue yields exactly that host, and the
/// output closes shortly after the input does.
#[tokio::test]
async fn single_loopback_string() {
    let scanner = IcmpScanner::with_transport(EchoResponder::new(&[Ipv4Addr::LOCALHOST]), config());
    let (tx, rx) = mpsc::channel(4);
    let mut handle = scanner.scan(rx);

    tx.send(vec!["127.0.0.1".to_string()]).await.unwrap();
    drop(tx);
    let closed_input = Instant::now();

    let mut found = Vec::new();
    while let Some(ip) = handle.next().await {
        found.push(ip);
    }
    assert_eq!(found, vec![Ipv4Addr::LOCALHOST]);
    assert!(closed_input.elapsed() < GRACE + SLACK);

    let report = handle.finish().await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.replies, 1);
}

#[tokio::test]
async fn empty_input_yields_nothing_after_grace() {
    let scanner = IcmpScanner::with_transport(EchoResponder::new(&[]), config());
    let (tx, rx) = mpsc::channel::<Vec<Ipv4Addr>>(1);
    drop(tx);

    let started = Instant::now();
    let (found, report) = scanner.scan(rx).collect().await.unwrap();
    assert!(found.is_empty());
    assert_eq!(report.sent, 0);
    assert!(started.elapsed() >= GRACE);
    assert!(started.elapsed() < GRACE + SLACK);
}

#[tokio::test]
async fn sweeps_a_block() {
    let alive = [Ipv4Addr::new(192, 0, 2, 2), Ipv4Addr::new(192, 0, 2, 5)];
    let scanner = IcmpScanner::with_transport(EchoResponder::new(&alive), config());
    let (tx, rx) = mpsc::channel(4);
    let handle = scanner.scan(rx);

    tx.send(range::expand("192.0.2.0/29")).await.unwrap();
    drop(tx);

    let (mut found, report) = handle.collect().await.unwrap();
    found.sort();
    assert_eq!(found, alive.to_vec());
    assert_eq!(report.sent, 8);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn foreign_identifier_is_ignored() {
    let responder = EchoResponder::new(&[Ipv4Addr::LOCALHOST]).with_foreign_identifier();
    let scanner = IcmpScanner::with_transport(responder, config());
    let (tx, rx) = mpsc::channel(1);
    let handle = scanner.scan(rx);

    tx.send(Ipv4Addr::LOCALHOST).await.unwrap();
    drop(tx);

    let (found, report) = handle.collect().await.unwrap();
    assert!(found.is_empty());
    assert_eq!(report.sent, 1);
    assert_eq!(report.replies, 0);
}

#[tokio::test]
async fn malformed_strings_are_skipped() {
    let scanner = IcmpScanner::with_transport(EchoResponder::new(&[Ipv4Addr::LOCALHOST]), config());
    let (tx, rx) = mpsc::channel(4);
    let handle = scanner.scan(rx);

    tx.send("not-an-ip".to_string()).await.unwrap();
    tx.send("127.0.0.1".to_string()).await.unwrap();
    drop(tx);

    let (found, report) = handle.collect().await.unwrap();
    assert_eq!(found, vec![Ipv4Addr::LOCALHOST]);
    assert_eq!(report.sent, 1);
}

/// A CIDR string item is expanded by the sender that takes it.
#[tokio::test]
async fn cidr_string_covers_block() {
    let scanner = IcmpScanner::with_transport(EchoResponder::new(&[Ipv4Addr::LOCALHOST]), config());
    let (tx, rx) = mpsc::channel(4);
    let handle = scanner.scan(rx);

    tx.send("127.0.0.0/30".to_string()).await.unwrap();
    drop(tx);

    let (found, report) = handle.collect().await.unwrap();
    assert_eq!(found, vec![Ipv4Addr::LOCALHOST]);
    assert_eq!(report.sent, 4);
}

/// Needs root: pings loopback through real raw sockets.
#[tokio::test]
#[ignore]
async fn raw_socket_loopback() {
    let config = ScanConfig::new(Ipv4Addr::LOCALHOST).with_grace_period(Duration::from_secs(1));
    let scanner = IcmpScanner::open(config).unwrap();
    let (tx, rx) = mpsc::channel(1);
    let handle = scanner.scan(rx);

    tx.send(Ipv4Addr::LOCALHOST).await.unwrap();
    drop(tx);

    let (found, _) = handle.collect().await.unwrap();
    assert!(found.contains(&Ipv4Addr::LOCALHOST));
}
