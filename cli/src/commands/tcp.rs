use std::time::Instant;

use anyhow::Context;
use shoal_common::config::TcpPorts;
use shoal_core::scanner::TcpScanner;
use shoal_core::system;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{ScanArgs, drain, targets};

pub async fn tcp(scan: ScanArgs, sport: u16, dport: u16) -> anyhow::Result<()> {
    let lines = targets::collect(&scan.targets)?;
    system::ensure_privileged()?;

    let config = scan.config()?;
    let ports = TcpPorts {
        source: sport,
        destination: dport,
    };
    info!(
        "sending SYN to port {dport} of {} target entries from {}:{sport}",
        lines.len(),
        config.source_addr
    );

    let scanner = TcpScanner::open(config, ports).context("failed to open TCP transport")?;
    debug!("SYN sequence {}", scanner.identity().sequence);

    let started = Instant::now();
    let (tx, rx) = mpsc::channel(1024);
    let feeder = targets::feed_hosts(lines, tx);
    let handle = scanner.scan(rx);

    drain(handle, feeder, started).await
}
