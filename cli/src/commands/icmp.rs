use std::time::Instant;

use anyhow::Context;
use shoal_core::scanner::IcmpScanner;
use shoal_core::system;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{ScanArgs, drain, targets};

pub async fn icmp(scan: ScanArgs, concurrency: Option<usize>) -> anyhow::Result<()> {
    let lines = targets::collect(&scan.targets)?;
    system::ensure_privileged()?;

    let mut config = scan.config()?;
    if let Some(n) = concurrency {
        config = config.with_concurrency(n);
    }
    info!(
        "pinging {} target entries from {} with {} senders",
        lines.len(),
        config.source_addr,
        config.concurrency
    );

    let scanner = IcmpScanner::open(config).context("failed to open ICMP transport")?;
    debug!("echo identifier {:#06x}", scanner.identifier());

    let started = Instant::now();
    let (tx, rx) = mpsc::channel(64);
    let feeder = targets::feed_batches(lines, tx);
    let handle = scanner.scan(rx);

    drain(handle, feeder, started).await
}
