use std::sync::Arc;
use std::time::{Duration, Instant};

use shoal_common::config::default_concurrency;
use shoal_common::success;
use shoal_core::checker::{self, ConnectChecker};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{TargetArgs, targets};
use crate::terminal::{print, spinner};

pub async fn check(
    args: TargetArgs,
    port: u16,
    timeout_ms: u64,
    concurrency: Option<usize>,
) -> anyhow::Result<()> {
    let lines = targets::collect(&args)?;
    let workers = concurrency.unwrap_or_else(default_concurrency).max(1);
    let checker = ConnectChecker::new(port).with_timeout(Duration::from_millis(timeout_ms));
    info!("checking port {port} with {workers} workers");

    let started = Instant::now();
    let (tx, rx) = mpsc::channel(workers * 4);
    let feeder = targets::feed_hosts(lines, tx);
    let mut reachable = checker::spawn_checks(Arc::new(checker), rx, workers, 1024);

    let mut alive: u64 = 0;
    loop {
        tokio::select! {
            next = reachable.recv() => {
                let Some(ip) = next else { break };
                alive += 1;
                success!("{ip} can be accessed");
                spinner::report_progress(alive, "hosts reachable");
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, stopping checks");
                feeder.stop();
                break;
            }
        }
    }

    let total = feeder.finish().await;
    spinner::get_spinner().finish_and_clear();
    print::summary(total, alive, started.elapsed());
    Ok(())
}
