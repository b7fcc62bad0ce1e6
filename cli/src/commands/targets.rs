use std::fs;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, ensure};
use shoal_common::network::range;
use shoal_common::network::target::extract_target;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::TargetArgs;

/// Addresses per queue item on batched scans.
pub const BATCH_SIZE: usize = 4096;

/// Collects target strings from the command line and the target file.
pub fn collect(args: &TargetArgs) -> anyhow::Result<Vec<String>> {
    let mut lines = args.targets.clone();

    if let Some(path) = &args.file {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read target file {}", path.display()))?;
        lines.extend(content.lines().map(str::to_owned));
    }

    let targets = targets_from_lines(&lines);
    ensure!(!targets.is_empty(), "no targets given");
    debug!("{} target entries", targets.len());
    Ok(targets)
}

fn targets_from_lines(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| {
            let target = extract_target(line);
            if target.is_none() && !line.trim().is_empty() && !line.trim().starts_with('#') {
                warn!("no target found in {line:?}");
            }
            target.map(str::to_owned)
        })
        .collect()
}

/// A running target feeder. Counts the addresses it managed to queue.
pub struct Feeder {
    task: JoinHandle<()>,
    fed: Arc<AtomicU64>,
}

impl Feeder {
    fn spawn<F, Fut>(feed: F) -> Self
    where
        F: FnOnce(Arc<AtomicU64>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let fed = Arc::new(AtomicU64::new(0));
        Self {
            task: tokio::spawn(feed(fed.clone())),
            fed,
        }
    }

    /// Addresses queued so far.
    pub fn fed(&self) -> u64 {
        self.fed.load(Ordering::Relaxed)
    }

    /// Stops feeding; the count stays readable.
    pub fn stop(&self) {
        self.task.abort();
    }

    /// Waits for the feeder to end, whether drained, stopped or cut off by
    /// a closed queue, and returns how many addresses it queued.
    pub async fn finish(mut self) -> u64 {
        match (&mut self.task).await {
            Err(e) if !e.is_cancelled() => warn!("target feeder failed: {e}"),
            _ => {}
        }
        self.fed()
    }
}

/// Feeds every address of `targets` to `queue`, grouped into batches.
pub fn feed_batches(targets: Vec<String>, queue: mpsc::Sender<Vec<Ipv4Addr>>) -> Feeder {
    Feeder::spawn(|fed| async move {
        for target in targets {
            let Some(block) = parse(&target) else { continue };

            let mut hosts = block.iter().peekable();
            while hosts.peek().is_some() {
                let batch: Vec<Ipv4Addr> = hosts.by_ref().take(BATCH_SIZE).collect();
                let len = batch.len() as u64;
                if queue.send(batch).await.is_err() {
                    return;
                }
                fed.fetch_add(len, Ordering::Relaxed);
            }
        }
    })
}

/// Feeds every address of `targets` to `queue` one at a time.
pub fn feed_hosts(targets: Vec<String>, queue: mpsc::Sender<Ipv4Addr>) -> Feeder {
    Feeder::spawn(|fed| async move {
        for target in targets {
            let Some(block) = parse(&target) else { continue };

            for host in block.iter() {
                if queue.send(host).await.is_err() {
                    return;
                }
                fed.fetch_add(1, Ordering::Relaxed);
            }
        }
    })
}

fn parse(target: &str) -> Option<range::Ipv4Range> {
    range::parse_cidr(target)
        .inspect_err(|e| warn!("skipping {target}: {e}"))
        .ok()
}
