pub mod check;
pub mod icmp;
pub mod targets;
pub mod tcp;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use shoal_common::config::{
    DEFAULT_DESTINATION_PORT, DEFAULT_GRACE_PERIOD, DEFAULT_SOURCE_PORT, ScanConfig,
};
use shoal_common::success;
use shoal_core::scanner::ScanHandle;
use shoal_core::system;
use tracing::{debug, warn};

use crate::terminal::{print, spinner};
use targets::Feeder;

#[derive(Parser)]
#[command(name = "shoal")]
#[command(version, about = "Fast host discovery over raw sockets.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Show more detail (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Show less (-q warnings, -qq errors); results are always shown
    #[arg(short, long, action = ArgAction::Count, global = true, conflicts_with = "verbose")]
    pub quiet: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find hosts that answer ICMP echo requests
    #[command(alias = "i")]
    Icmp {
        #[command(flatten)]
        scan: ScanArgs,
        /// Number of sender tasks [default: CPU count]
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
    /// Find hosts that answer a TCP SYN on one port
    #[command(alias = "t")]
    Tcp {
        #[command(flatten)]
        scan: ScanArgs,
        #[arg(long, default_value_t = DEFAULT_SOURCE_PORT)]
        sport: u16,
        #[arg(long, default_value_t = DEFAULT_DESTINATION_PORT)]
        dport: u16,
    },
    /// Check which hosts accept TCP connections on a service port
    #[command(alias = "c")]
    Check {
        #[command(flatten)]
        targets: TargetArgs,
        #[arg(short, long, default_value_t = DEFAULT_DESTINATION_PORT)]
        port: u16,
        /// Connect timeout in milliseconds
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
        /// Number of concurrent checks [default: CPU count]
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
}

#[derive(Args)]
pub struct TargetArgs {
    /// Addresses or CIDR blocks, e.g. 10.0.0.0/24
    pub targets: Vec<String>,

    /// Read targets from a file, one per line
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Local address to send from [default: detected]
    #[arg(short, long)]
    pub source: Option<Ipv4Addr>,

    /// Seconds to keep listening after the last probe
    #[arg(long, default_value_t = DEFAULT_GRACE_PERIOD.as_secs())]
    pub grace: u64,
}

impl ScanArgs {
    pub fn config(&self) -> anyhow::Result<ScanConfig> {
        let source = match self.source {
            Some(ip) => ip,
            None => system::detect_source_addr().context("could not pick a source address")?,
        };
        debug!("scanning from {source}");
        Ok(ScanConfig::new(source).with_grace_period(Duration::from_secs(self.grace)))
    }
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Drains a scan, logging each alive host, until it ends or Ctrl-C stops it.
///
/// The summary's total is the number of addresses fed to the scan.
pub async fn drain(mut handle: ScanHandle, feeder: Feeder, started: Instant) -> anyhow::Result<()> {
    let mut alive: u64 = 0;

    loop {
        tokio::select! {
            next = handle.next() => {
                let Some(ip) = next else { break };
                alive += 1;
                success!("{ip} is alive");
                spinner::report_progress(alive, "hosts alive");
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted, stopping scan");
                feeder.stop();
                handle.stop();
            }
        }
    }

    let report = handle.finish().await?;
    let total = feeder.finish().await;
    spinner::get_spinner().finish_and_clear();
    if report.failed > 0 {
        warn!("{} probes could not be sent", report.failed);
    }
    print::summary(total, alive, started.elapsed());
    Ok(())
}
