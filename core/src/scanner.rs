//! The protocol-independent scan **orchestrator**.
//!
//! A scan is a pool of sender tasks draining a shared input queue plus a
//! single receiver reading the transport. They never talk to each other:
//! senders put probes on the wire, the receiver keeps whatever comes back
//! that the [`Prober`] recognizes as an answer to one of them.
//!
//! Teardown is driven by one [`CancellationToken`]. It fires once every
//! sender is done and the grace period has passed, when the receiver hits a
//! fatal read error, or when [`ScanHandle::stop`] is called. The receiver
//! owns the only sender half of the output queue, so the queue closes exactly
//! when the receiver observes the token.

use std::net::Ipv4Addr;
use std::sync::Arc;

use shoal_common::config::ScanConfig;
use shoal_protocols::CodecError;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{self, JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::network::transport::{Transport, TransportError};

pub mod icmp;
pub mod targets;
pub mod tcp;

pub use icmp::IcmpScanner;
pub use targets::IntoTargets;
pub use tcp::TcpScanner;

/// Large enough for any IPv4 datagram a raw socket hands us.
const RECV_BUFFER_SIZE: usize = 65_535;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("receiver stopped: {0}")]
    Receive(#[source] TransportError),
    #[error("scan task failed: {0}")]
    Task(#[from] JoinError),
}

/// Protocol-specific half of a scan: how to ask, and how to recognize an answer.
pub trait Prober: Send + Sync + 'static {
    /// Builds the bytes of one probe to `dst`.
    fn build_probe(&self, dst: Ipv4Addr) -> Result<Vec<u8>, CodecError>;

    /// Inspects one received IPv4 datagram and returns the address of the
    /// host it proves alive, if it answers one of our probes.
    fn match_reply(&self, datagram: &[u8]) -> Option<Ipv4Addr>;
}

/// Counters gathered over one scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Probes handed to the transport.
    pub sent: u64,
    /// Probes that could not be built or sent.
    pub failed: u64,
    /// Replies that matched a probe (duplicates included).
    pub replies: u64,
}

impl ScanReport {
    fn absorb(&mut self, other: SendStats) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SendStats {
    sent: u64,
    failed: u64,
}

/// A running scan.
pub struct ScanHandle {
    results: mpsc::Receiver<Ipv4Addr>,
    task: JoinHandle<Result<ScanReport, ScanError>>,
    cancel: CancellationToken,
}

impl ScanHandle {
    /// Next alive address, or `None` once the scan has wound down.
    pub async fn next(&mut self) -> Option<Ipv4Addr> {
        self.results.recv().await
    }

    /// Stops sending and receiving without waiting for the grace period.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Waits for the scan to end and returns its counters.
    ///
    /// Results not yet taken with [`ScanHandle::next`] are discarded.
    pub async fn finish(self) -> Result<ScanReport, ScanError> {
        drop(self.results);
        self.task.await?
    }

    /// Drains every result, then waits for the scan to end.
    pub async fn collect(mut self) -> Result<(Vec<Ipv4Addr>, ScanReport), ScanError> {
        let mut alive = Vec::new();
        while let Some(addr) = self.next().await {
            alive.push(addr);
        }
        let report = self.task.await??;
        Ok((alive, report))
    }
}

/// Pairs a [`Prober`] with a [`Transport`] and runs scans over them.
pub struct Scanner<P, T> {
    prober: Arc<P>,
    transport: Arc<T>,
    config: ScanConfig,
}

impl<P: Prober, T: Transport> Scanner<P, T> {
    pub fn new(prober: P, transport: T, config: ScanConfig) -> Self {
        Self {
            prober: Arc::new(prober),
            transport: Arc::new(transport),
            config,
        }
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Starts a scan over everything that arrives on `input`.
    ///
    /// The scan runs until `input` is closed and drained, then keeps listening
    /// for the configured grace period. Must be called inside a tokio runtime.
    pub fn scan<I: IntoTargets>(&self, input: mpsc::Receiver<I>) -> ScanHandle {
        let (output, results) = mpsc::channel(self.config.queue_capacity);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(orchestrate(
            self.prober.clone(),
            self.transport.clone(),
            self.config.clone(),
            input,
            output,
            cancel.clone(),
        ));

        ScanHandle {
            results,
            task,
            cancel,
        }
    }
}

async fn orchestrate<P, T, I>(
    prober: Arc<P>,
    transport: Arc<T>,
    config: ScanConfig,
    input: mpsc::Receiver<I>,
    output: mpsc::Sender<Ipv4Addr>,
    cancel: CancellationToken,
) -> Result<ScanReport, ScanError>
where
    P: Prober,
    T: Transport,
    I: IntoTargets,
{
    let receiver = {
        let (prober, transport, cancel) = (prober.clone(), transport.clone(), cancel.clone());
        task::spawn_blocking(move || receive_replies(&*prober, &*transport, output, &cancel))
    };

    let input = Arc::new(Mutex::new(input));
    let senders: Vec<JoinHandle<Result<SendStats, JoinError>>> = (0..config.concurrency.max(1))
        .map(|idx| {
            tokio::spawn(send_probes(
                idx,
                prober.clone(),
                transport.clone(),
                input.clone(),
                cancel.clone(),
            ))
        })
        .collect();

    let mut report = ScanReport::default();
    let mut failure = None;
    for sender in senders {
        match sender.await.and_then(|stats| stats) {
            Ok(stats) => report.absorb(stats),
            Err(e) => {
                cancel.cancel();
                failure.get_or_insert(e);
            }
        }
    }
    if let Some(e) = failure {
        // The receiver owns the output queue; let it close before reporting.
        let _ = receiver.await;
        return Err(e.into());
    }
    debug!(
        "all senders done ({} sent, {} failed), waiting {:?} for late replies",
        report.sent, report.failed, config.grace_period
    );

    tokio::select! {
        _ = tokio::time::sleep(config.grace_period) => {}
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();

    report.replies = receiver.await??;
    Ok(report)
}

async fn send_probes<P, T, I>(
    idx: usize,
    prober: Arc<P>,
    transport: Arc<T>,
    input: Arc<Mutex<mpsc::Receiver<I>>>,
    cancel: CancellationToken,
) -> Result<SendStats, JoinError>
where
    P: Prober,
    T: Transport,
    I: IntoTargets,
{
    let mut stats = SendStats::default();

    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => break,
            item = async { input.lock().await.recv().await } => item,
        };
        let Some(batch) = item else { break };

        let (prober, transport, batch_cancel) = (prober.clone(), transport.clone(), cancel.clone());
        match task::spawn_blocking(move || send_batch(&*prober, &*transport, batch, &batch_cancel)).await {
            Ok(batch_stats) => {
                stats.sent += batch_stats.sent;
                stats.failed += batch_stats.failed;
            }
            Err(e) => {
                error!("sender {idx} failed: {e}");
                cancel.cancel();
                return Err(e);
            }
        }
    }

    debug!("sender {idx} finished after {} probes", stats.sent);
    Ok(stats)
}

fn send_batch<P: Prober, T: Transport, I: IntoTargets>(
    prober: &P,
    transport: &T,
    batch: I,
    cancel: &CancellationToken,
) -> SendStats {
    let mut stats = SendStats::default();

    for dst in batch.into_targets() {
        if cancel.is_cancelled() {
            break;
        }

        let probe = match prober.build_probe(dst) {
            Ok(probe) => probe,
            Err(e) => {
                warn!("failed to build probe for {dst}: {e}");
                stats.failed += 1;
                continue;
            }
        };

        match transport.send_to(&probe, dst) {
            Ok(_) => stats.sent += 1,
            Err(e) => {
                warn!("{e}");
                stats.failed += 1;
            }
        }
    }
    stats
}

/// Reads the transport until cancelled, forwarding every recognized reply.
///
/// A read error other than a timeout ends the scan: it cancels the token so
/// senders stop early and the orchestrator skips the grace period.
fn receive_replies<P: Prober, T: Transport>(
    prober: &P,
    transport: &T,
    output: mpsc::Sender<Ipv4Addr>,
    cancel: &CancellationToken,
) -> Result<u64, ScanError> {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    let mut replies = 0;

    while !cancel.is_cancelled() {
        let len = match transport.recv(&mut buf) {
            Ok(Some(len)) => len,
            Ok(None) => continue,
            Err(e) => {
                error!("{e}");
                cancel.cancel();
                return Err(ScanError::Receive(e));
            }
        };

        let Some(addr) = prober.match_reply(&buf[..len]) else {
            continue;
        };

        replies += 1;
        if output.blocking_send(addr).is_err() {
            debug!("result consumer went away, receiver stopping");
            break;
        }
    }

    Ok(replies)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
