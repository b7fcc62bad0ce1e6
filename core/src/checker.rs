//! Application-level reachability checks over ordinary OS connections.
//!
//! Runs after discovery: a host that answers a ping may still not accept
//! connections on the port a service listens on.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;
use tracing::{debug, trace};

pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(1);

#[async_trait]
pub trait ServiceChecker: Send + Sync + 'static {
    /// Whether the service on `addr` can be reached.
    async fn check(&self, addr: Ipv4Addr) -> bool;
}

/// Reachable when a TCP connection to `port` is established within `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct ConnectChecker {
    pub port: u16,
    pub timeout: Duration,
}

impl ConnectChecker {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ServiceChecker for ConnectChecker {
    async fn check(&self, addr: Ipv4Addr) -> bool {
        let target = SocketAddr::V4(SocketAddrV4::new(addr, self.port));

        match timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                trace!("{target} refused: {e}");
                false
            }
            Err(_elapsed) => {
                trace!("{target} timed out after {:?}", self.timeout);
                false
            }
        }
    }
}

/// Runs `workers` checkers over `input`.
///
/// The returned queue yields every reachable address and closes once `input`
/// is closed and every worker is done.
pub fn spawn_checks<C: ServiceChecker>(
    checker: Arc<C>,
    input: mpsc::Receiver<Ipv4Addr>,
    workers: usize,
    capacity: usize,
) -> mpsc::Receiver<Ipv4Addr> {
    let (output, reachable) = mpsc::channel(capacity.max(1));
    let input = Arc::new(Mutex::new(input));

    for idx in 0..workers.max(1) {
        let (checker, input, output) = (checker.clone(), input.clone(), output.clone());
        tokio::spawn(async move {
            let mut checked = 0usize;
            loop {
                let next = input.lock().await.recv().await;
                let Some(addr) = next else { break };
                checked += 1;

                if checker.check(addr).await && output.send(addr).await.is_err() {
                    break;
                }
            }
            debug!("checker {idx} done after {checked} hosts");
        });
    }

    reachable
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
