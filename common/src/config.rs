use std::net::Ipv4Addr;
use std::time::Duration;

/// How long the receiver keeps listening after the last probe went out.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Capacity of the input and output queues. Kept large so a slow consumer
/// does not stall the receiver while replies are still arriving.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1 << 20;

/// Upper bound on how long a single blocking socket read may wait before the
/// receiver re-checks for cancellation.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(250);

pub const DEFAULT_SOURCE_PORT: u16 = 12345;
pub const DEFAULT_DESTINATION_PORT: u16 = 9000;

/// One worker per CPU, or a single one when the CPU count is unknown.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Settings shared by every scanner.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Local address probes are sent from.
    pub source_addr: Ipv4Addr,
    /// Number of sender tasks draining the input queue.
    pub concurrency: usize,
    pub grace_period: Duration,
    pub queue_capacity: usize,
    pub read_timeout: Duration,
}

impl ScanConfig {
    pub fn new(source_addr: Ipv4Addr) -> Self {
        Self {
            source_addr,
            concurrency: default_concurrency(),
            grace_period: DEFAULT_GRACE_PERIOD,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity.max(1);
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

/// The fixed port pair used for every SYN probe of a TCP run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpPorts {
    pub source: u16,
    pub destination: u16,
}

impl Default for TcpPorts {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE_PORT,
            destination: DEFAULT_DESTINATION_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_clamp_to_one() {
        let cfg = ScanConfig::new(Ipv4Addr::LOCALHOST)
            .with_concurrency(0)
            .with_queue_capacity(0);
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.queue_capacity, 1);
        assert_eq!(cfg.grace_period, DEFAULT_GRACE_PERIOD);
    }

    #[test]
    fn concurrency_defaults_to_cpu_count() {
        let cfg = ScanConfig::new(Ipv4Addr::LOCALHOST);
        assert!(cfg.concurrency >= 1);
        assert_eq!(cfg.concurrency, default_concurrency());
    }
}
