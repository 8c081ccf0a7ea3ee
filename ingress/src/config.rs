use crate::{Orderbook, Registry, Swarmer};
use std::{thread, time::Duration};

/// Default capacity of the request queue.
pub const DEFAULT_MAILBOX_SIZE: usize = 1024;

/// Default deadline for a single registry, discovery or orderbook call.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default wall time waited per block of the minimum epoch interval.
pub const DEFAULT_POLL_MULTIPLIER: Duration = Duration::from_secs(1);

/// Lowest minimum epoch interval honoured when polling the registry.
pub const DEFAULT_MIN_EPOCH_INTERVAL: u64 = 50;

/// Four workers per available hardware thread.
pub fn default_workers() -> usize {
    4 * thread::available_parallelism().map_or(1, |n| n.get())
}

/// Configuration for the [`Ingress`](crate::Ingress).
pub struct Config<R: Registry, S: Swarmer, O: Orderbook> {
    /// On-chain registry of epochs, pods and orders.
    pub registry: R,

    /// Resolves darknode addresses to network addresses.
    pub swarmer: S,

    /// Delivers fragments to darknodes.
    pub orderbook: O,

    /// Maximum number of requests waiting for a worker.
    ///
    /// The bound is shared by every producer. Submissions and rotation hints
    /// wait for capacity once the queue is full.
    pub mailbox_size: usize,

    /// Number of workers draining the queue.
    pub workers: usize,

    /// Deadline applied to each collaborator call.
    pub rpc_timeout: Duration,

    /// Wall time waited per block of the registry's minimum epoch interval
    /// between two polls.
    pub poll_multiplier: Duration,

    /// Floor applied to the registry's minimum epoch interval.
    pub min_epoch_interval: u64,
}

impl<R: Registry, S: Swarmer, O: Orderbook> Config<R, S, O> {
    /// Configuration with every tunable at its default.
    pub fn new(registry: R, swarmer: S, orderbook: O) -> Self {
        Self {
            registry,
            swarmer,
            orderbook,
            mailbox_size: DEFAULT_MAILBOX_SIZE,
            workers: default_workers(),
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            poll_multiplier: DEFAULT_POLL_MULTIPLIER,
            min_epoch_interval: DEFAULT_MIN_EPOCH_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks;

    #[test]
    fn test_defaults() {
        let cfg = Config::new(
            mocks::Registry::default(),
            mocks::Swarmer::default(),
            mocks::Orderbook::default(),
        );
        assert_eq!(cfg.mailbox_size, 1024);
        assert_eq!(cfg.rpc_timeout, Duration::from_secs(300));
        assert_eq!(cfg.min_epoch_interval, 50);
        assert!(cfg.workers >= 4);
        assert_eq!(cfg.workers % 4, 0);
    }
}
