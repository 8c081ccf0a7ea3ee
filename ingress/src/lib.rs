//! Admit orders into a dark pool and fan their fragments out to darknodes.
//!
//! Traders split an order into encrypted fragments, one per darknode of each
//! pod they target, and submit them together with a signature. The [Ingress]
//! validates the submission against the pods of the current (and previous)
//! epoch, enqueues it, and lets a pool of workers register the order with the
//! [Registry] and deliver each fragment to its darknode through the
//! [Orderbook]. A synchroniser keeps the pod topology in step with the
//! [Registry] as epochs rotate.
//!
//! # Quorum
//!
//! A pod of `n` darknodes has threshold `ceil(2(n+1)/3)`. Delivering a
//! mapping succeeds if at least one pod had that many darknodes accept their
//! fragment. Pods fail independently: only when every pod misses its
//! threshold is [Error::CannotOpenOrderFragments] reported.
//!
//! # Ordering
//!
//! A single call to [Ingress::open_order] enqueues the on-chain registration
//! before the fragment deliveries, but workers process requests concurrently
//! so the two are not ordered with respect to each other.
//!
//! # Shutdown
//!
//! Every task spawned by the [Ingress] exits when the runtime is stopped.
//! Workers finish the request they hold and leave pending requests in the
//! queue.

use commonware_macros::select;
use commonware_runtime::Clock;
use futures::{pin_mut, Future};
use std::time::Duration;

pub mod config;
pub use config::Config;
mod engine;
pub use engine::Ingress;
pub mod epoch;
mod error;
pub use error::Error;
mod fanout;
mod metrics;
pub mod queue;
mod syncer;
pub mod swarm;
pub mod types;
pub use types::{
    Address, CoExp, EncryptedFragment, Epoch, EpochHash, FragmentId, MultiAddress,
    OrderFragmentMapping, OrderFragmentMappings, OrderId, Parity, Pod, PodHash, Pods, Signature,
};
pub mod validator;
mod worker;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

/// On-chain registry of darknodes, pods and orders.
pub trait Registry: Clone + Send + Sync + 'static {
    /// Current epoch.
    fn epoch(&self) -> impl Future<Output = Result<Epoch, Error>> + Send;

    /// Epoch before the current one.
    fn previous_epoch(&self) -> impl Future<Output = Result<Epoch, Error>> + Send;

    /// Ask the registry to advance the epoch if enough blocks have passed.
    fn next_epoch(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Minimum number of blocks between two epochs.
    fn minimum_epoch_interval(&self) -> impl Future<Output = Result<u64, Error>> + Send;

    /// Pods of the current epoch.
    fn pods(&self) -> impl Future<Output = Result<Vec<Pod>, Error>> + Send;

    /// Pods of the previous epoch.
    fn previous_pods(&self) -> impl Future<Output = Result<Vec<Pod>, Error>> + Send;

    fn open_buy_order(
        &self,
        signature: Signature,
        order_id: OrderId,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn open_sell_order(
        &self,
        signature: Signature,
        order_id: OrderId,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn cancel_order(
        &self,
        signature: Signature,
        order_id: OrderId,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Peer discovery.
pub trait Swarmer: Clone + Send + Sync + 'static {
    /// Resolve the network address of a darknode.
    fn query(&self, address: Address) -> impl Future<Output = Result<MultiAddress, Error>> + Send;
}

/// Darknode orderbook RPC.
pub trait Orderbook: Clone + Send + Sync + 'static {
    /// Deliver an encrypted fragment to the darknode listening at `address`.
    fn open_order(
        &self,
        address: MultiAddress,
        fragment: EncryptedFragment,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Resolve `future` or fail with [Error::Timeout] after `timeout`.
async fn timed<E: Clock, T>(
    context: &E,
    timeout: Duration,
    future: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    pin_mut!(future);
    select! {
        result = future => {
            result
        },
        _ = context.sleep(timeout) => {
            Err(Error::Timeout)
        },
    }
}
