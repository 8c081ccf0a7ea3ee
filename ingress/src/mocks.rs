//! In-memory collaborators and fixtures for testing.

use crate::{
    types::{
        Address, CoExp, EncryptedFragment, Epoch, FragmentId, MultiAddress, OrderFragmentMapping,
        OrderId, Parity, Pod, PodHash, Signature,
    },
    Error,
};
use bytes::Bytes;
use futures::future;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

/// Call made against the mock [Registry].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    OpenBuyOrder(OrderId),
    OpenSellOrder(OrderId),
    CancelOrder(OrderId),
    NextEpoch,
}

#[derive(Default)]
struct RegistryState {
    epoch: Epoch,
    pods: Vec<Pod>,
    previous_epoch: Epoch,
    previous_pods: Vec<Pod>,
    interval: u64,

    calls: Vec<Call>,
    pod_reads: usize,

    fail_orders: bool,
    fail_epochs: bool,
    stall_pods: bool,
}

/// Registry whose epochs are advanced by hand.
#[derive(Clone, Default)]
pub struct Registry {
    state: Arc<Mutex<RegistryState>>,
}

impl Registry {
    /// A registry that has only ever seen `epoch`, which is therefore both
    /// its current and previous epoch.
    pub fn new(epoch: Epoch, pods: Vec<Pod>) -> Self {
        let state = RegistryState {
            epoch,
            pods: pods.clone(),
            previous_epoch: epoch,
            previous_pods: pods,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Move the current epoch into the previous one and install `epoch`.
    pub fn advance(&self, epoch: Epoch, pods: Vec<Pod>) {
        let mut state = self.state.lock().unwrap();
        state.previous_epoch = state.epoch;
        state.previous_pods = std::mem::replace(&mut state.pods, pods);
        state.epoch = epoch;
    }

    pub fn set_interval(&self, interval: u64) {
        self.state.lock().unwrap().interval = interval;
    }

    /// Fail every order registration and cancellation.
    pub fn fail_orders(&self, fail: bool) {
        self.state.lock().unwrap().fail_orders = fail;
    }

    /// Fail every read of the current or previous epoch.
    pub fn fail_epochs(&self, fail: bool) {
        self.state.lock().unwrap().fail_epochs = fail;
    }

    /// Never answer reads of the current pods.
    pub fn stall_pods(&self, stall: bool) {
        self.state.lock().unwrap().stall_pods = stall;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of reads of the current pods.
    pub fn pod_reads(&self) -> usize {
        self.state.lock().unwrap().pod_reads
    }

    fn order(&self, call: Call) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_orders {
            return Err(Error::Registry(format!("rejected {call:?}")));
        }
        state.calls.push(call);
        Ok(())
    }

    fn epoch_at(&self, previous: bool) -> Result<Epoch, Error> {
        let state = self.state.lock().unwrap();
        if state.fail_epochs {
            return Err(Error::Registry("epoch unavailable".into()));
        }
        Ok(if previous {
            state.previous_epoch
        } else {
            state.epoch
        })
    }
}

impl crate::Registry for Registry {
    async fn epoch(&self) -> Result<Epoch, Error> {
        self.epoch_at(false)
    }

    async fn previous_epoch(&self) -> Result<Epoch, Error> {
        self.epoch_at(true)
    }

    async fn next_epoch(&self) -> Result<(), Error> {
        self.state.lock().unwrap().calls.push(Call::NextEpoch);
        Ok(())
    }

    async fn minimum_epoch_interval(&self) -> Result<u64, Error> {
        Ok(self.state.lock().unwrap().interval)
    }

    async fn pods(&self) -> Result<Vec<Pod>, Error> {
        let (stalled, pods) = {
            let mut state = self.state.lock().unwrap();
            state.pod_reads += 1;
            (state.stall_pods, state.pods.clone())
        };
        if stalled {
            return future::pending().await;
        }
        Ok(pods)
    }

    async fn previous_pods(&self) -> Result<Vec<Pod>, Error> {
        Ok(self.state.lock().unwrap().previous_pods.clone())
    }

    async fn open_buy_order(&self, _: Signature, order_id: OrderId) -> Result<(), Error> {
        self.order(Call::OpenBuyOrder(order_id))
    }

    async fn open_sell_order(&self, _: Signature, order_id: OrderId) -> Result<(), Error> {
        self.order(Call::OpenSellOrder(order_id))
    }

    async fn cancel_order(&self, _: Signature, order_id: OrderId) -> Result<(), Error> {
        self.order(Call::CancelOrder(order_id))
    }
}

#[derive(Default)]
struct SwarmerState {
    queries: Vec<Address>,
    unreachable: HashSet<Address>,
    stalled: HashSet<Address>,
}

/// Swarmer that resolves every darknode to [multiaddress] unless told otherwise.
#[derive(Clone, Default)]
pub struct Swarmer {
    state: Arc<Mutex<SwarmerState>>,
}

impl Swarmer {
    pub fn unreachable(&self, address: Address) {
        self.state.lock().unwrap().unreachable.insert(address);
    }

    pub fn reachable(&self, address: Address) {
        self.state.lock().unwrap().unreachable.remove(&address);
    }

    /// Never answer lookups of `address`.
    pub fn stall(&self, address: Address) {
        self.state.lock().unwrap().stalled.insert(address);
    }

    pub fn queries(&self) -> Vec<Address> {
        self.state.lock().unwrap().queries.clone()
    }
}

impl crate::Swarmer for Swarmer {
    async fn query(&self, address: Address) -> Result<MultiAddress, Error> {
        let stalled = {
            let mut state = self.state.lock().unwrap();
            state.queries.push(address);
            if state.unreachable.contains(&address) {
                return Err(Error::Discovery(format!("{address} not found")));
            }
            state.stalled.contains(&address)
        };
        if stalled {
            return future::pending().await;
        }
        Ok(multiaddress(&address))
    }
}

#[derive(Default)]
struct OrderbookState {
    deliveries: Vec<(MultiAddress, EncryptedFragment)>,
    attempts: usize,
    fail_all: bool,
}

/// Orderbook that records every delivered fragment.
#[derive(Clone, Default)]
pub struct Orderbook {
    state: Arc<Mutex<OrderbookState>>,
}

impl Orderbook {
    pub fn fail_all(&self, fail: bool) {
        self.state.lock().unwrap().fail_all = fail;
    }

    /// Successful deliveries.
    pub fn deliveries(&self) -> Vec<(MultiAddress, EncryptedFragment)> {
        self.state.lock().unwrap().deliveries.clone()
    }

    /// Delivery attempts, successful or not.
    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }
}

impl crate::Orderbook for Orderbook {
    async fn open_order(
        &self,
        address: MultiAddress,
        fragment: EncryptedFragment,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        if state.fail_all {
            return Err(Error::Delivery(format!("{address} refused fragment")));
        }
        state.deliveries.push((address, fragment));
        Ok(())
    }
}

/// Network address the mock [Swarmer] resolves `address` to.
pub fn multiaddress(address: &Address) -> MultiAddress {
    MultiAddress(format!("/ip4/127.0.0.1/tcp/18514/republic/{address}"))
}

/// Pod `seed` with `n` darknodes.
pub fn pod(seed: u8, n: usize) -> Pod {
    let darknodes = (0..n)
        .map(|i| {
            let mut address = [seed; Address::SIZE];
            address[Address::SIZE - 1] = i as u8;
            Address::new(address)
        })
        .collect();
    Pod {
        hash: PodHash::new([seed; PodHash::SIZE]),
        darknodes,
    }
}

/// Fragment of `order_id` at `index` for the epoch at `depth`.
pub fn fragment(order_id: OrderId, index: u64, depth: u32) -> EncryptedFragment {
    let share = |tag: u8| CoExp {
        co: Bytes::from(vec![tag; 8]),
        exp: Bytes::from(vec![tag + 1; 8]),
    };
    let mut id = [index as u8; FragmentId::SIZE];
    id[0] = depth as u8;
    EncryptedFragment {
        order_id,
        order_type: 2,
        order_parity: Parity::Buy,
        order_settlement: 1,
        order_expiry: 1_700_000_000,
        id: FragmentId::new(id),
        index,
        epoch_depth: depth,
        tokens: Bytes::from_static(b"tokens"),
        price: share(1),
        volume: share(3),
        minimum_volume: share(5),
        nonce: Bytes::from_static(b"nonce"),
    }
}

/// Mapping that sends `count` fragments (indexed from 1) to `pod`.
pub fn mapping(order_id: OrderId, pod: &Pod, count: usize, depth: u32) -> OrderFragmentMapping {
    let fragments = (1..=count as u64)
        .map(|index| fragment(order_id, index, depth))
        .collect();
    let mut mapping = OrderFragmentMapping::new();
    mapping.insert(pod.hash, fragments);
    mapping
}
