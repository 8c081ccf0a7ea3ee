use crate::{
    epoch::View,
    metrics,
    timed,
    types::{Address, EncryptedFragment, OrderFragmentMapping, OrderId, Pod},
    Error, Orderbook, Swarmer,
};
use commonware_runtime::Clock;
use futures::future::join_all;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, error, info, trace, warn};

/// Delivers the fragments of one mapping to the darknodes of each pod.
#[derive(Clone)]
pub struct Fanout<E: Clock, S: Swarmer, O: Orderbook> {
    context: E,
    swarmer: S,
    orderbook: O,
    timeout: Duration,
    metrics: Arc<metrics::Metrics>,
}

impl<E: Clock, S: Swarmer, O: Orderbook> Fanout<E, S, O> {
    pub fn new(
        context: E,
        swarmer: S,
        orderbook: O,
        timeout: Duration,
        metrics: Arc<metrics::Metrics>,
    ) -> Self {
        Self {
            context,
            swarmer,
            orderbook,
            timeout,
            metrics,
        }
    }

    /// Deliver `mapping` using the pods the view holds at `depth` when called.
    ///
    /// Succeeds if at least one pod reached its threshold.
    pub async fn open(
        &self,
        order_id: OrderId,
        mapping: OrderFragmentMapping,
        depth: usize,
        view: &View,
    ) -> Result<(), Error> {
        let snapshot = view.snapshot();
        let pods = snapshot.pods_at(depth)?;
        info!(?order_id, depth, pods = mapping.len(), "opening order fragments");

        let received = AtomicBool::new(false);
        let deliveries = mapping.into_iter().filter_map(|(hash, fragments)| {
            let Some(pod) = pods.get(&hash) else {
                debug!(pod = %hash, depth, "skipping pod missing from epoch");
                return None;
            };
            Some(self.open_pod(order_id, pod, fragments, &received))
        });
        join_all(deliveries).await;

        let result = if received.load(Ordering::Acquire) {
            Ok(())
        } else {
            error!(?order_id, depth, "no pod received order fragments");
            Err(Error::CannotOpenOrderFragments(order_id))
        };
        self.metrics.fanout(&result);
        result
    }

    async fn open_pod(
        &self,
        order_id: OrderId,
        pod: &Pod,
        fragments: Vec<EncryptedFragment>,
        received: &AtomicBool,
    ) {
        let n = pod.darknodes.len() as u64;
        let mut by_index = BTreeMap::new();
        for fragment in fragments {
            if (1..=n).contains(&fragment.index) {
                by_index.insert(fragment.index, fragment);
            }
        }

        let deliveries = pod.darknodes.iter().enumerate().map(|(i, darknode)| {
            let fragment = by_index.remove(&(i as u64 + 1));
            self.deliver(*darknode, fragment)
        });
        let delivered = join_all(deliveries)
            .await
            .into_iter()
            .filter(Result::is_ok)
            .count();

        let threshold = pod.threshold();
        if pod.quorum(delivered) {
            received.store(true, Ordering::Release);
            info!(?order_id, pod = %pod.hash, delivered, threshold, "pod received order fragments");
        } else {
            warn!(?order_id, pod = %pod.hash, delivered, threshold, "pod missed threshold");
        }
    }

    async fn deliver(
        &self,
        darknode: Address,
        fragment: Option<EncryptedFragment>,
    ) -> Result<(), Error> {
        let result = match fragment {
            Some(fragment) => self.send(darknode, fragment).await,
            None => Err(Error::Delivery(format!("no fragment for darknode {darknode}"))),
        };
        self.metrics.delivery(&result);
        match &result {
            Ok(()) => trace!(%darknode, "delivered fragment"),
            Err(err) => debug!(%darknode, ?err, "failed to deliver fragment"),
        }
        result
    }

    async fn send(&self, darknode: Address, fragment: EncryptedFragment) -> Result<(), Error> {
        let address = timed(&self.context, self.timeout, self.swarmer.query(darknode)).await?;
        timed(
            &self.context,
            self.timeout,
            self.orderbook.open_order(address, fragment),
        )
        .await
    }
}
