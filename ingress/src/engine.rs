use crate::{
    config::Config,
    epoch::View,
    fanout::Fanout,
    metrics,
    queue::{self, Mailbox, Request, Requests},
    syncer::Syncer,
    types::{OrderFragmentMapping, OrderFragmentMappings, OrderId, Parity, Signature},
    validator,
    worker::Worker,
    Error, Orderbook, Registry, Swarmer,
};
use commonware_runtime::{Clock, Metrics, Spawner};
use futures::channel::mpsc;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

/// Entry point for order submissions.
///
/// Submissions are validated synchronously against the current [View] and
/// then enqueued. Nothing happens to them until [Ingress::process_requests]
/// has started the workers, and the view only follows the registry once
/// [Ingress::sync] has been called.
#[derive(Clone)]
pub struct Ingress<E: Clock + Spawner + Metrics, R: Registry, S: Swarmer, O: Orderbook> {
    context: E,
    registry: R,
    fanout: Fanout<E, S, O>,
    view: View,
    mailbox: Mailbox,
    requests: Requests,
    workers: usize,
    rpc_timeout: Duration,
    poll_multiplier: Duration,
    min_epoch_interval: u64,
    metrics: Arc<metrics::Metrics>,
}

impl<E: Clock + Spawner + Metrics, R: Registry, S: Swarmer, O: Orderbook> Ingress<E, R, S, O> {
    pub fn new(context: E, cfg: Config<R, S, O>) -> Self {
        let metrics = Arc::new(metrics::Metrics::init(context.clone()));
        let fanout = Fanout::new(
            context.with_label("fanout"),
            cfg.swarmer,
            cfg.orderbook,
            cfg.rpc_timeout,
            metrics.clone(),
        );
        let (mailbox, requests) = queue::channel(cfg.mailbox_size);
        Self {
            context,
            registry: cfg.registry,
            fanout,
            view: View::default(),
            mailbox,
            requests,
            workers: cfg.workers,
            rpc_timeout: cfg.rpc_timeout,
            poll_multiplier: cfg.poll_multiplier,
            min_epoch_interval: cfg.min_epoch_interval,
            metrics,
        }
    }

    /// Pods the ingress currently validates against.
    pub fn view(&self) -> &View {
        &self.view
    }

    /// Consumer side of the request queue.
    pub fn requests(&self) -> Requests {
        self.requests.clone()
    }

    /// Validate a submission and enqueue its registration and fragment
    /// deliveries.
    ///
    /// Nothing is enqueued if validation fails. Otherwise the registration
    /// and the mappings are enqueued back to back, and are all enqueued even
    /// if the returned future is dropped while the queue is full.
    pub async fn open_order(
        &self,
        signature: Signature,
        order_id: OrderId,
        mappings: OrderFragmentMappings,
    ) -> Result<(), Error> {
        let snapshot = self.view.snapshot();
        if let Err(err) = validator::validate(&order_id, &mappings, &snapshot) {
            warn!(?order_id, ?err, "rejected order");
            return Err(err);
        }

        let mut requests = Vec::with_capacity(mappings.len() + 1);
        requests.push(Request::OpenOrder {
            signature,
            order_id,
            parity: parity(&mappings),
        });
        requests.extend(mappings.into_iter().enumerate().map(|(depth, mapping)| {
            Request::OpenOrderFragmentMapping {
                signature,
                order_id,
                mapping,
                depth,
            }
        }));

        // A submission is enqueued whole even if the caller stops waiting
        let mailbox = self.mailbox.clone();
        let metrics = self.metrics.clone();
        let submission = self
            .context
            .with_label("submission")
            .spawn(move |_| async move {
                let kinds: Vec<_> = requests.iter().map(Request::kind).collect();
                mailbox.enqueue_all(requests).await?;
                for kind in &kinds {
                    metrics.enqueued(kind);
                }
                info!(?order_id, requests = kinds.len(), "enqueued order");
                Ok::<_, Error>(())
            });
        match submission.await {
            Ok(result) => result,
            Err(_) => Err(Error::Closed),
        }
    }

    /// Enqueue a cancellation. The registry decides whether it is valid.
    pub async fn cancel_order(&self, signature: Signature, order_id: OrderId) -> Result<(), Error> {
        let request = Request::CancelOrder {
            signature,
            order_id,
        };
        let kind = request.kind();
        self.mailbox.enqueue(request).await?;
        self.metrics.enqueued(kind);
        info!(?order_id, kind, "enqueued request");
        Ok(())
    }

    /// Start following the registry's epochs.
    ///
    /// Polling failures are reported on the returned stream.
    pub fn sync(&self) -> mpsc::UnboundedReceiver<Error> {
        let (sender, receiver) = mpsc::unbounded();
        Syncer::new(
            self.context.with_label("syncer"),
            self.registry.clone(),
            self.view.clone(),
            self.mailbox.clone(),
            sender,
            self.poll_multiplier,
            self.min_epoch_interval,
            self.rpc_timeout,
            self.metrics.clone(),
        )
        .start();
        receiver
    }

    /// Start the workers.
    ///
    /// Failures of individual requests are reported on the returned stream.
    pub fn process_requests(&self) -> mpsc::UnboundedReceiver<Error> {
        let (sender, receiver) = mpsc::unbounded();
        for _ in 0..self.workers {
            Worker::new(
                self.context.with_label("worker"),
                self.registry.clone(),
                self.fanout.clone(),
                self.view.clone(),
                self.requests.clone(),
                sender.clone(),
                self.rpc_timeout,
                self.metrics.clone(),
            )
            .start();
        }
        info!(workers = self.workers, "started workers");
        receiver
    }
}

/// Parity of the first fragment of the first non-empty mapping.
fn parity(mappings: &[OrderFragmentMapping]) -> Parity {
    mappings
        .iter()
        .flat_map(|mapping| mapping.values())
        .flatten()
        .next()
        .map_or(Parity::default(), |fragment| fragment.order_parity)
}
