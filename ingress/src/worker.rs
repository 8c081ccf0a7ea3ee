use crate::{
    epoch::View,
    fanout::Fanout,
    metrics,
    queue::{Request, Requests},
    timed,
    types::Parity,
    Error, Orderbook, Registry, Swarmer,
};
use commonware_macros::select;
use commonware_runtime::{Clock, Handle, Metrics, Spawner};
use futures::channel::mpsc;
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, trace};

/// Drains the request queue, one request at a time.
#[derive(Clone)]
pub struct Worker<E: Clock + Spawner + Metrics, R: Registry, S: Swarmer, O: Orderbook> {
    context: E,
    registry: R,
    fanout: Fanout<E, S, O>,
    view: View,
    requests: Requests,
    errors: mpsc::UnboundedSender<Error>,
    timeout: Duration,
    metrics: Arc<metrics::Metrics>,
}

impl<E: Clock + Spawner + Metrics, R: Registry, S: Swarmer, O: Orderbook> Worker<E, R, S, O> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: E,
        registry: R,
        fanout: Fanout<E, S, O>,
        view: View,
        requests: Requests,
        errors: mpsc::UnboundedSender<Error>,
        timeout: Duration,
        metrics: Arc<metrics::Metrics>,
    ) -> Self {
        Self {
            context,
            registry,
            fanout,
            view,
            requests,
            errors,
            timeout,
            metrics,
        }
    }

    pub fn start(self) -> Handle<()> {
        self.context.clone().spawn(|_| self.run())
    }

    async fn run(self) {
        let mut shutdown = self.context.stopped();
        loop {
            // The request in hand is finished even if shutdown arrives meanwhile
            let request = select! {
                _ = &mut shutdown => {
                    debug!("shutdown");
                    return;
                },
                request = self.requests.next() => {
                    let Some(request) = request else {
                        debug!("request queue closed");
                        return;
                    };
                    request
                },
            };
            let kind = request.kind();
            trace!(kind, "processing request");
            let result = self.handle(request).await;
            self.metrics.processed(kind, &result);
            if let Err(err) = result {
                error!(?err, kind, "failed to process request");
                // The caller may have dropped the stream
                let _ = self.errors.unbounded_send(err);
            }
        }
    }

    async fn handle(&self, request: Request) -> Result<(), Error> {
        match request {
            Request::OpenOrder {
                signature,
                order_id,
                parity,
            } => match parity {
                Parity::Buy => {
                    let open = self.registry.open_buy_order(signature, order_id);
                    timed(&self.context, self.timeout, open).await
                }
                Parity::Sell => {
                    let open = self.registry.open_sell_order(signature, order_id);
                    timed(&self.context, self.timeout, open).await
                }
            },
            Request::OpenOrderFragmentMapping {
                order_id,
                mapping,
                depth,
                ..
            } => self.fanout.open(order_id, mapping, depth, &self.view).await,
            Request::CancelOrder {
                signature,
                order_id,
            } => {
                let cancel = self.registry.cancel_order(signature, order_id);
                timed(&self.context, self.timeout, cancel).await
            }
            Request::EpochRotation => {
                timed(&self.context, self.timeout, self.registry.next_epoch()).await
            }
        }
    }
}
