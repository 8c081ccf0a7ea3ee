use crate::{
    epoch::{Snapshot, View},
    metrics,
    queue::{Mailbox, Request},
    timed,
    types::{index, EpochHash, Pods},
    Error, Registry,
};
use commonware_macros::select;
use commonware_runtime::{Clock, Handle, Metrics, Spawner};
use futures::channel::mpsc;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

/// Keeps the [View] in step with the epochs of the [Registry].
pub struct Syncer<E: Clock + Spawner + Metrics, R: Registry> {
    context: E,
    registry: R,
    view: View,
    mailbox: Mailbox,
    errors: mpsc::UnboundedSender<Error>,
    poll_multiplier: Duration,
    min_epoch_interval: u64,
    timeout: Duration,
    metrics: Arc<metrics::Metrics>,

    last: Option<EpochHash>,
}

impl<E: Clock + Spawner + Metrics, R: Registry> Syncer<E, R> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: E,
        registry: R,
        view: View,
        mailbox: Mailbox,
        errors: mpsc::UnboundedSender<Error>,
        poll_multiplier: Duration,
        min_epoch_interval: u64,
        timeout: Duration,
        metrics: Arc<metrics::Metrics>,
    ) -> Self {
        Self {
            context,
            registry,
            view,
            mailbox,
            errors,
            poll_multiplier,
            min_epoch_interval,
            timeout,
            metrics,

            last: None,
        }
    }

    pub fn start(self) -> Handle<()> {
        self.context.clone().spawn(|_| self.run())
    }

    async fn run(mut self) {
        let mut shutdown = self.context.stopped();

        // Seed with what the registry calls previous, so fragments prepared
        // against the visible epoch are accepted
        let seeded = select! {
            _ = &mut shutdown => {
                debug!("shutdown");
                return;
            },
            result = self.seed() => {
                result
            },
        };
        if let Err(err) = seeded {
            self.report(err);
        }

        loop {
            let interval = select! {
                _ = &mut shutdown => {
                    debug!("shutdown");
                    return;
                },
                result = self.interval() => {
                    result
                },
            };
            let interval = interval.unwrap_or_else(|err| {
                self.report(err);
                self.min_epoch_interval
            });

            let blocks = u32::try_from(interval).unwrap_or(u32::MAX);
            let wait = self.poll_multiplier.saturating_mul(blocks);
            select! {
                _ = &mut shutdown => {
                    debug!("shutdown");
                    return;
                },
                _ = self.context.sleep(wait) => {},
            }

            // A rotation interrupted by shutdown never reaches the view
            let polled = select! {
                _ = &mut shutdown => {
                    debug!("shutdown");
                    return;
                },
                result = self.poll() => {
                    result
                },
            };
            if let Err(err) = polled {
                self.report(err);
            }

            let enqueued = select! {
                _ = &mut shutdown => {
                    debug!("shutdown");
                    return;
                },
                result = self.mailbox.enqueue(Request::EpochRotation) => {
                    result
                },
            };
            match enqueued {
                Ok(()) => self.metrics.enqueued(Request::EpochRotation.kind()),
                Err(err) => self.report(err),
            }
        }
    }

    async fn seed(&mut self) -> Result<(), Error> {
        let epoch = timed(&self.context, self.timeout, self.registry.previous_epoch()).await?;
        let pods = timed(&self.context, self.timeout, self.registry.previous_pods()).await?;
        let pods = index(pods);
        self.metrics.pods.set(pods.len() as i64);
        self.view.seed(Snapshot::new(pods, Pods::new()));
        self.last = Some(epoch.hash);
        info!(epoch = %epoch.hash, block = epoch.block_number, "seeded epoch view");
        Ok(())
    }

    async fn interval(&self) -> Result<u64, Error> {
        let interval = timed(
            &self.context,
            self.timeout,
            self.registry.minimum_epoch_interval(),
        )
        .await?;
        Ok(interval.max(self.min_epoch_interval))
    }

    /// Rotate the view if the registry reports a new epoch.
    async fn poll(&mut self) -> Result<bool, Error> {
        let epoch = timed(&self.context, self.timeout, self.registry.epoch()).await?;
        if self.last == Some(epoch.hash) {
            return Ok(false);
        }
        let pods = timed(&self.context, self.timeout, self.registry.pods()).await?;
        let pods = index(pods);
        self.metrics.pods.set(pods.len() as i64);
        self.metrics.rotations.inc();
        self.view.rotate(pods);
        self.last = Some(epoch.hash);
        info!(epoch = %epoch.hash, block = epoch.block_number, "rotated epoch view");
        Ok(true)
    }

    fn report(&self, err: Error) {
        warn!(?err, "failed to sync epoch");
        let _ = self.errors.unbounded_send(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mocks::{self, Call},
        queue::{self, Requests},
        types::Epoch,
    };
    use commonware_macros::test_traced;
    use commonware_runtime::{deterministic, Runner};

    fn epoch(seed: u8) -> Epoch {
        Epoch {
            hash: EpochHash::new([seed; 32]),
            block_number: seed as u64,
        }
    }

    fn start(
        context: &deterministic::Context,
        registry: &mocks::Registry,
        view: &View,
    ) -> (Requests, mpsc::UnboundedReceiver<Error>) {
        let (mailbox, requests) = queue::channel(64);
        let (sender, errors) = mpsc::unbounded();
        let metrics = Arc::new(metrics::Metrics::init(context.with_label("syncer")));
        Syncer::new(
            context.with_label("syncer"),
            registry.clone(),
            view.clone(),
            mailbox,
            sender,
            Duration::from_millis(10),
            50,
            Duration::from_secs(300),
            metrics,
        )
        .start();
        (requests, errors)
    }

    fn rotations(requests: &Requests) -> usize {
        let mut count = 0;
        while let Some(request) = requests.try_next() {
            assert_eq!(request, Request::EpochRotation);
            count += 1;
        }
        count
    }

    #[test_traced]
    fn test_seed_from_previous() {
        let executor = deterministic::Runner::timed(Duration::from_secs(10));
        executor.start(|context| async move {
            let first = mocks::pod(1, 6);
            let second = mocks::pod(2, 6);
            let registry = mocks::Registry::new(epoch(1), vec![first.clone()]);
            registry.advance(epoch(2), vec![second]);

            let view = View::default();
            let (_requests, _errors) = start(&context, &registry, &view);
            context.sleep(Duration::from_millis(100)).await;

            let snapshot = view.snapshot();
            assert_eq!(snapshot.pods_at(0).unwrap(), &index(vec![first]));
            assert!(snapshot.pods_at(1).unwrap().is_empty());
        });
    }

    #[test_traced]
    fn test_rotate_once_per_hash() {
        let executor = deterministic::Runner::timed(Duration::from_secs(10));
        executor.start(|context| async move {
            let first = mocks::pod(1, 6);
            let second = mocks::pod(2, 6);
            let registry = mocks::Registry::new(epoch(1), vec![first.clone()]);
            registry.advance(epoch(2), vec![second.clone()]);

            let view = View::default();
            let (requests, mut errors) = start(&context, &registry, &view);

            // Each poll waits 50 blocks of 10ms
            context.sleep(Duration::from_millis(1_600)).await;
            let snapshot = view.snapshot();
            assert_eq!(snapshot.pods_at(0).unwrap(), &index(vec![second.clone()]));
            assert_eq!(snapshot.pods_at(1).unwrap(), &index(vec![first]));

            // Later polls observe the same hash and leave the view alone
            assert_eq!(registry.pod_reads(), 1);
            assert_eq!(rotations(&requests), 3);
            assert!(errors.try_next().is_err());
        });
    }

    #[test_traced]
    fn test_interval_floor() {
        let executor = deterministic::Runner::timed(Duration::from_secs(10));
        executor.start(|context| async move {
            let registry = mocks::Registry::new(epoch(1), vec![mocks::pod(1, 6)]);
            registry.set_interval(5);

            let view = View::default();
            let (requests, _errors) = start(&context, &registry, &view);

            // 5 blocks are clamped to 50, so nothing happens before 500ms
            context.sleep(Duration::from_millis(400)).await;
            assert_eq!(rotations(&requests), 0);
            context.sleep(Duration::from_millis(200)).await;
            assert_eq!(rotations(&requests), 1);
        });
    }

    #[test_traced]
    fn test_longer_interval() {
        let executor = deterministic::Runner::timed(Duration::from_secs(10));
        executor.start(|context| async move {
            let registry = mocks::Registry::new(epoch(1), vec![mocks::pod(1, 6)]);
            registry.set_interval(100);

            let view = View::default();
            let (requests, _errors) = start(&context, &registry, &view);

            context.sleep(Duration::from_millis(900)).await;
            assert_eq!(rotations(&requests), 0);
            context.sleep(Duration::from_millis(200)).await;
            assert_eq!(rotations(&requests), 1);
        });
    }

    #[test_traced]
    fn test_poll_failure_keeps_view() {
        let executor = deterministic::Runner::timed(Duration::from_secs(10));
        executor.start(|context| async move {
            let first = mocks::pod(1, 6);
            let registry = mocks::Registry::new(epoch(1), vec![first.clone()]);
            registry.advance(epoch(2), vec![mocks::pod(2, 6)]);

            let view = View::default();
            let (requests, mut errors) = start(&context, &registry, &view);
            context.sleep(Duration::from_millis(100)).await;
            registry.fail_epochs(true);

            context.sleep(Duration::from_millis(500)).await;
            assert!(matches!(errors.try_next(), Ok(Some(Error::Registry(_)))));
            let snapshot = view.snapshot();
            assert_eq!(snapshot.pods_at(0).unwrap(), &index(vec![first]));

            // The rotation hint is still sent
            assert_eq!(rotations(&requests), 1);
            assert!(!registry.calls().contains(&Call::NextEpoch));
        });
    }

    #[test_traced]
    fn test_stop_during_poll_keeps_view() {
        let executor = deterministic::Runner::timed(Duration::from_secs(10));
        executor.start(|context| async move {
            let first = mocks::pod(1, 6);
            let registry = mocks::Registry::new(epoch(1), vec![first.clone()]);
            registry.advance(epoch(2), vec![mocks::pod(2, 6)]);
            registry.stall_pods(true);

            let view = View::default();
            let (requests, _errors) = start(&context, &registry, &view);

            // The first poll sees the new hash and stalls reading its pods
            context.sleep(Duration::from_millis(600)).await;
            assert_eq!(registry.pod_reads(), 1);

            // Stopping does not wait for the read, and the rotation is dropped
            context.clone().stop(0, None).await.unwrap();
            let snapshot = view.snapshot();
            assert_eq!(snapshot.pods_at(0).unwrap(), &index(vec![first]));
            assert!(snapshot.pods_at(1).unwrap().is_empty());
            assert_eq!(rotations(&requests), 0);
            assert!(context.encode().contains("syncer_rotations_total 0"));
        });
    }
}
