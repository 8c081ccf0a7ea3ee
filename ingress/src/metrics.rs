use commonware_runtime::Metrics as RuntimeMetrics;
use prometheus_client::{
    encoding::{EncodeLabelSet, EncodeLabelValue},
    metrics::{counter::Counter, family::Family, gauge::Gauge},
};

/// Label for per-request-kind metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct Kind {
    /// Request variant
    pub kind: String,
}

impl Kind {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
        }
    }
}

/// Outcome of an operation
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Status {
    Success,
    Failure,
}

impl Status {
    pub fn of<T, E>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(_) => Status::Failure,
        }
    }
}

/// Label for per-request-kind outcomes
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct Outcome {
    pub kind: String,
    pub status: Status,
}

/// Label for outcomes without a kind
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StatusLabel {
    pub status: Status,
}

/// Metrics for the [`Ingress`](crate::Ingress)
#[derive(Default)]
pub struct Metrics {
    /// Number of requests enqueued by kind
    pub enqueued: Family<Kind, Counter>,
    /// Number of requests processed by kind and status
    pub processed: Family<Outcome, Counter>,
    /// Number of epoch rotations applied to the view
    pub rotations: Counter,
    /// Number of fragment mappings fanned out by status
    pub fanouts: Family<StatusLabel, Counter>,
    /// Number of darknode deliveries by status
    pub deliveries: Family<StatusLabel, Counter>,
    /// Number of pods in the current epoch
    pub pods: Gauge,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given context.
    pub fn init<E: RuntimeMetrics>(context: E) -> Self {
        let metrics = Metrics::default();
        context.register(
            "enqueued",
            "Number of requests enqueued by kind",
            metrics.enqueued.clone(),
        );
        context.register(
            "processed",
            "Number of requests processed by kind and status",
            metrics.processed.clone(),
        );
        context.register(
            "rotations",
            "Number of epoch rotations applied to the view",
            metrics.rotations.clone(),
        );
        context.register(
            "fanouts",
            "Number of fragment mappings fanned out by status",
            metrics.fanouts.clone(),
        );
        context.register(
            "deliveries",
            "Number of darknode deliveries by status",
            metrics.deliveries.clone(),
        );
        context.register(
            "pods",
            "Number of pods in the current epoch",
            metrics.pods.clone(),
        );
        metrics
    }

    pub fn enqueued(&self, kind: &str) {
        self.enqueued.get_or_create(&Kind::new(kind)).inc();
    }

    pub fn processed<T, E>(&self, kind: &str, result: &Result<T, E>) {
        let label = Outcome {
            kind: kind.to_string(),
            status: Status::of(result),
        };
        self.processed.get_or_create(&label).inc();
    }

    pub fn fanout<T, E>(&self, result: &Result<T, E>) {
        let label = StatusLabel {
            status: Status::of(result),
        };
        self.fanouts.get_or_create(&label).inc();
    }

    pub fn delivery<T, E>(&self, result: &Result<T, E>) {
        let label = StatusLabel {
            status: Status::of(result),
        };
        self.deliveries.get_or_create(&label).inc();
    }
}
