use crate::types::{OrderId, PodHash};
use thiserror::Error;

/// Errors that can occur while admitting or processing requests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid order fragment mapping")]
    InvalidOrderFragmentMapping,
    #[error("invalid number of pods at depth {0}")]
    InvalidNumberOfPods(usize),
    #[error("invalid number of order fragments for pod {pod}: {count}")]
    InvalidNumberOfOrderFragments { pod: PodHash, count: usize },
    #[error("unknown pod: {0}")]
    UnknownPod(PodHash),
    #[error("invalid epoch depth: expected {expected}, found {found}")]
    InvalidEpochDepth { expected: usize, found: u32 },
    #[error("unsupported epoch depth: {0}")]
    UnsupportedEpochDepth(usize),
    #[error("order id mismatch: expected {expected}, found {found}")]
    OrderIdMismatch { expected: OrderId, found: OrderId },
    #[error("invalid order fragment index for pod {pod}: {index}")]
    InvalidOrderFragmentIndex { pod: PodHash, index: u64 },
    #[error("cannot open order fragments: {0}")]
    CannotOpenOrderFragments(OrderId),
    #[error("registry error: {0}")]
    Registry(String),
    #[error("discovery error: {0}")]
    Discovery(String),
    #[error("delivery error: {0}")]
    Delivery(String),
    #[error("timeout")]
    Timeout,
    #[error("request queue closed")]
    Closed,
}

impl Error {
    /// Returns true if the error was caused by the submitted request
    /// rather than by the ingress or one of its collaborators.
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            Error::InvalidOrderFragmentMapping
                | Error::InvalidNumberOfPods(_)
                | Error::InvalidNumberOfOrderFragments { .. }
                | Error::UnknownPod(_)
                | Error::InvalidEpochDepth { .. }
                | Error::UnsupportedEpochDepth(_)
                | Error::OrderIdMismatch { .. }
                | Error::InvalidOrderFragmentIndex { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::InvalidOrderFragmentMapping.is_invalid_request());
        assert!(Error::UnsupportedEpochDepth(2).is_invalid_request());
        assert!(Error::UnknownPod(PodHash::default()).is_invalid_request());
        assert!(!Error::CannotOpenOrderFragments(OrderId::default()).is_invalid_request());
        assert!(!Error::Registry("unreachable".into()).is_invalid_request());
        assert!(!Error::Timeout.is_invalid_request());
        assert!(!Error::Closed.is_invalid_request());
    }
}
