//! Current and previous pod topologies.

use crate::{types::Pods, Error};
use std::sync::{Arc, RwLock};

/// Immutable pair of pod sets observed at one point in time.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    current: Pods,
    previous: Pods,
}

impl Snapshot {
    pub fn new(current: Pods, previous: Pods) -> Self {
        Self { current, previous }
    }

    /// Pods at `depth` (0 is the current epoch, 1 the previous one).
    pub fn pods_at(&self, depth: usize) -> Result<&Pods, Error> {
        match depth {
            0 => Ok(&self.current),
            1 => Ok(&self.previous),
            _ => Err(Error::UnsupportedEpochDepth(depth)),
        }
    }
}

/// Shared handle to the latest [Snapshot].
///
/// Readers take a pointer to the snapshot and release the lock before doing
/// any work with it, so a rotation is observed either entirely or not at all.
#[derive(Clone, Default)]
pub struct View {
    inner: Arc<RwLock<Arc<Snapshot>>>,
}

impl View {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        // The lock only guards a pointer swap, so a poisoned lock still holds
        // a complete snapshot.
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the snapshot wholesale.
    pub fn seed(&self, snapshot: Snapshot) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(snapshot);
    }

    /// Shift `current` into `previous` and install `pods` as `current`.
    pub fn rotate(&self, pods: Pods) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let previous = guard.current.clone();
        *guard = Arc::new(Snapshot::new(pods, previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{index, Pod, PodHash};

    fn pods(seed: u8) -> Pods {
        index(vec![Pod {
            hash: PodHash::new([seed; 32]),
            darknodes: vec![],
        }])
    }

    #[test]
    fn test_pods_at() {
        let snapshot = Snapshot::new(pods(1), pods(2));
        assert_eq!(snapshot.pods_at(0).unwrap(), &pods(1));
        assert_eq!(snapshot.pods_at(1).unwrap(), &pods(2));
        assert_eq!(snapshot.pods_at(2), Err(Error::UnsupportedEpochDepth(2)));
    }

    #[test]
    fn test_rotate() {
        let view = View::new(Snapshot::new(pods(1), Pods::new()));
        let before = view.snapshot();
        view.rotate(pods(2));
        view.rotate(pods(3));

        // Earlier readers keep the pair they observed
        assert_eq!(before.pods_at(0).unwrap(), &pods(1));
        assert!(before.pods_at(1).unwrap().is_empty());

        let after = view.snapshot();
        assert_eq!(after.pods_at(0).unwrap(), &pods(3));
        assert_eq!(after.pods_at(1).unwrap(), &pods(2));
    }

    #[test]
    fn test_seed() {
        let view = View::default();
        assert!(view.snapshot().pods_at(0).unwrap().is_empty());
        view.seed(Snapshot::new(pods(4), Pods::new()));
        assert_eq!(view.snapshot().pods_at(0).unwrap(), &pods(4));
        assert!(view.snapshot().pods_at(1).unwrap().is_empty());
    }
}
