//! Read-side checks applied to a submission before anything is enqueued.

use crate::{
    epoch::Snapshot,
    types::{OrderFragmentMapping, OrderId},
    Error,
};
use std::collections::BTreeSet;

/// Check `mappings` against the pods of `snapshot`.
///
/// Returns the first violation found, walking depths in order and pods in
/// hash order.
pub fn validate(
    order_id: &OrderId,
    mappings: &[OrderFragmentMapping],
    snapshot: &Snapshot,
) -> Result<(), Error> {
    if mappings.is_empty() {
        return Err(Error::InvalidOrderFragmentMapping);
    }
    for (depth, mapping) in mappings.iter().enumerate() {
        validate_mapping(order_id, depth, mapping, snapshot)?;
    }
    Ok(())
}

fn validate_mapping(
    order_id: &OrderId,
    depth: usize,
    mapping: &OrderFragmentMapping,
    snapshot: &Snapshot,
) -> Result<(), Error> {
    let pods = snapshot.pods_at(depth)?;
    if mapping.is_empty() || mapping.len() > pods.len() {
        return Err(Error::InvalidNumberOfPods(depth));
    }
    for (hash, fragments) in mapping {
        let Some(pod) = pods.get(hash) else {
            return Err(Error::UnknownPod(*hash));
        };
        let count = fragments.len();
        if count < pod.threshold() || count > pod.darknodes.len() {
            return Err(Error::InvalidNumberOfOrderFragments { pod: *hash, count });
        }

        let mut seen = BTreeSet::new();
        for fragment in fragments {
            if fragment.epoch_depth as usize != depth {
                return Err(Error::InvalidEpochDepth {
                    expected: depth,
                    found: fragment.epoch_depth,
                });
            }
            if fragment.order_id != *order_id {
                return Err(Error::OrderIdMismatch {
                    expected: *order_id,
                    found: fragment.order_id,
                });
            }
            let index = fragment.index;
            if index == 0 || index > pod.darknodes.len() as u64 || !seen.insert(index) {
                return Err(Error::InvalidOrderFragmentIndex { pod: *hash, index });
            }
        }
    }
    Ok(())
}
