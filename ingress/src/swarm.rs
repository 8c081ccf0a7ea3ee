//! Caching of darknode address lookups.

use crate::{
    types::{Address, MultiAddress},
    Error, Swarmer,
};
use commonware_runtime::Clock;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};
use tracing::trace;

/// [Swarmer] that remembers successful lookups for `ttl`.
///
/// Failed lookups are not cached.
#[derive(Clone)]
pub struct Cache<E: Clock, S: Swarmer> {
    context: E,
    inner: S,
    ttl: Duration,
    entries: Arc<Mutex<HashMap<Address, (MultiAddress, SystemTime)>>>,
}

impl<E: Clock, S: Swarmer> Cache<E, S> {
    pub fn new(context: E, inner: S, ttl: Duration) -> Self {
        Self {
            context,
            inner,
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn get(&self, address: &Address) -> Option<MultiAddress> {
        let now = self.context.current();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(address) {
            Some((resolved, expiry)) if now < *expiry => Some(resolved.clone()),
            Some(_) => {
                entries.remove(address);
                None
            }
            None => None,
        }
    }

    fn insert(&self, address: Address, resolved: MultiAddress) {
        let now = self.context.current();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        // Drop entries that expired without being looked up again
        entries.retain(|_, (_, expiry)| now < *expiry);
        entries.insert(address, (resolved, now + self.ttl));
    }
}

impl<E: Clock, S: Swarmer> Swarmer for Cache<E, S> {
    async fn query(&self, address: Address) -> Result<MultiAddress, Error> {
        if let Some(resolved) = self.get(&address) {
            trace!(%address, %resolved, "cache hit");
            return Ok(resolved);
        }
        let resolved = self.inner.query(address).await?;
        self.insert(address, resolved.clone());
        Ok(resolved)
    }
}
