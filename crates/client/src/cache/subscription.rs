//! Change notifications for a single cache entry.

use tokio::sync::watch;

use super::{QueryCache, QueryKey, QuerySnapshot};

/// A live view of one cache entry.
///
/// Holding a subscription marks the key as observed: invalidations
/// re-resolve it immediately instead of waiting for the next read. Dropping
/// the subscription detaches it; no notification reaches a dropped
/// subscriber.
pub struct Subscription<V>
where
    V: Clone + Send + Sync + 'static,
{
    key: QueryKey,
    rx: watch::Receiver<QuerySnapshot<V>>,
    cache: QueryCache<V>,
}

impl<V> Subscription<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub(super) const fn new(
        key: QueryKey,
        rx: watch::Receiver<QuerySnapshot<V>>,
        cache: QueryCache<V>,
    ) -> Self {
        Self { key, rx, cache }
    }

    /// Key this subscription observes.
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Current state of the entry.
    #[must_use]
    pub fn current(&self) -> QuerySnapshot<V> {
        self.rx.borrow().clone()
    }

    /// Wait for the next change and return the new state.
    pub async fn changed(&mut self) -> QuerySnapshot<V> {
        // The sender lives in the cache entry, which outlives this
        // subscription because we hold the cache.
        let _ = self.rx.changed().await;
        self.rx.borrow_and_update().clone()
    }

    /// Wait until no resolution is in flight and return that state.
    pub async fn settled(&self) -> QuerySnapshot<V> {
        self.wait_for(|snap| !snap.is_fetching).await
    }

    /// Wait until `predicate` holds for the entry and return that state.
    pub async fn wait_for<F>(&self, mut predicate: F) -> QuerySnapshot<V>
    where
        F: FnMut(&QuerySnapshot<V>) -> bool,
    {
        let mut rx = self.rx.clone();
        let result = rx.wait_for(|snap| predicate(snap)).await.map(|snap| snap.clone());
        result.unwrap_or_else(|_| self.current())
    }
}

impl<V> Drop for Subscription<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.cache.detach(&self.key);
    }
}

impl<V> std::fmt::Debug for Subscription<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
