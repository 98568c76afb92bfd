//! Re-resolve a query on a fixed interval until its value settles.
//!
//! A poll holds a cache subscription for its whole life, so invalidations
//! of the polled key re-resolve immediately and the poller sees them. Each
//! round waits for the latest resolution to land, checks the predicate and
//! then sleeps before asking the cache to refetch. Concurrent polls of the
//! same key share the cache's de-duplication.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{QueryCache, QueryData, QueryKey, Resolver};
use crate::config::PollingConfig;
use crate::error::TransportError;

/// Timing of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Delay between a resolution landing and the next one being issued.
    pub interval: Duration,
    /// Stop after this many resolutions even if the predicate still holds.
    pub max_attempts: Option<u32>,
}

impl From<PollingConfig> for PollOptions {
    fn from(config: PollingConfig) -> Self {
        Self {
            interval: config.interval,
            max_attempts: config.max_attempts,
        }
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        PollingConfig::default().into()
    }
}

/// How a poll ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<V> {
    /// The predicate no longer holds for this value.
    Settled(V),
    /// A resolution failed; polls do not retry.
    Failed(TransportError),
    /// `max_attempts` resolutions happened and the predicate still held.
    AttemptsExhausted(V),
    /// The poll task stopped without an outcome.
    Cancelled,
}

/// Running poll. Dropping it cancels the next scheduled resolution.
#[derive(Debug)]
pub struct PollHandle<V> {
    key: QueryKey,
    task: Option<JoinHandle<PollOutcome<V>>>,
}

impl<V> PollHandle<V> {
    /// Key being polled.
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Whether the poll has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the poll to end.
    pub async fn finished(mut self) -> PollOutcome<V> {
        match self.task.take() {
            Some(task) => task.await.unwrap_or(PollOutcome::Cancelled),
            None => PollOutcome::Cancelled,
        }
    }
}

impl<V> Drop for PollHandle<V> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            // Resolutions already handed to the cache keep running; only the
            // scheduling loop stops.
            task.abort();
            debug!(key = %self.key, "Poll cancelled");
        }
    }
}

/// Spawns polls against a query cache.
pub struct PollScheduler<V> {
    cache: QueryCache<V>,
}

impl<V> Clone for PollScheduler<V> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<V> std::fmt::Debug for PollScheduler<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler").finish_non_exhaustive()
    }
}

impl<V> PollScheduler<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub const fn new(cache: QueryCache<V>) -> Self {
        Self { cache }
    }

    /// Poll `key` while `keep_polling` holds for the latest value.
    ///
    /// The first round uses the cached value if it is fresh; otherwise it
    /// waits for the resolution that [`QueryCache::read`] starts.
    pub fn poll<F>(
        &self,
        key: QueryKey,
        resolver: Resolver<V>,
        options: PollOptions,
        keep_polling: F,
    ) -> PollHandle<V>
    where
        F: Fn(&V) -> bool + Send + 'static,
    {
        let cache = self.cache.clone();
        let subscription = cache.read(key.clone(), resolver);

        let task = tokio::spawn({
            let key = key.clone();
            async move {
                let mut handled = 0;
                let mut attempts: u32 = 0;

                loop {
                    let snap = subscription
                        .wait_for(|s| !s.is_fetching && s.resolved_seq > handled)
                        .await;
                    handled = snap.resolved_seq;
                    attempts = attempts.saturating_add(1);

                    match snap.data {
                        QueryData::Value(value) => {
                            if !keep_polling(&value) {
                                debug!(key = %key, attempts, "Poll settled");
                                return PollOutcome::Settled(value);
                            }
                            if options.max_attempts.is_some_and(|max| attempts >= max) {
                                debug!(key = %key, attempts, "Poll gave up");
                                return PollOutcome::AttemptsExhausted(value);
                            }
                        }
                        QueryData::Failed { error, .. } => {
                            debug!(key = %key, attempts, error = %error, "Poll failed");
                            return PollOutcome::Failed(error);
                        }
                        QueryData::Empty => {}
                    }

                    tokio::time::sleep(options.interval).await;
                    cache.refetch(&key);
                }
            }
        });

        PollHandle {
            key,
            task: Some(task),
        }
    }
}
