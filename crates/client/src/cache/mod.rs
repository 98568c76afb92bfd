//! Query cache keyed by logical query identity.
//!
//! # Model
//!
//! - Each [`QueryKey`] owns one entry; the cache is the only writer
//! - Every resolution gets a per-key sequence number when it is issued; a
//!   result is applied only if its number is still the highest issued, so a
//!   slow resolution can never overwrite a newer one
//! - Concurrent reads of a key share one in-flight resolution
//! - Invalidation marks entries stale but keeps their value on display
//!   until a newer resolution lands (stale-while-revalidate)
//! - Observed entries re-resolve on invalidation; unobserved entries wait
//!   for their next read
//!
//! Entries are never evicted. A key keeps its last snapshot after its
//! observers detach, so a later read can show it while re-resolving. Memory
//! grows with the number of distinct keys read (one per draft viewed), which
//! suits short-lived consumers such as the CLI.
//!
//! Resolutions run as spawned tokio tasks, so reads must happen inside a
//! runtime. Entry state sits behind a short `std::sync::Mutex` that is never
//! held across an await.

mod entry;
mod key;
mod subscription;

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tracing::debug;

pub use entry::{QueryData, QuerySnapshot, QueryStatus};
pub use key::{KeyPart, QueryKey};
pub use subscription::Subscription;

use crate::error::{ClientError, TransportError};

/// Produces a fresh value for a key.
///
/// Remembered by the entry so invalidation and polling can re-resolve.
pub type Resolver<V> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<V, TransportError>> + Send + Sync>;

/// Wrap a closure returning a future into a [`Resolver`].
pub fn resolver<V, F, Fut>(f: F) -> Resolver<V>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, TransportError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Proof that a resolution was issued for a key.
///
/// Passed back to [`QueryCache::set_result`] with the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionTicket {
    key: QueryKey,
    seq: u64,
}

impl ResolutionTicket {
    /// Key being resolved.
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Sequence number, unique and increasing per key.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }
}

struct Entry<V> {
    tx: watch::Sender<QuerySnapshot<V>>,
    resolver: Option<Resolver<V>>,
    /// Highest sequence number issued.
    issued: u64,
    /// Sequence number of the resolution readers may join, if any.
    in_flight: Option<u64>,
    /// `issued` at the time of the last invalidation.
    invalidated_through: u64,
    observers: usize,
}

impl<V: Clone> Entry<V> {
    fn new(key: QueryKey) -> Self {
        let (tx, _) = watch::channel(QuerySnapshot::new(key));
        Self {
            tx,
            resolver: None,
            issued: 0,
            in_flight: None,
            invalidated_through: 0,
            observers: 0,
        }
    }

    fn needs_resolution(&self) -> bool {
        self.in_flight.is_none() && !self.tx.borrow().is_fresh()
    }

    fn issue(&mut self, key: &QueryKey) -> ResolutionTicket {
        self.issued += 1;
        self.in_flight = Some(self.issued);
        self.tx.send_modify(|snap| snap.is_fetching = true);
        debug!(key = %key, seq = self.issued, "Issued query resolution");
        ResolutionTicket {
            key: key.clone(),
            seq: self.issued,
        }
    }
}

/// Cache of query results, shared by cloning.
pub struct QueryCache<V> {
    inner: Arc<Mutex<HashMap<QueryKey, Entry<V>>>>,
}

impl<V> Clone for QueryCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for QueryCache<V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<V> std::fmt::Debug for QueryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache").finish_non_exhaustive()
    }
}

impl<V> QueryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry<V>>> {
        // Critical sections never panic mid-update, so a poisoned lock still
        // guards consistent data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to `key`, resolving it if no fresh value exists.
    ///
    /// Returns immediately; the subscription shows whatever the entry holds
    /// (possibly idle or stale). At most one resolution per key is in flight
    /// on behalf of readers, so concurrent subscribers share it. `resolver`
    /// replaces any resolver previously registered for the key.
    pub fn read(&self, key: QueryKey, resolver: Resolver<V>) -> Subscription<V> {
        let (rx, ticket) = {
            let mut entries = self.entries();
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(key.clone()));
            entry.resolver = Some(Arc::clone(&resolver));
            entry.observers += 1;
            let ticket = entry.needs_resolution().then(|| entry.issue(&key));
            (entry.tx.subscribe(), ticket)
        };

        if let Some(ticket) = ticket {
            self.spawn_resolution(ticket, &resolver);
        }

        Subscription::new(key, rx, self.clone())
    }

    /// Mark every entry under the given key prefixes stale.
    ///
    /// Values stay in place. Observed entries re-resolve right away with a
    /// new resolution that supersedes any in flight; the rest re-resolve on
    /// their next read. Marking an already stale entry keeps its original
    /// `stale_at`.
    pub fn invalidate(&self, keys: &[QueryKey]) {
        let now = Utc::now();
        let mut issued = Vec::new();

        {
            let mut entries = self.entries();
            for (key, entry) in entries
                .iter_mut()
                .filter(|(key, _)| keys.iter().any(|prefix| key.starts_with(prefix)))
            {
                entry.invalidated_through = entry.issued;
                entry.tx.send_if_modified(|snap| {
                    if snap.stale_at.is_some() {
                        return false;
                    }
                    snap.stale_at = Some(now);
                    true
                });

                let resolver = entry.resolver.clone().filter(|_| entry.observers > 0);
                if let Some(resolver) = resolver {
                    issued.push((entry.issue(key), resolver));
                } else {
                    // Anything in flight predates the invalidation; the next
                    // read must not join it.
                    entry.in_flight = None;
                }

                debug!(key = %key, observers = entry.observers, "Invalidated query");
            }
        }

        for (ticket, resolver) in issued {
            self.spawn_resolution(ticket, &resolver);
        }
    }

    /// Re-resolve `key` with its registered resolver.
    ///
    /// Joins an in-flight resolution instead of issuing a second one.
    /// Returns `false` if the key was never read.
    pub fn refetch(&self, key: &QueryKey) -> bool {
        let (ticket, resolver) = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(key) else {
                return false;
            };
            let Some(resolver) = entry.resolver.clone() else {
                return false;
            };
            if entry.in_flight.is_some() {
                return true;
            }
            (entry.issue(key), resolver)
        };

        self.spawn_resolution(ticket, &resolver);
        true
    }

    /// Issue a new resolution for `key` without running a resolver.
    ///
    /// For callers that drive the resolution themselves and report back via
    /// [`set_result`](Self::set_result).
    pub fn begin(&self, key: &QueryKey) -> ResolutionTicket {
        let mut entries = self.entries();
        entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(key.clone()))
            .issue(key)
    }

    /// Apply the outcome of a resolution.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Stale`] and leaves the entry untouched if a
    /// newer resolution has been issued for the key since `ticket`.
    pub fn set_result(
        &self,
        ticket: &ResolutionTicket,
        outcome: Result<V, TransportError>,
    ) -> Result<(), ClientError> {
        let mut entries = self.entries();
        let latest = entries.get(&ticket.key).map_or(0, |entry| entry.issued);
        let Some(entry) = entries
            .get_mut(&ticket.key)
            .filter(|entry| entry.issued == ticket.seq)
        else {
            return Err(ClientError::Stale {
                key: ticket.key.clone(),
                seq: ticket.seq,
                latest,
            });
        };

        if entry.in_flight == Some(ticket.seq) {
            entry.in_flight = None;
        }
        let still_stale = ticket.seq <= entry.invalidated_through;
        let now = Utc::now();

        entry.tx.send_modify(|snap| {
            snap.is_fetching = false;
            snap.resolved_seq = ticket.seq;
            match outcome {
                Ok(value) => {
                    snap.data = QueryData::Value(value);
                    snap.updated_at = Some(now);
                    if !still_stale {
                        snap.stale_at = None;
                    }
                }
                Err(error) => {
                    let last_value = snap.data.take_value();
                    snap.data = QueryData::Failed { error, last_value };
                }
            }
        });

        debug!(key = %ticket.key, seq = ticket.seq, still_stale, "Applied query resolution");
        Ok(())
    }

    /// Current state of `key` without subscribing.
    #[must_use]
    pub fn snapshot(&self, key: &QueryKey) -> Option<QuerySnapshot<V>> {
        self.entries().get(key).map(|entry| entry.tx.borrow().clone())
    }

    /// Number of live subscriptions for `key`.
    #[must_use]
    pub fn observers(&self, key: &QueryKey) -> usize {
        self.entries().get(key).map_or(0, |entry| entry.observers)
    }

    fn detach(&self, key: &QueryKey) {
        if let Some(entry) = self.entries().get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
        }
    }

    fn spawn_resolution(&self, ticket: ResolutionTicket, resolver: &Resolver<V>) {
        let resolution = resolver();
        let cache = self.clone();
        tokio::spawn(async move {
            // A panicking resolver still has to release the entry, or every
            // later read would join a resolution that never lands.
            let outcome = AssertUnwindSafe(resolution)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(TransportError::Network("query resolver panicked".into())));
            if let Err(e) = cache.set_result(&ticket, outcome) {
                debug!(error = %e, "Dropped superseded query resolution");
            }
        });
    }
}
