//! Writes with cascading invalidation.

use std::future::Future;

use tracing::{debug, instrument, warn};

use crate::cache::{QueryCache, QueryKey};
use crate::error::{ClientError, TransportError};

/// Runs gateway writes and invalidates the queries they affect.
///
/// Holds no state beyond the cache handle; concurrent mutations are neither
/// serialized nor de-duplicated.
pub struct MutationExecutor<V> {
    cache: QueryCache<V>,
}

impl<V> Clone for MutationExecutor<V> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<V> std::fmt::Debug for MutationExecutor<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationExecutor").finish_non_exhaustive()
    }
}

impl<V> MutationExecutor<V>
where
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub const fn new(cache: QueryCache<V>) -> Self {
        Self { cache }
    }

    /// Await `call`; on success invalidate every key under `affects`.
    ///
    /// # Errors
    ///
    /// Returns the gateway error unchanged. Nothing is invalidated on failure.
    #[instrument(skip_all, fields(operation = operation))]
    pub async fn run<T, Fut>(
        &self,
        operation: &'static str,
        call: Fut,
        affects: &[QueryKey],
    ) -> Result<T, ClientError>
    where
        Fut: Future<Output = Result<T, TransportError>>,
    {
        match call.await {
            Ok(output) => {
                self.cache.invalidate(affects);
                debug!(invalidated = affects.len(), "Mutation succeeded");
                Ok(output)
            }
            Err(e) => {
                warn!(error = %e, "Mutation failed");
                Err(e.into())
            }
        }
    }
}
