//! Cache entry state as seen by subscribers.

use chrono::{DateTime, Utc};

use super::QueryKey;
use crate::error::TransportError;

/// Lifecycle status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    /// Never resolved and nothing in flight.
    Idle,
    /// A resolution is in flight.
    Loading,
    /// Last resolution succeeded.
    Success,
    /// Last resolution failed.
    Error,
}

/// Data held by a cache entry.
///
/// A failed resolution keeps the last good value next to the error, so a
/// view can show both. There is no way to build an error without a message
/// or a success without a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryData<V> {
    /// Never resolved.
    Empty,
    /// Last resolution succeeded.
    Value(V),
    /// Last resolution failed.
    Failed {
        error: TransportError,
        last_value: Option<V>,
    },
}

impl<V> QueryData<V> {
    /// Most recent good value, if any.
    #[must_use]
    pub const fn value(&self) -> Option<&V> {
        match self {
            Self::Value(v) => Some(v),
            Self::Failed { last_value, .. } => last_value.as_ref(),
            Self::Empty => None,
        }
    }

    /// Error of the last resolution, if it failed.
    #[must_use]
    pub const fn error(&self) -> Option<&TransportError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Value(_) | Self::Empty => None,
        }
    }

    pub(crate) fn take_value(&mut self) -> Option<V> {
        match std::mem::replace(self, Self::Empty) {
            Self::Value(v) => Some(v),
            Self::Failed { last_value, .. } => last_value,
            Self::Empty => None,
        }
    }
}

/// Point-in-time view of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySnapshot<V> {
    pub key: QueryKey,
    pub data: QueryData<V>,
    /// A resolution is in flight.
    pub is_fetching: bool,
    /// When the last successful resolution landed.
    pub updated_at: Option<DateTime<Utc>>,
    /// When the entry was first invalidated since its last fresh value.
    pub stale_at: Option<DateTime<Utc>>,
    /// Sequence number of the last applied resolution (0 before the first).
    pub resolved_seq: u64,
}

impl<V> QuerySnapshot<V> {
    pub(crate) const fn new(key: QueryKey) -> Self {
        Self {
            key,
            data: QueryData::Empty,
            is_fetching: false,
            updated_at: None,
            stale_at: None,
            resolved_seq: 0,
        }
    }

    /// Derived lifecycle status.
    #[must_use]
    pub const fn status(&self) -> QueryStatus {
        if self.is_fetching {
            return QueryStatus::Loading;
        }
        match self.data {
            QueryData::Empty => QueryStatus::Idle,
            QueryData::Value(_) => QueryStatus::Success,
            QueryData::Failed { .. } => QueryStatus::Error,
        }
    }

    /// Most recent good value, if any (also while stale or errored).
    #[must_use]
    pub const fn value(&self) -> Option<&V> {
        self.data.value()
    }

    /// Error of the last resolution, if it failed.
    #[must_use]
    pub const fn error(&self) -> Option<&TransportError> {
        self.data.error()
    }

    /// Whether the entry was invalidated and not yet refreshed.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        self.stale_at.is_some()
    }

    /// Whether the entry holds a value that can be served without
    /// resolving.
    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        matches!(self.data, QueryData::Value(_)) && !self.is_stale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_key;

    #[test]
    fn test_status_derivation() {
        let mut snap: QuerySnapshot<u32> = QuerySnapshot::new(query_key!("templates"));
        assert_eq!(snap.status(), QueryStatus::Idle);

        snap.is_fetching = true;
        assert_eq!(snap.status(), QueryStatus::Loading);

        snap.is_fetching = false;
        snap.data = QueryData::Value(1);
        assert_eq!(snap.status(), QueryStatus::Success);
        assert!(snap.is_fresh());

        snap.data = QueryData::Failed {
            error: TransportError::Network("offline".to_string()),
            last_value: Some(1),
        };
        assert_eq!(snap.status(), QueryStatus::Error);
        assert_eq!(snap.value(), Some(&1));
        assert!(!snap.is_fresh());
    }

    #[test]
    fn test_take_value_keeps_last_good() {
        let mut data = QueryData::Failed {
            error: TransportError::Network("offline".to_string()),
            last_value: Some("old"),
        };
        assert_eq!(data.take_value(), Some("old"));
        assert_eq!(data, QueryData::Empty);
    }
}
