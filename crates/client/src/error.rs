//! Unified error handling for the client.

use podforge_core::{DraftSpecError, Provider, ShopDomainError};
use thiserror::Error;

use crate::cache::QueryKey;
use crate::connection::ProviderAction;

/// Failure reported by the transport gateway.
///
/// Stored on cache entries, so it only carries owned strings and is cheap
/// to clone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Server answered with a non-2xx status.
    ///
    /// `detail` is the server-provided message, or `API error {status}` when
    /// the body has none.
    #[error("{detail}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message to show the operator.
        detail: String,
    },

    /// Request never produced a response.
    #[error("Network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape.
    #[error("Response error: {0}")]
    Decode(String),
}

impl TransportError {
    /// Build a status error, falling back to the generic message.
    #[must_use]
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        let detail = detail
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("API error {status}"));
        Self::Status { status, detail }
    }

    /// HTTP status code, if the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network(_) | Self::Decode(_) => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Input rejected before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Shop domain failed normalization.
    #[error("Please enter a valid shop domain (example or example.myshopify.com): {0}")]
    ShopDomain(#[from] ShopDomainError),

    /// Gelato key is blank.
    #[error("API key must not be empty")]
    EmptyApiKey,

    /// A draft spec failed the server's input rules.
    #[error("Invalid draft: {0}")]
    Draft(#[from] DraftSpecError),

    /// Bulk create called with nothing to create.
    #[error("No drafts to create")]
    NoDrafts,

    /// Upload called without files.
    #[error("No files to upload")]
    NoFiles,

    /// Another action for the provider is still in flight.
    #[error("{} already has an action in progress", .provider.display_name())]
    Busy {
        /// Provider with the pending action.
        provider: Provider,
    },

    /// Disconnect or test requested for a disconnected provider.
    #[error("{} is not connected", .provider.display_name())]
    NotConnected {
        /// Provider in question.
        provider: Provider,
    },

    /// The provider has no such action (e.g. testing Gelato).
    #[error("{action} is not supported for {}", .provider.display_name())]
    Unsupported {
        /// Provider in question.
        provider: Provider,
        /// Requested action.
        action: ProviderAction,
    },

    /// Confirm called without a prior disconnect request.
    #[error("No disconnect is awaiting confirmation")]
    NothingToConfirm,
}

/// Errors surfaced by client operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Gateway call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Input rejected locally.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A resolution finished after a newer one was issued for the same key.
    ///
    /// Internal to the cache; public operations never return it.
    #[error("Resolution {seq} of {key} superseded by {latest}")]
    Stale {
        /// Key of the dropped resolution.
        key: QueryKey,
        /// Sequence number of the dropped resolution.
        seq: u64,
        /// Highest sequence number issued for the key.
        latest: u64,
    },

    /// The cache held a value of another query type under this key.
    #[error("Unexpected cached value for {0}")]
    ValueMismatch(QueryKey),

    /// A poll stopped before it reached an outcome.
    #[error("Polling of {0} stopped before it settled")]
    PollCancelled(QueryKey),
}

impl From<ShopDomainError> for ClientError {
    fn from(e: ShopDomainError) -> Self {
        Self::Validation(e.into())
    }
}

impl From<DraftSpecError> for ClientError {
    fn from(e: DraftSpecError) -> Self {
        Self::Validation(e.into())
    }
}
