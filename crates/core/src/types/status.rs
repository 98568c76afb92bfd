//! Status enums for server-owned entities.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a product draft.
///
/// Drafts start as `Draft`, move to `Queued` when a push is accepted and end
/// in `Pushed` or `Failed` once the background job settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    #[default]
    Draft,
    Queued,
    Pushed,
    Failed,
}

impl DraftStatus {
    /// Whether the server is still processing a push for this draft.
    #[must_use]
    pub const fn is_in_progress(self) -> bool {
        matches!(self, Self::Queued)
    }

    /// Whether the push pipeline has reached a final state.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Pushed | Self::Failed)
    }
}

impl std::fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Queued => write!(f, "queued"),
            Self::Pushed => write!(f, "pushed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Connection status of an integration as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    Connected,
    #[default]
    Disconnected,
    Error,
}

impl std::fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// External integration target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Storefront platform, connected through OAuth.
    Shopify,
    /// Fulfillment platform, connected with a server-side API key.
    Gelato,
}

impl Provider {
    /// Every provider, in display order.
    pub const ALL: [Self; 2] = [Self::Shopify, Self::Gelato];

    /// Human-readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Shopify => "Shopify",
            Self::Gelato => "Gelato",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shopify => write!(f, "shopify"),
            Self::Gelato => write!(f, "gelato"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shopify" => Ok(Self::Shopify),
            "gelato" => Ok(Self::Gelato),
            _ => Err(format!("invalid provider: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_status_wire_format() {
        let status: DraftStatus = serde_json::from_str("\"queued\"").unwrap();
        assert_eq!(status, DraftStatus::Queued);
        assert!(status.is_in_progress());
        assert!(!status.is_settled());
        assert!(DraftStatus::Pushed.is_settled());
        assert!(DraftStatus::Failed.is_settled());
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("Shopify".parse::<Provider>(), Ok(Provider::Shopify));
        assert_eq!("gelato".parse::<Provider>(), Ok(Provider::Gelato));
        assert!("etsy".parse::<Provider>().is_err());
    }

    #[test]
    fn test_integration_status_default_is_disconnected() {
        assert_eq!(IntegrationStatus::default(), IntegrationStatus::Disconnected);
        assert_eq!(IntegrationStatus::Error.to_string(), "error");
    }
}
