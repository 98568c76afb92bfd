//! Integration connection records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::status::{IntegrationStatus, Provider};

/// Server-reported connection state for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationItem {
    pub provider: Provider,
    pub status: IntegrationStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl IntegrationItem {
    /// Metadata key holding the connected Shopify shop.
    pub const SHOP_DOMAIN_KEY: &'static str = "shopDomain";
    /// Metadata key holding the last successful Gelato key check.
    pub const LAST_VERIFIED_KEY: &'static str = "lastVerified";

    /// Synthesized record for a provider the server did not report.
    ///
    /// Never persisted or sent anywhere; it only stands in for the absent
    /// item so callers always have something to show.
    #[must_use]
    pub const fn fallback(provider: Provider) -> Self {
        Self {
            provider,
            status: IntegrationStatus::Disconnected,
            error_message: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Connected shop domain, if any.
    #[must_use]
    pub fn shop_domain(&self) -> Option<&str> {
        self.metadata.get(Self::SHOP_DOMAIN_KEY).map(String::as_str)
    }

    /// Timestamp of the last verification, if any.
    #[must_use]
    pub fn last_verified(&self) -> Option<&str> {
        self.metadata
            .get(Self::LAST_VERIFIED_KEY)
            .map(String::as_str)
    }
}

/// Response of the integrations listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntegrationList {
    #[serde(default)]
    pub items: Vec<IntegrationItem>,
}

impl IntegrationList {
    /// Item for a provider, or the fallback when the server omitted it.
    #[must_use]
    pub fn item_or_fallback(&self, provider: Provider) -> IntegrationItem {
        self.items
            .iter()
            .find(|item| item.provider == provider)
            .cloned()
            .unwrap_or_else(|| IntegrationItem::fallback(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_format() {
        let list: IntegrationList = serde_json::from_str(
            r#"{"items":[{"provider":"shopify","status":"error","errorMessage":"token expired","metadata":{}}]}"#,
        )
        .unwrap();

        let shopify = list.item_or_fallback(Provider::Shopify);
        assert_eq!(shopify.status, IntegrationStatus::Error);
        assert_eq!(shopify.error_message.as_deref(), Some("token expired"));
    }

    #[test]
    fn test_missing_provider_falls_back() {
        let list = IntegrationList::default();
        let gelato = list.item_or_fallback(Provider::Gelato);
        assert_eq!(gelato, IntegrationItem::fallback(Provider::Gelato));
        assert!(gelato.metadata.is_empty());
    }

    #[test]
    fn test_metadata_accessors() {
        let item: IntegrationItem = serde_json::from_str(
            r#"{"provider":"shopify","status":"connected","metadata":{"shopDomain":"acme.myshopify.com"}}"#,
        )
        .unwrap();
        assert_eq!(item.shop_domain(), Some("acme.myshopify.com"));
        assert_eq!(item.last_verified(), None);
        assert_eq!(item.error_message, None);
    }
}
