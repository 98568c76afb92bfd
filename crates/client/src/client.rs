//! Client facade wiring the gateway to the cache, executor and poller.
//!
//! Every REST operation has exactly one method here. Reads go through the
//! query cache under a fixed key; writes go through the mutation executor
//! with the set of keys they make stale:
//!
//! | Write | Invalidates |
//! |---|---|
//! | `upload_assets`, `start_shopify` | nothing |
//! | `create_drafts` | `("drafts")` |
//! | `push_draft(id)` | `("drafts")`, `("draft", id)` |
//! | Gelato/Shopify connect, disconnect, test | `("integrations")` |

use std::future::Future;

use podforge_core::{
    ApiKey, DesignAsset, DraftId, DraftSpec, IntegrationList, ProductDraft, PushReceipt,
    ShopDomain, Template,
};
use tracing::info;

use crate::cache::{QueryCache, QueryData, QueryKey, Resolver, Subscription, resolver};
use crate::config::{ClientConfig, PollingConfig};
use crate::error::{ClientError, TransportError, ValidationError};
use crate::gateway::{Ack, AssetUpload, Gateway, HealthStatus, HttpGateway, ShopifyAuthorization};
use crate::mutation::MutationExecutor;
use crate::polling::{PollHandle, PollOptions, PollOutcome, PollScheduler};

/// Query keys used by the client.
pub mod keys {
    use podforge_core::DraftId;

    use crate::cache::QueryKey;
    use crate::query_key;

    #[must_use]
    pub fn health() -> QueryKey {
        query_key!("health")
    }

    #[must_use]
    pub fn templates() -> QueryKey {
        query_key!("templates")
    }

    #[must_use]
    pub fn drafts() -> QueryKey {
        query_key!("drafts")
    }

    #[must_use]
    pub fn draft(id: DraftId) -> QueryKey {
        query_key!("draft", id)
    }

    #[must_use]
    pub fn integrations() -> QueryKey {
        query_key!("integrations")
    }
}

/// Value stored in the client's cache, one variant per query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Health(HealthStatus),
    Templates(Vec<Template>),
    Drafts(Vec<ProductDraft>),
    Draft(Box<ProductDraft>),
    Integrations(IntegrationList),
}

impl QueryValue {
    #[must_use]
    pub fn as_drafts(&self) -> Option<&[ProductDraft]> {
        match self {
            Self::Drafts(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_draft(&self) -> Option<&ProductDraft> {
        match self {
            Self::Draft(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_integrations(&self) -> Option<&IntegrationList> {
        match self {
            Self::Integrations(v) => Some(v),
            _ => None,
        }
    }
}

/// Print-on-demand API client.
///
/// Cheap to clone; clones share the gateway and the cache.
#[derive(Clone)]
pub struct PodClient<G> {
    gateway: G,
    cache: QueryCache<QueryValue>,
    mutations: MutationExecutor<QueryValue>,
    poller: PollScheduler<QueryValue>,
    polling: PollOptions,
}

impl<G> std::fmt::Debug for PodClient<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PodClient")
            .field("polling", &self.polling)
            .finish_non_exhaustive()
    }
}

impl PodClient<HttpGateway> {
    /// Create a client talking HTTP to the configured API.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        Ok(Self::new(HttpGateway::new(config)?, config.polling))
    }
}

impl<G: Gateway> PodClient<G> {
    /// Create a client over any gateway with an empty cache.
    #[must_use]
    pub fn new(gateway: G, polling: PollingConfig) -> Self {
        let cache = QueryCache::new();
        Self {
            gateway,
            mutations: MutationExecutor::new(cache.clone()),
            poller: PollScheduler::new(cache.clone()),
            cache,
            polling: polling.into(),
        }
    }

    /// The gateway requests go through.
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// The shared query cache.
    pub const fn cache(&self) -> &QueryCache<QueryValue> {
        &self.cache
    }

    fn resolver_for<T: 'static, F, Fut>(
        &self,
        wrap: fn(T) -> QueryValue,
        call: F,
    ) -> Resolver<QueryValue>
    where
        F: Fn(G) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TransportError>> + Send + 'static,
    {
        let gateway = self.gateway.clone();
        resolver(move || {
            let pending = call(gateway.clone());
            async move { pending.await.map(wrap) }
        })
    }

    // Queries

    /// Subscribe to the liveness probe.
    pub fn health(&self) -> Subscription<QueryValue> {
        let resolver = self.resolver_for(QueryValue::Health, |g| async move { g.health().await });
        self.cache.read(keys::health(), resolver)
    }

    /// Subscribe to the template catalog.
    pub fn templates(&self) -> Subscription<QueryValue> {
        let resolver =
            self.resolver_for(QueryValue::Templates, |g| async move { g.list_templates().await });
        self.cache.read(keys::templates(), resolver)
    }

    /// Subscribe to the draft list.
    pub fn drafts(&self) -> Subscription<QueryValue> {
        let resolver =
            self.resolver_for(QueryValue::Drafts, |g| async move { g.list_drafts().await });
        self.cache.read(keys::drafts(), resolver)
    }

    /// Subscribe to one draft.
    pub fn draft(&self, id: DraftId) -> Subscription<QueryValue> {
        self.cache.read(keys::draft(id), self.draft_resolver(id))
    }

    fn draft_resolver(&self, id: DraftId) -> Resolver<QueryValue> {
        self.resolver_for(
            |draft| QueryValue::Draft(Box::new(draft)),
            move |g| async move { g.get_draft(id).await },
        )
    }

    /// Subscribe to the integrations listing.
    pub fn integrations(&self) -> Subscription<QueryValue> {
        let resolver = self.resolver_for(QueryValue::Integrations, |g| async move {
            g.list_integrations().await
        });
        self.cache.read(keys::integrations(), resolver)
    }

    /// Wait for a subscription's current resolution and take its value.
    async fn load<T>(
        sub: Subscription<QueryValue>,
        extract: fn(QueryValue) -> Option<T>,
    ) -> Result<T, ClientError> {
        let snap = sub.settled().await;
        match snap.data {
            QueryData::Value(value) => extract(value).ok_or(ClientError::ValueMismatch(snap.key)),
            QueryData::Failed { error, .. } => Err(error.into()),
            QueryData::Empty => Err(ClientError::ValueMismatch(snap.key)),
        }
    }

    /// Fetch (or serve from cache) the liveness probe.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the resolution.
    pub async fn load_health(&self) -> Result<HealthStatus, ClientError> {
        Self::load(self.health(), |v| match v {
            QueryValue::Health(h) => Some(h),
            _ => None,
        })
        .await
    }

    /// Fetch (or serve from cache) the template catalog.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the resolution.
    pub async fn load_templates(&self) -> Result<Vec<Template>, ClientError> {
        Self::load(self.templates(), |v| match v {
            QueryValue::Templates(t) => Some(t),
            _ => None,
        })
        .await
    }

    /// Fetch (or serve from cache) the draft list.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the resolution.
    pub async fn load_drafts(&self) -> Result<Vec<ProductDraft>, ClientError> {
        Self::load(self.drafts(), |v| match v {
            QueryValue::Drafts(d) => Some(d),
            _ => None,
        })
        .await
    }

    /// Fetch (or serve from cache) one draft.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the resolution.
    pub async fn load_draft(&self, id: DraftId) -> Result<ProductDraft, ClientError> {
        Self::load(self.draft(id), |v| match v {
            QueryValue::Draft(d) => Some(*d),
            _ => None,
        })
        .await
    }

    /// Fetch (or serve from cache) the integrations listing.
    ///
    /// # Errors
    ///
    /// Returns the transport error of the resolution.
    pub async fn load_integrations(&self) -> Result<IntegrationList, ClientError> {
        Self::load(self.integrations(), |v| match v {
            QueryValue::Integrations(i) => Some(i),
            _ => None,
        })
        .await
    }

    /// Mark the integrations query stale, e.g. after an OAuth redirect
    /// returns.
    pub fn refresh_integrations(&self) {
        self.cache.invalidate(&[keys::integrations()]);
    }

    // Mutations

    /// Upload design files.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty file set, otherwise the gateway error.
    pub async fn upload_assets(&self, files: Vec<AssetUpload>) -> Result<Vec<DesignAsset>, ClientError> {
        if files.is_empty() {
            return Err(ValidationError::NoFiles.into());
        }
        self.mutations
            .run("upload_assets", self.gateway.upload_assets(files), &[])
            .await
    }

    /// Create drafts in bulk.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if any spec breaks the input rules (nothing is
    /// sent), otherwise the gateway error.
    pub async fn create_drafts(&self, drafts: Vec<DraftSpec>) -> Result<Vec<ProductDraft>, ClientError> {
        if drafts.is_empty() {
            return Err(ValidationError::NoDrafts.into());
        }
        for spec in &drafts {
            spec.validate()?;
        }

        let created = self
            .mutations
            .run(
                "create_drafts",
                self.gateway.create_drafts(drafts),
                &[keys::drafts()],
            )
            .await?;
        info!(count = created.len(), "Drafts created");
        Ok(created)
    }

    /// Queue a draft for pushing to the storefront.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn push_draft(&self, id: DraftId) -> Result<PushReceipt, ClientError> {
        let receipt = self
            .mutations
            .run(
                "push_draft",
                self.gateway.push_draft(id),
                &[keys::drafts(), keys::draft(id)],
            )
            .await?;
        info!(draft_id = %id, task_id = %receipt.task_id, "Draft push queued");
        Ok(receipt)
    }

    /// Store a Gelato API key on the server.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn connect_gelato(&self, api_key: ApiKey) -> Result<Ack, ClientError> {
        self.mutations
            .run(
                "connect_gelato",
                self.gateway.connect_gelato(api_key),
                &[keys::integrations()],
            )
            .await
    }

    /// Remove the Gelato credential.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn disconnect_gelato(&self) -> Result<(), ClientError> {
        self.mutations
            .run(
                "disconnect_gelato",
                self.gateway.disconnect_gelato(),
                &[keys::integrations()],
            )
            .await
    }

    /// Begin Shopify OAuth; the caller sends the operator to the returned URL.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn start_shopify(&self, shop: ShopDomain) -> Result<ShopifyAuthorization, ClientError> {
        self.mutations
            .run("start_shopify", self.gateway.start_shopify(shop), &[])
            .await
    }

    /// Remove the Shopify credential.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn disconnect_shopify(&self) -> Result<(), ClientError> {
        self.mutations
            .run(
                "disconnect_shopify",
                self.gateway.disconnect_shopify(),
                &[keys::integrations()],
            )
            .await
    }

    /// Ask the server to verify the Shopify credential.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub async fn test_shopify(&self) -> Result<Ack, ClientError> {
        self.mutations
            .run(
                "test_shopify",
                self.gateway.test_shopify(),
                &[keys::integrations()],
            )
            .await
    }

    // Polling

    /// Keep a draft fresh while its push is queued.
    pub fn watch_draft(&self, id: DraftId) -> PollHandle<QueryValue> {
        self.poller.poll(
            keys::draft(id),
            self.draft_resolver(id),
            self.polling,
            |value| {
                value
                    .as_draft()
                    .is_some_and(|draft| draft.status.is_in_progress())
            },
        )
    }

    /// Poll a draft until its push settles and return the final record.
    ///
    /// If a poll bound is configured and reached, returns the draft as last
    /// seen (still queued).
    ///
    /// # Errors
    ///
    /// Returns the transport error that stopped the poll.
    pub async fn wait_for_draft(&self, id: DraftId) -> Result<ProductDraft, ClientError> {
        let key = keys::draft(id);
        match self.watch_draft(id).finished().await {
            PollOutcome::Settled(value) | PollOutcome::AttemptsExhausted(value) => value
                .as_draft()
                .cloned()
                .ok_or(ClientError::ValueMismatch(key)),
            PollOutcome::Failed(error) => Err(error.into()),
            PollOutcome::Cancelled => Err(ClientError::PollCancelled(key)),
        }
    }

    /// Current cached value of a key, if any.
    #[must_use]
    pub fn cached(&self, key: &QueryKey) -> Option<QueryValue> {
        self.cache
            .snapshot(key)
            .and_then(|snap| snap.value().cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use podforge_core::{DraftStatus, Price, TemplateId};
    use serde_json::json;

    use super::*;
    use crate::cache::QueryStatus;
    use crate::testing::{ScriptedGateway, draft_json};

    fn client(gateway: &ScriptedGateway) -> PodClient<ScriptedGateway> {
        PodClient::new(gateway.clone(), PollingConfig::default())
    }

    fn spec(title: &str) -> DraftSpec {
        DraftSpec {
            template_id: TemplateId::new(1),
            title: title.to_string(),
            description: String::new(),
            price: "24.00".parse::<Price>().unwrap(),
            tags: vec![],
            asset_ids: vec![podforge_core::AssetId::new(3)],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_invalidates_list_and_detail_then_polls_to_settled() {
        let gateway = ScriptedGateway::new();
        gateway
            .respond("list_drafts", json!([draft_json(5, "draft")]))
            .respond("list_drafts", json!([draft_json(5, "queued")]))
            .respond("get_draft", draft_json(5, "draft"))
            .respond("get_draft", draft_json(5, "queued"))
            .respond("get_draft", draft_json(5, "pushed"))
            .respond("push_draft", json!({"task_id": "t1", "draft_id": 5}));
        let client = client(&gateway);
        let id = DraftId::new(5);

        let list = client.drafts();
        let detail = client.draft(id);
        list.settled().await;
        detail.settled().await;

        let receipt = client.push_draft(id).await.unwrap();
        assert_eq!(receipt.task_id, "t1");
        assert_eq!(receipt.draft_id, id);

        // Both keys went stale and, being observed, re-resolve at once.
        assert!(list.current().is_stale());
        assert!(detail.current().is_stale());
        let snap = detail.settled().await;
        assert_eq!(
            snap.value().and_then(QueryValue::as_draft).map(|d| d.status),
            Some(DraftStatus::Queued)
        );
        let snap = list.settled().await;
        assert_eq!(
            snap.value().and_then(QueryValue::as_drafts).map(|d| d[0].status),
            Some(DraftStatus::Queued)
        );

        let draft = client.wait_for_draft(id).await.unwrap();
        assert_eq!(draft.status, DraftStatus::Pushed);
        assert_eq!(gateway.calls_to("get_draft"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_draft_resolves_three_times_for_queued_queued_pushed() {
        let gateway = ScriptedGateway::new();
        gateway
            .respond("get_draft", draft_json(9, "queued"))
            .respond("get_draft", draft_json(9, "queued"))
            .respond("get_draft", draft_json(9, "pushed"));
        let client = client(&gateway);

        let draft = client.wait_for_draft(DraftId::new(9)).await.unwrap();
        assert_eq!(draft.status, DraftStatus::Pushed);
        assert_eq!(gateway.calls_to("get_draft"), 3);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(gateway.calls_to("get_draft"), 3);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_cache_untouched() {
        let gateway = ScriptedGateway::new();
        gateway
            .respond("list_drafts", json!([]))
            .fail(
                "create_drafts",
                TransportError::from_status(400, Some("Template is inactive".into())),
            );
        let client = client(&gateway);
        let list = client.drafts();
        list.settled().await;

        let err = client.create_drafts(vec![spec("Sunset Tee")]).await.unwrap_err();
        assert_eq!(err.to_string(), "Template is inactive");
        assert!(!list.current().is_stale());
        assert_eq!(gateway.calls_to("list_drafts"), 1);
    }

    #[tokio::test]
    async fn test_invalid_draft_spec_is_rejected_locally() {
        let gateway = ScriptedGateway::new();
        let client = client(&gateway);

        let err = client.create_drafts(vec![spec("  ")]).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(ValidationError::Draft(_))));
        assert_eq!(
            client.create_drafts(vec![]).await.unwrap_err(),
            ClientError::Validation(ValidationError::NoDrafts)
        );
        assert_eq!(
            client.upload_assets(vec![]).await.unwrap_err(),
            ClientError::Validation(ValidationError::NoFiles)
        );
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_query_error_keeps_last_value() {
        let gateway = ScriptedGateway::new();
        gateway
            .respond("list_integrations", json!({"items": [{"provider": "gelato", "status": "connected"}]}))
            .fail("list_integrations", TransportError::from_status(503, None));
        let client = client(&gateway);

        assert_eq!(client.load_integrations().await.unwrap().items.len(), 1);

        let sub = client.integrations();
        client.refresh_integrations();
        let snap = sub.settled().await;
        assert_eq!(snap.status(), QueryStatus::Error);
        assert_eq!(snap.error().map(ToString::to_string).as_deref(), Some("API error 503"));
        assert!(snap.value().and_then(QueryValue::as_integrations).is_some());
    }

    #[tokio::test]
    async fn test_load_serves_fresh_value_from_cache() {
        let gateway = ScriptedGateway::new();
        gateway.respond(
            "list_templates",
            json!([{"id": 1, "name": "Classic Tee", "gelato_template_id": "tpl_1"}]),
        );
        let client = client(&gateway);

        let first = client.load_templates().await.unwrap();
        let second = client.load_templates().await.unwrap();
        assert_eq!(first, second);
        assert!(first[0].is_active);
        assert_eq!(gateway.calls_to("list_templates"), 1);
        assert!(client.cached(&keys::templates()).is_some());
    }
}
