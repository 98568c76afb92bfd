//! In-memory gateway for tests.
//!
//! Responses are scripted per operation as JSON values and decoded into the
//! operation's return type, so tests can use the same payloads the REST API
//! sends. The last response queued for an operation repeats for every later
//! call.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use podforge_core::{
    ApiKey, DesignAsset, DraftId, DraftSpec, IntegrationList, ProductDraft, PushReceipt,
    ShopDomain, Template,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransportError;
use crate::gateway::{Ack, AssetUpload, Gateway, HealthStatus, ShopifyAuthorization};

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    /// Operation name, same as the `Gateway` method.
    pub operation: &'static str,
    /// Interesting argument (id, shop domain, key), rendered as text.
    pub argument: Option<String>,
}

#[derive(Default)]
struct Script {
    responses: HashMap<&'static str, VecDeque<Result<Value, TransportError>>>,
    delays: HashMap<&'static str, Duration>,
    calls: Vec<GatewayCall>,
}

/// Gateway answering from a per-operation script.
#[derive(Clone, Default)]
pub struct ScriptedGateway {
    script: Arc<Mutex<Script>>,
}

impl std::fmt::Debug for ScriptedGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedGateway")
            .field("calls", &self.script().calls.len())
            .finish_non_exhaustive()
    }
}

impl ScriptedGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a successful response body for `operation`.
    pub fn respond(&self, operation: &'static str, body: Value) -> &Self {
        self.script()
            .responses
            .entry(operation)
            .or_default()
            .push_back(Ok(body));
        self
    }

    /// Queue a failure for `operation`.
    pub fn fail(&self, operation: &'static str, error: TransportError) -> &Self {
        self.script()
            .responses
            .entry(operation)
            .or_default()
            .push_back(Err(error));
        self
    }

    /// Make every call to `operation` take `delay` (tokio time).
    pub fn delay(&self, operation: &'static str, delay: Duration) -> &Self {
        self.script().delays.insert(operation, delay);
        self
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.script().calls.clone()
    }

    /// Number of calls made to `operation`.
    #[must_use]
    pub fn calls_to(&self, operation: &str) -> usize {
        self.script()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    fn next(
        &self,
        operation: &'static str,
        argument: Option<String>,
    ) -> (Result<Value, TransportError>, Option<Duration>) {
        let mut script = self.script();
        script.calls.push(GatewayCall {
            operation,
            argument,
        });
        let delay = script.delays.get(operation).copied();

        let response = match script.responses.get_mut(operation) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        let response = response.unwrap_or_else(|| {
            Err(TransportError::Network(format!(
                "no scripted response for {operation}"
            )))
        });

        (response, delay)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        argument: Option<String>,
    ) -> Result<T, TransportError> {
        let (response, delay) = self.next(operation, argument);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        serde_json::from_value(response?).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

impl Gateway for ScriptedGateway {
    async fn health(&self) -> Result<HealthStatus, TransportError> {
        self.call("health", None).await
    }

    async fn list_templates(&self) -> Result<Vec<Template>, TransportError> {
        self.call("list_templates", None).await
    }

    async fn list_drafts(&self) -> Result<Vec<ProductDraft>, TransportError> {
        self.call("list_drafts", None).await
    }

    async fn get_draft(&self, id: DraftId) -> Result<ProductDraft, TransportError> {
        self.call("get_draft", Some(id.to_string())).await
    }

    async fn upload_assets(&self, files: Vec<AssetUpload>) -> Result<Vec<DesignAsset>, TransportError> {
        let names = files
            .iter()
            .map(|file| file.file_name.as_str())
            .collect::<Vec<_>>()
            .join(",");
        self.call("upload_assets", Some(names)).await
    }

    async fn create_drafts(&self, drafts: Vec<DraftSpec>) -> Result<Vec<ProductDraft>, TransportError> {
        let body = serde_json::to_string(&drafts).map_err(|e| TransportError::Decode(e.to_string()))?;
        self.call("create_drafts", Some(body)).await
    }

    async fn push_draft(&self, id: DraftId) -> Result<PushReceipt, TransportError> {
        self.call("push_draft", Some(id.to_string())).await
    }

    async fn list_integrations(&self) -> Result<IntegrationList, TransportError> {
        self.call("list_integrations", None).await
    }

    async fn connect_gelato(&self, api_key: ApiKey) -> Result<Ack, TransportError> {
        self.call("connect_gelato", Some(api_key.expose().to_string()))
            .await
    }

    async fn disconnect_gelato(&self) -> Result<(), TransportError> {
        self.call("disconnect_gelato", None).await
    }

    async fn start_shopify(&self, shop: ShopDomain) -> Result<ShopifyAuthorization, TransportError> {
        self.call("start_shopify", Some(shop.into_inner())).await
    }

    async fn disconnect_shopify(&self) -> Result<(), TransportError> {
        self.call("disconnect_shopify", None).await
    }

    async fn test_shopify(&self) -> Result<Ack, TransportError> {
        self.call("test_shopify", None).await
    }
}

/// JSON for a draft as the REST API returns it.
#[must_use]
pub fn draft_json(id: i64, status: &str) -> Value {
    serde_json::json!({
        "id": id,
        "title": format!("Draft {id}"),
        "description": "",
        "tags": [],
        "seo": {},
        "status": status,
        "price": "24.00",
        "template": {
            "id": 1,
            "name": "Classic Tee",
            "gelato_template_id": "tpl_classic_tee",
            "metadata": {},
            "is_active": true
        },
        "assets": [],
        "created_at": "2026-01-05T10:00:00Z",
        "updated_at": "2026-01-05T10:00:00Z"
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_response_repeats() {
        let gateway = ScriptedGateway::new();
        gateway
            .respond("health", serde_json::json!({"status": "starting"}))
            .respond("health", serde_json::json!({"status": "ok"}));

        assert_eq!(gateway.health().await.unwrap().status, "starting");
        assert_eq!(gateway.health().await.unwrap().status, "ok");
        assert_eq!(gateway.health().await.unwrap().status, "ok");
        assert_eq!(gateway.calls_to("health"), 3);
    }

    #[tokio::test]
    async fn test_unscripted_operation_fails() {
        let gateway = ScriptedGateway::new();
        let err = gateway.list_templates().await.unwrap_err();
        assert_eq!(
            err,
            TransportError::Network("no scripted response for list_templates".to_string())
        );
    }

    #[tokio::test]
    async fn test_decodes_scripted_draft() {
        let gateway = ScriptedGateway::new();
        gateway.respond("get_draft", draft_json(5, "queued"));

        let draft = gateway.get_draft(DraftId::new(5)).await.unwrap();
        assert_eq!(draft.id, DraftId::new(5));
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall {
                operation: "get_draft",
                argument: Some("5".to_string()),
            }]
        );
    }
}
