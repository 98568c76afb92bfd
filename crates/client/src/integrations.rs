//! Integration management workflow.
//!
//! Backs the integrations page: per-provider views, connect, two-step
//! disconnect, Shopify credential test and the status message shown after
//! each action. Every action is checked against the connection state
//! machine before anything is sent.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use podforge_core::{ApiKey, Provider, ShopDomain};
use tracing::{info, instrument};
use url::Url;

use crate::cache::Subscription;
use crate::client::{PodClient, QueryValue};
use crate::connection::{
    ConnectionState, PendingActions, PendingGuard, ProviderAction, ProviderView, derive_view,
};
use crate::error::{ClientError, ValidationError};
use crate::gateway::Gateway;

/// Tone of a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Error,
}

/// Outcome of the latest action, as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: MessageKind,
    pub text: String,
}

impl StatusMessage {
    fn info(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Info,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            text: text.into(),
        }
    }
}

#[derive(Debug, Default)]
struct PageState {
    disconnect_target: Option<Provider>,
    message: Option<StatusMessage>,
}

/// Integrations page controller.
///
/// Keeps the integrations query observed for its whole life, so every
/// successful mutation re-reads the server state right away.
pub struct IntegrationsController<G> {
    client: PodClient<G>,
    integrations: Subscription<QueryValue>,
    pending: PendingActions,
    state: Mutex<PageState>,
}

impl<G> std::fmt::Debug for IntegrationsController<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationsController")
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl<G: Gateway> IntegrationsController<G> {
    /// Start observing the integrations query.
    #[must_use]
    pub fn new(client: PodClient<G>) -> Self {
        let integrations = client.integrations();
        Self {
            client,
            integrations,
            pending: PendingActions::new(),
            state: Mutex::new(PageState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current view of one provider.
    #[must_use]
    pub fn view(&self, provider: Provider) -> ProviderView {
        let snap = self.integrations.current();
        derive_view(
            provider,
            snap.value().and_then(QueryValue::as_integrations),
            snap.error(),
            self.pending.get(provider),
        )
    }

    /// Views of every provider, in display order.
    #[must_use]
    pub fn views(&self) -> Vec<ProviderView> {
        Provider::ALL.iter().map(|&p| self.view(p)).collect()
    }

    /// Wait for the integrations query to settle and return the views.
    pub async fn wait_until_loaded(&self) -> Vec<ProviderView> {
        self.integrations.settled().await;
        self.views()
    }

    /// Latest status message.
    #[must_use]
    pub fn message(&self) -> Option<StatusMessage> {
        self.state().message.clone()
    }

    /// Provider awaiting disconnect confirmation.
    #[must_use]
    pub fn disconnect_target(&self) -> Option<Provider> {
        self.state().disconnect_target
    }

    fn begin(&self, provider: Provider, action: ProviderAction) -> Result<PendingGuard, ClientError> {
        self.view(provider).check(action)?;
        Ok(self.pending.begin(provider, action)?)
    }

    /// Run a mutation that invalidates the integrations query.
    ///
    /// The provider stays pending until the re-read triggered by a
    /// successful call has landed, so the view never falls back to the
    /// pre-mutation state and no second action can start in between.
    async fn run_reread<T, Fut>(
        &self,
        provider: Provider,
        action: ProviderAction,
        call: Fut,
    ) -> Result<T, ClientError>
    where
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let _pending = self.begin(provider, action)?;
        let seen = self.integrations.current().resolved_seq;
        let value = call.await?;
        self.integrations
            .wait_for(|snap| !snap.is_fetching && snap.resolved_seq > seen)
            .await;
        Ok(value)
    }

    /// Record the outcome of an action as the status message.
    fn settle<T>(&self, result: Result<T, ClientError>, success: Option<String>) -> Result<T, ClientError> {
        let message = match &result {
            Ok(_) => success.map(StatusMessage::info),
            Err(e) => Some(StatusMessage::error(e.to_string())),
        };
        if message.is_some() {
            self.state().message = message;
        }
        result
    }

    /// Store a Gelato API key.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank key or an illegal action, otherwise
    /// the gateway error.
    #[instrument(skip_all)]
    pub async fn connect_gelato(&self, raw_key: &str) -> Result<(), ClientError> {
        let result: Result<_, ClientError> = async {
            let api_key = ApiKey::parse(raw_key).ok_or(ValidationError::EmptyApiKey)?;
            self.run_reread(
                Provider::Gelato,
                ProviderAction::Connect,
                self.client.connect_gelato(api_key),
            )
            .await
        }
        .await;

        self.settle(result, Some("Gelato connected.".to_string()))
            .map(|_| info!("Gelato connected"))
    }

    /// Begin Shopify OAuth and return where to send the operator.
    ///
    /// The provider stays in its current state; only
    /// [`complete_shopify_return`](Self::complete_shopify_return) can show
    /// it connected.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a bad shop domain or an illegal action
    /// (nothing is sent), otherwise the gateway error.
    #[instrument(skip(self))]
    pub async fn start_shopify(&self, raw_domain: &str) -> Result<Url, ClientError> {
        let result: Result<_, ClientError> = async {
            let shop = ShopDomain::parse(raw_domain)?;
            let _pending = self.begin(Provider::Shopify, ProviderAction::Connect)?;
            self.client.start_shopify(shop).await
        }
        .await;

        self.settle(result, None).map(|auth| auth.redirect_url)
    }

    /// Re-read the server state after returning from Shopify authorization.
    #[instrument(skip(self))]
    pub async fn complete_shopify_return(&self) -> ProviderView {
        self.client.refresh_integrations();
        self.integrations.settled().await;

        let view = self.view(Provider::Shopify);
        let message = match &view.state {
            ConnectionState::Connected => Some(StatusMessage::info("Shopify connected.")),
            ConnectionState::Error { message } => Some(StatusMessage::error(
                message
                    .clone()
                    .unwrap_or_else(|| "Shopify connection failed.".to_string()),
            )),
            ConnectionState::Disconnected | ConnectionState::Pending(_) => None,
        };
        if let Some(message) = message {
            self.state().message = Some(message);
        }
        view
    }

    /// First step of a disconnect: remember which provider to drop.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the provider cannot be disconnected now.
    pub fn request_disconnect(&self, provider: Provider) -> Result<(), ClientError> {
        let result = self
            .view(provider)
            .check(ProviderAction::Disconnect)
            .map_err(ClientError::from);
        let result = self.settle(result, None);
        if result.is_ok() {
            self.state().disconnect_target = Some(provider);
        }
        result
    }

    /// Abandon a requested disconnect.
    pub fn cancel_disconnect(&self) {
        self.state().disconnect_target = None;
    }

    /// Second step of a disconnect: call the server.
    ///
    /// The request stays armed if the call fails, so it can be retried.
    ///
    /// # Errors
    ///
    /// Returns `Validation` without a prior request or for an illegal
    /// action, otherwise the gateway error.
    #[instrument(skip(self))]
    pub async fn confirm_disconnect(&self) -> Result<Provider, ClientError> {
        let target = self.state().disconnect_target;
        let result: Result<_, ClientError> = async {
            let provider = target.ok_or(ValidationError::NothingToConfirm)?;
            let call = async {
                match provider {
                    Provider::Gelato => self.client.disconnect_gelato().await,
                    Provider::Shopify => self.client.disconnect_shopify().await,
                }
            };
            self.run_reread(provider, ProviderAction::Disconnect, call)
                .await?;
            Ok(provider)
        }
        .await;

        let success = target.map(|p| format!("{} disconnected.", p.display_name()));
        let provider = self.settle(result, success)?;

        let mut state = self.state();
        if state.disconnect_target == Some(provider) {
            state.disconnect_target = None;
        }
        drop(state);

        info!(provider = %provider, "Provider disconnected");
        Ok(provider)
    }

    /// Ask the server to verify the Shopify credential.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an illegal action, otherwise the gateway
    /// error.
    #[instrument(skip(self))]
    pub async fn test_shopify(&self) -> Result<(), ClientError> {
        let result: Result<_, ClientError> = async {
            self.run_reread(
                Provider::Shopify,
                ProviderAction::Test,
                self.client.test_shopify(),
            )
            .await
        }
        .await;

        self.settle(
            result,
            Some("Shopify connection tested successfully.".to_string()),
        )
        .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::config::PollingConfig;
    use crate::error::TransportError;
    use crate::testing::{GatewayCall, ScriptedGateway};

    fn controller(gateway: &ScriptedGateway) -> IntegrationsController<ScriptedGateway> {
        IntegrationsController::new(PodClient::new(gateway.clone(), PollingConfig::default()))
    }

    fn connected(provider: &str) -> serde_json::Value {
        json!({"provider": provider, "status": "connected", "metadata": {}})
    }

    #[tokio::test]
    async fn test_views_project_server_state() {
        let gateway = ScriptedGateway::new();
        gateway.respond(
            "list_integrations",
            json!({"items": [{"provider": "shopify", "status": "error", "errorMessage": "token expired", "metadata": {}}]}),
        );
        let page = controller(&gateway);

        let views = page.wait_until_loaded().await;
        assert_eq!(
            views[0].state,
            ConnectionState::Error {
                message: Some("token expired".to_string())
            }
        );
        assert_eq!(views[1].provider, Provider::Gelato);
        assert_eq!(views[1].state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_waits_for_confirmation() {
        let gateway = ScriptedGateway::new();
        gateway
            .respond("list_integrations", json!({"items": [connected("gelato")]}))
            .respond("list_integrations", json!({"items": []}))
            .respond("disconnect_gelato", serde_json::Value::Null);
        let page = controller(&gateway);
        page.wait_until_loaded().await;

        page.request_disconnect(Provider::Gelato).unwrap();
        assert_eq!(page.disconnect_target(), Some(Provider::Gelato));
        assert_eq!(gateway.calls_to("disconnect_gelato"), 0);

        page.cancel_disconnect();
        assert_eq!(
            page.confirm_disconnect().await,
            Err(ClientError::Validation(ValidationError::NothingToConfirm))
        );
        assert_eq!(gateway.calls_to("disconnect_gelato"), 0);

        page.request_disconnect(Provider::Gelato).unwrap();
        assert_eq!(page.confirm_disconnect().await, Ok(Provider::Gelato));
        assert_eq!(gateway.calls_to("disconnect_gelato"), 1);
        assert_eq!(page.disconnect_target(), None);
        assert_eq!(
            page.message(),
            Some(StatusMessage::info("Gelato disconnected."))
        );

        let views = page.wait_until_loaded().await;
        assert_eq!(views[1].state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_failed_disconnect_keeps_request_armed() {
        let gateway = ScriptedGateway::new();
        gateway
            .respond("list_integrations", json!({"items": [connected("shopify")]}))
            .fail(
                "disconnect_shopify",
                TransportError::from_status(502, None),
            );
        let page = controller(&gateway);
        page.wait_until_loaded().await;

        page.request_disconnect(Provider::Shopify).unwrap();
        let err = page.confirm_disconnect().await.unwrap_err();
        assert_eq!(err.to_string(), "API error 502");
        assert_eq!(page.disconnect_target(), Some(Provider::Shopify));
        assert_eq!(page.message(), Some(StatusMessage::error("API error 502")));
        assert_eq!(gateway.calls_to("list_integrations"), 1);
    }

    #[tokio::test]
    async fn test_disconnect_rejected_while_disconnected() {
        let gateway = ScriptedGateway::new();
        gateway.respond("list_integrations", json!({"items": []}));
        let page = controller(&gateway);
        page.wait_until_loaded().await;

        let err = page.request_disconnect(Provider::Shopify).unwrap_err();
        assert_eq!(
            err,
            ClientError::Validation(ValidationError::NotConnected {
                provider: Provider::Shopify
            })
        );
        assert_eq!(page.disconnect_target(), None);
        assert_eq!(page.message().map(|m| m.kind), Some(MessageKind::Error));
    }

    #[tokio::test]
    async fn test_connect_gelato_rereads_integrations() {
        let gateway = ScriptedGateway::new();
        gateway
            .respond("list_integrations", json!({"items": []}))
            .respond("list_integrations", json!({"items": [connected("gelato")]}))
            .respond("connect_gelato", json!({"ok": true}));
        let page = controller(&gateway);
        page.wait_until_loaded().await;

        page.connect_gelato("  gel_live_123  ").await.unwrap();
        assert_eq!(
            gateway.calls().iter().find(|c| c.operation == "connect_gelato"),
            Some(&GatewayCall {
                operation: "connect_gelato",
                argument: Some("gel_live_123".to_string()),
            })
        );
        assert_eq!(page.message(), Some(StatusMessage::info("Gelato connected.")));

        let views = page.wait_until_loaded().await;
        assert_eq!(views[1].state, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_blank_api_key_is_rejected_locally() {
        let gateway = ScriptedGateway::new();
        gateway.respond("list_integrations", json!({"items": []}));
        let page = controller(&gateway);

        assert_eq!(
            page.connect_gelato("   ").await,
            Err(ClientError::Validation(ValidationError::EmptyApiKey))
        );
        assert_eq!(gateway.calls_to("connect_gelato"), 0);
        assert_eq!(
            page.message(),
            Some(StatusMessage::error("API key must not be empty"))
        );
    }

    #[tokio::test]
    async fn test_bad_shop_domain_makes_no_request() {
        let gateway = ScriptedGateway::new();
        gateway.respond("list_integrations", json!({"items": []}));
        let page = controller(&gateway);

        let err = page.start_shopify("acme.com").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::ShopDomain(_))
        ));
        assert_eq!(gateway.calls_to("start_shopify"), 0);
    }

    #[tokio::test]
    async fn test_shopify_connects_only_after_return() {
        let gateway = ScriptedGateway::new();
        gateway
            .respond("list_integrations", json!({"items": []}))
            .respond(
                "list_integrations",
                json!({"items": [{"provider": "shopify", "status": "connected", "metadata": {"shopDomain": "acme.myshopify.com"}}]}),
            )
            .respond(
                "start_shopify",
                json!({"redirectUrl": "https://acme.myshopify.com/admin/oauth/authorize?client_id=abc"}),
            );
        let page = controller(&gateway);
        page.wait_until_loaded().await;

        let url = page.start_shopify("  ACME ").await.unwrap();
        assert_eq!(url.host_str(), Some("acme.myshopify.com"));
        assert_eq!(
            gateway.calls().last().and_then(|c| c.argument.clone()),
            Some("acme.myshopify.com".to_string())
        );
        assert_eq!(page.view(Provider::Shopify).state, ConnectionState::Disconnected);

        let view = page.complete_shopify_return().await;
        assert_eq!(view.state, ConnectionState::Connected);
        assert_eq!(view.item.shop_domain(), Some("acme.myshopify.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_action_blocks_others() {
        let gateway = ScriptedGateway::new();
        gateway
            .respond("list_integrations", json!({"items": [connected("shopify")]}))
            .respond("test_shopify", json!({"ok": true}))
            .delay("test_shopify", Duration::from_secs(1));
        let page = Arc::new(controller(&gateway));
        page.wait_until_loaded().await;

        let running = tokio::spawn({
            let page = Arc::clone(&page);
            async move { page.test_shopify().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            page.view(Provider::Shopify).state,
            ConnectionState::Pending(ProviderAction::Test)
        );
        assert_eq!(
            page.request_disconnect(Provider::Shopify),
            Err(ClientError::Validation(ValidationError::Busy {
                provider: Provider::Shopify
            }))
        );

        running.await.unwrap().unwrap();
        assert_eq!(page.view(Provider::Shopify).state, ConnectionState::Connected);
        assert_eq!(
            page.message(),
            Some(StatusMessage::info("Shopify connection tested successfully."))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_stays_pending_until_reread_lands() {
        let gateway = ScriptedGateway::new();
        gateway
            .respond("list_integrations", json!({"items": []}))
            .respond("list_integrations", json!({"items": [connected("gelato")]}))
            .respond("connect_gelato", json!({"ok": true}))
            .delay("list_integrations", Duration::from_millis(500));
        let page = Arc::new(controller(&gateway));
        page.wait_until_loaded().await;

        let running = tokio::spawn({
            let page = Arc::clone(&page);
            async move { page.connect_gelato("gel_live_123").await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        // The key is stored; the integrations re-read is still in flight.
        assert_eq!(gateway.calls_to("connect_gelato"), 1);
        assert_eq!(
            page.view(Provider::Gelato).state,
            ConnectionState::Pending(ProviderAction::Connect)
        );

        running.await.unwrap().unwrap();
        assert_eq!(page.view(Provider::Gelato).state, ConnectionState::Connected);
        assert_eq!(gateway.calls_to("list_integrations"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cannot_repeat_before_reread_lands() {
        let gateway = ScriptedGateway::new();
        gateway
            .respond("list_integrations", json!({"items": [connected("gelato")]}))
            .respond("list_integrations", json!({"items": []}))
            .respond("disconnect_gelato", serde_json::Value::Null)
            .delay("list_integrations", Duration::from_millis(500));
        let page = controller(&gateway);
        page.wait_until_loaded().await;

        page.request_disconnect(Provider::Gelato).unwrap();
        page.confirm_disconnect().await.unwrap();

        assert_eq!(page.view(Provider::Gelato).state, ConnectionState::Disconnected);
        assert_eq!(
            page.request_disconnect(Provider::Gelato),
            Err(ClientError::Validation(ValidationError::NotConnected {
                provider: Provider::Gelato
            }))
        );
        assert_eq!(gateway.calls_to("disconnect_gelato"), 1);
    }

    #[tokio::test]
    async fn test_gelato_cannot_be_tested() {
        let gateway = ScriptedGateway::new();
        gateway.respond("list_integrations", json!({"items": [connected("gelato")]}));
        let page = controller(&gateway);
        page.wait_until_loaded().await;

        // Test is a Shopify-only action; the controller has no Gelato entry
        // point, so go through the state machine directly.
        assert_eq!(
            page.view(Provider::Gelato).check(ProviderAction::Test),
            Err(ValidationError::Unsupported {
                provider: Provider::Gelato,
                action: ProviderAction::Test,
            })
        );
    }
}
