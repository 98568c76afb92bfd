//! End-to-end flows through `PodClient` and the integrations controller
//! over real HTTP.

use std::time::Duration;

use podforge_client::{
    ClientConfig, ClientError, ConnectionState, HttpGateway, IntegrationsController, PodClient,
    PollingConfig, QueryValue, ValidationError,
};
use podforge_core::{DraftId, DraftStatus, Provider};
use podforge_integration_tests::MockApi;
use serde_json::json;

async fn client() -> (MockApi, PodClient<HttpGateway>) {
    let mock = MockApi::start().await;
    let config = ClientConfig {
        polling: PollingConfig {
            interval: Duration::from_millis(10),
            max_attempts: None,
        },
        ..ClientConfig::with_base_url(mock.base_url()).expect("valid base url")
    };
    let client = PodClient::from_config(&config).expect("http client");
    (mock, client)
}

// =============================================================================
// Drafts
// =============================================================================

#[tokio::test]
async fn test_push_then_watch_until_pushed() {
    let (mock, client) = client().await;
    mock.insert_draft(5, "draft");
    mock.script_push(5, &["queued", "queued", "pushed"]);

    let list = client.drafts();
    list.settled().await;

    let receipt = client.push_draft(DraftId::new(5)).await.unwrap();
    assert_eq!(receipt.task_id, "task-5");

    // The observed list re-reads right away and sees the queued draft.
    let snap = list
        .wait_for(|s| !s.is_fetching && !s.is_stale())
        .await;
    let drafts = snap.value().and_then(QueryValue::as_drafts).unwrap();
    assert_eq!(drafts[0].status, DraftStatus::Queued);

    let draft = client.wait_for_draft(DraftId::new(5)).await.unwrap();
    assert_eq!(draft.status, DraftStatus::Pushed);
    assert_eq!(mock.count("GET /drafts/5"), 3);
    assert_eq!(mock.count("GET /drafts"), 2);
}

#[tokio::test]
async fn test_failed_push_leaves_list_fresh() {
    let (mock, client) = client().await;
    mock.insert_draft(5, "draft");

    let list = client.drafts();
    list.settled().await;

    let err = client.push_draft(DraftId::new(6)).await.unwrap_err();
    assert_eq!(err.to_string(), "Not found.");
    assert!(!list.current().is_stale());
    assert_eq!(mock.count("GET /drafts"), 1);
}

// =============================================================================
// Integrations
// =============================================================================

#[tokio::test]
async fn test_gelato_connect_and_confirmed_disconnect() {
    let (mock, client) = client().await;
    let page = IntegrationsController::new(client);
    page.wait_until_loaded().await;

    page.connect_gelato(" gel_live_123 ").await.unwrap();
    let views = page.wait_until_loaded().await;
    assert_eq!(views[1].state, ConnectionState::Connected);
    assert_eq!(views[1].item.last_verified(), Some("2026-01-05T10:00:00Z"));

    page.request_disconnect(Provider::Gelato).unwrap();
    assert_eq!(mock.count("DELETE /integrations/gelato"), 0);

    page.confirm_disconnect().await.unwrap();
    assert_eq!(mock.count("DELETE /integrations/gelato"), 1);
    let views = page.wait_until_loaded().await;
    assert_eq!(views[1].state, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_rejected_gelato_key_shows_server_message() {
    let (_mock, client) = client().await;
    let page = IntegrationsController::new(client);
    page.wait_until_loaded().await;

    let err = page.connect_gelato("invalid").await.unwrap_err();
    assert_eq!(err.to_string(), "Gelato rejected the API key.");
    assert_eq!(
        page.message().map(|m| m.text).as_deref(),
        Some("Gelato rejected the API key.")
    );
    assert_eq!(page.view(Provider::Gelato).state, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_shopify_oauth_round_trip() {
    let (mock, client) = client().await;
    let page = IntegrationsController::new(client);
    page.wait_until_loaded().await;

    let url = page.start_shopify("Acme").await.unwrap();
    assert_eq!(url.host_str(), Some("acme.myshopify.com"));
    assert_eq!(page.view(Provider::Shopify).state, ConnectionState::Disconnected);

    mock.complete_shopify_oauth();
    let view = page.complete_shopify_return().await;
    assert_eq!(view.state, ConnectionState::Connected);
    assert_eq!(view.item.shop_domain(), Some("acme.myshopify.com"));

    page.test_shopify().await.unwrap();
    assert_eq!(mock.count("POST /integrations/shopify/test"), 1);
}

#[tokio::test]
async fn test_server_reported_error_state() {
    let (mock, client) = client().await;
    mock.set_integration(json!({
        "provider": "shopify",
        "status": "error",
        "errorMessage": "token expired",
        "metadata": {"shopDomain": "acme.myshopify.com"}
    }));
    let page = IntegrationsController::new(client);

    let views = page.wait_until_loaded().await;
    assert_eq!(
        views[0].state,
        ConnectionState::Error {
            message: Some("token expired".to_string())
        }
    );
    assert_eq!(views[1].state, ConnectionState::Disconnected);

    // A broken credential can still be disconnected.
    page.request_disconnect(Provider::Shopify).unwrap();
    assert_eq!(
        page.request_disconnect(Provider::Gelato),
        Err(ClientError::Validation(ValidationError::NotConnected {
            provider: Provider::Gelato
        }))
    );
}
