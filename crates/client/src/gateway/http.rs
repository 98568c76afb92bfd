//! reqwest-backed gateway.

use std::sync::Arc;

use podforge_core::{
    ApiKey, DesignAsset, DraftId, DraftSpec, IntegrationList, ProductDraft, PushReceipt,
    ShopDomain, Template,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument};

use super::{Ack, AssetUpload, Gateway, HealthStatus, ShopifyAuthorization};
use crate::config::ClientConfig;
use crate::error::TransportError;

/// Client for the product service REST API.
///
/// Sends credentials (cookies) with every request, like the browser client
/// it replaces. Cloning shares the connection pool.
#[derive(Clone)]
pub struct HttpGateway {
    inner: Arc<HttpGatewayInner>,
}

struct HttpGatewayInner {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// Create a gateway for the configured API.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built (e.g. no TLS backend).
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(HttpGatewayInner {
                client,
                base_url: config.api_base_url.as_str().trim_end_matches('/').to_string(),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    /// Send a request and decode a JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = Self::check(request.send().await?).await?;
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| {
            error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse API response"
            );
            TransportError::Decode(e.to_string())
        })
    }

    /// Send a request whose success body is ignored (e.g. 204).
    async fn send_empty(&self, request: RequestBuilder) -> Result<(), TransportError> {
        Self::check(request.send().await?).await?;
        Ok(())
    }

    /// Turn a non-2xx response into a classified error.
    async fn check(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|payload| {
                payload
                    .get("detail")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned)
            });

        debug!(
            status = %status,
            detail = ?detail,
            "API returned non-success status"
        );

        Err(TransportError::from_status(status.as_u16(), detail))
    }
}

impl Gateway for HttpGateway {
    #[instrument(skip(self))]
    async fn health(&self) -> Result<HealthStatus, TransportError> {
        self.send_json(self.inner.client.get(self.url("/health")))
            .await
    }

    #[instrument(skip(self))]
    async fn list_templates(&self) -> Result<Vec<Template>, TransportError> {
        self.send_json(self.inner.client.get(self.url("/templates")))
            .await
    }

    #[instrument(skip(self))]
    async fn list_drafts(&self) -> Result<Vec<ProductDraft>, TransportError> {
        self.send_json(self.inner.client.get(self.url("/drafts")))
            .await
    }

    #[instrument(skip(self), fields(draft_id = %id))]
    async fn get_draft(&self, id: DraftId) -> Result<ProductDraft, TransportError> {
        self.send_json(self.inner.client.get(self.url(&format!("/drafts/{id}"))))
            .await
    }

    #[instrument(skip(self, files), fields(count = files.len()))]
    async fn upload_assets(&self, files: Vec<AssetUpload>) -> Result<Vec<DesignAsset>, TransportError> {
        let mut form = Form::new();
        for file in files {
            let mut part = Part::bytes(file.bytes).file_name(file.file_name);
            if let Some(mime) = file.mime_type {
                part = part
                    .mime_str(&mime)
                    .map_err(|e| TransportError::Network(e.to_string()))?;
            }
            form = form.part("files", part);
        }

        self.send_json(
            self.inner
                .client
                .post(self.url("/assets/upload"))
                .multipart(form),
        )
        .await
    }

    #[instrument(skip(self, drafts), fields(count = drafts.len()))]
    async fn create_drafts(&self, drafts: Vec<DraftSpec>) -> Result<Vec<ProductDraft>, TransportError> {
        #[derive(serde::Serialize)]
        struct BulkCreate {
            drafts: Vec<DraftSpec>,
        }

        self.send_json(
            self.inner
                .client
                .post(self.url("/drafts/bulk"))
                .json(&BulkCreate { drafts }),
        )
        .await
    }

    #[instrument(skip(self), fields(draft_id = %id))]
    async fn push_draft(&self, id: DraftId) -> Result<PushReceipt, TransportError> {
        self.send_json(
            self.inner
                .client
                .post(self.url(&format!("/drafts/{id}/push"))),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn list_integrations(&self) -> Result<IntegrationList, TransportError> {
        self.send_json(self.inner.client.get(self.url("/integrations")))
            .await
    }

    #[instrument(skip(self, api_key))]
    async fn connect_gelato(&self, api_key: ApiKey) -> Result<Ack, TransportError> {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct ConnectGelato<'a> {
            api_key: &'a str,
        }

        self.send_json(
            self.inner
                .client
                .post(self.url("/integrations/gelato"))
                .json(&ConnectGelato {
                    api_key: api_key.expose(),
                }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn disconnect_gelato(&self) -> Result<(), TransportError> {
        self.send_empty(self.inner.client.delete(self.url("/integrations/gelato")))
            .await
    }

    #[instrument(skip(self), fields(shop = %shop))]
    async fn start_shopify(&self, shop: ShopDomain) -> Result<ShopifyAuthorization, TransportError> {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct StartShopify<'a> {
            shop_domain: &'a str,
        }

        self.send_json(
            self.inner
                .client
                .post(self.url("/integrations/shopify/start"))
                .json(&StartShopify {
                    shop_domain: shop.as_str(),
                }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn disconnect_shopify(&self) -> Result<(), TransportError> {
        self.send_empty(self.inner.client.delete(self.url("/integrations/shopify")))
            .await
    }

    #[instrument(skip(self))]
    async fn test_shopify(&self) -> Result<Ack, TransportError> {
        self.send_json(
            self.inner
                .client
                .post(self.url("/integrations/shopify/test")),
        )
        .await
    }
}
