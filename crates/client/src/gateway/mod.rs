//! Transport gateway for the product service REST API.
//!
//! The [`Gateway`] trait names every operation the client performs. The
//! cache, mutation executor and poller only ever see this trait;
//! [`HttpGateway`] is the production implementation, and tests plug in a
//! scripted one.

mod http;

use std::future::Future;

use podforge_core::{
    ApiKey, DesignAsset, DraftId, DraftSpec, IntegrationList, ProductDraft, PushReceipt,
    ShopDomain, Template,
};
use serde::{Deserialize, Serialize};
use url::Url;

pub use http::HttpGateway;

use crate::error::TransportError;

/// Response of the liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// Generic `{ok}` acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

/// Where to send the operator to authorize the Shopify app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopifyAuthorization {
    pub redirect_url: Url,
}

/// A design file to upload.
#[derive(Clone, PartialEq, Eq)]
pub struct AssetUpload {
    pub file_name: String,
    /// MIME type; the server falls back to `application/octet-stream`.
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for AssetUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetUpload")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Performs the network call for each named operation.
///
/// Implementations classify failures into [`TransportError`]; they never
/// touch the cache. Timeouts, if any, are the implementation's business.
pub trait Gateway: Clone + Send + Sync + 'static {
    /// `GET /health`
    fn health(&self) -> impl Future<Output = Result<HealthStatus, TransportError>> + Send;

    /// `GET /templates`
    fn list_templates(&self) -> impl Future<Output = Result<Vec<Template>, TransportError>> + Send;

    /// `GET /drafts`
    fn list_drafts(&self)
    -> impl Future<Output = Result<Vec<ProductDraft>, TransportError>> + Send;

    /// `GET /drafts/{id}`
    fn get_draft(
        &self,
        id: DraftId,
    ) -> impl Future<Output = Result<ProductDraft, TransportError>> + Send;

    /// `POST /assets/upload` (multipart, one `files` part per upload)
    fn upload_assets(
        &self,
        files: Vec<AssetUpload>,
    ) -> impl Future<Output = Result<Vec<DesignAsset>, TransportError>> + Send;

    /// `POST /drafts/bulk`
    fn create_drafts(
        &self,
        drafts: Vec<DraftSpec>,
    ) -> impl Future<Output = Result<Vec<ProductDraft>, TransportError>> + Send;

    /// `POST /drafts/{id}/push`
    fn push_draft(
        &self,
        id: DraftId,
    ) -> impl Future<Output = Result<PushReceipt, TransportError>> + Send;

    /// `GET /integrations`
    fn list_integrations(
        &self,
    ) -> impl Future<Output = Result<IntegrationList, TransportError>> + Send;

    /// `POST /integrations/gelato`
    fn connect_gelato(
        &self,
        api_key: ApiKey,
    ) -> impl Future<Output = Result<Ack, TransportError>> + Send;

    /// `DELETE /integrations/gelato`
    fn disconnect_gelato(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// `POST /integrations/shopify/start`
    fn start_shopify(
        &self,
        shop: ShopDomain,
    ) -> impl Future<Output = Result<ShopifyAuthorization, TransportError>> + Send;

    /// `DELETE /integrations/shopify`
    fn disconnect_shopify(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// `POST /integrations/shopify/test`
    fn test_shopify(&self) -> impl Future<Output = Result<Ack, TransportError>> + Send;
}
