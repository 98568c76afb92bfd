//! Product drafts and the payloads used to create and push them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::asset::DesignAsset;
use super::id::{AssetId, DraftId, TemplateId};
use super::price::Price;
use super::status::DraftStatus;
use super::template::Template;

/// A product draft as mirrored from the server.
///
/// Clients never mutate a draft directly; they observe it through queries
/// and propose changes through mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub id: DraftId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub seo: serde_json::Map<String, serde_json::Value>,
    pub status: DraftStatus,
    pub price: Price,
    pub template: Template,
    #[serde(default)]
    pub assets: Vec<DesignAsset>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Acknowledgement returned when a push is queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReceipt {
    /// Background job identifier.
    pub task_id: String,
    pub draft_id: DraftId,
}

/// Errors that can occur when validating a [`DraftSpec`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftSpecError {
    /// Title is blank.
    #[error("draft title cannot be empty")]
    EmptyTitle,
    /// Title is too long.
    #[error("draft title must be at most {max} characters")]
    TitleTooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// No assets were attached.
    #[error("draft needs at least one asset")]
    NoAssets,
}

/// One entry of a bulk draft creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSpec {
    pub template_id: TemplateId,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub price: Price,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub asset_ids: Vec<AssetId>,
}

impl DraftSpec {
    /// Maximum title length accepted by the server.
    pub const MAX_TITLE_LENGTH: usize = 255;

    /// Check the spec against the server's input rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the title is blank or too long, or no asset is
    /// attached.
    pub fn validate(&self) -> Result<(), DraftSpecError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DraftSpecError::EmptyTitle);
        }
        if title.chars().count() > Self::MAX_TITLE_LENGTH {
            return Err(DraftSpecError::TitleTooLong {
                max: Self::MAX_TITLE_LENGTH,
            });
        }
        if self.asset_ids.is_empty() {
            return Err(DraftSpecError::NoAssets);
        }
        Ok(())
    }
}
