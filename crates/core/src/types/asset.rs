//! Uploaded design assets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::AssetId;

/// A design file stored by the product service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignAsset {
    pub id: AssetId,
    /// Server URL of the stored file.
    pub file: String,
    pub original_filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}
