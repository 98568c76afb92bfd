//! Product templates offered by the fulfillment catalog.

use serde::{Deserialize, Serialize};

use super::id::TemplateId;

/// A product template (e.g. a t-shirt blank) drafts are created from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    /// Identifier of the template in the Gelato catalog.
    pub gelato_template_id: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}
