//! Core types for Podforge.
//!
//! This module provides type-safe wrappers for the product service's domain
//! concepts and the records it returns.

pub mod asset;
pub mod credential;
pub mod draft;
pub mod id;
pub mod integration;
pub mod price;
pub mod shop_domain;
pub mod status;
pub mod template;

pub use asset::DesignAsset;
pub use credential::ApiKey;
pub use draft::{DraftSpec, DraftSpecError, ProductDraft, PushReceipt};
pub use id::*;
pub use integration::{IntegrationItem, IntegrationList};
pub use price::{Price, PriceError};
pub use shop_domain::{ShopDomain, ShopDomainError};
pub use status::*;
pub use template::Template;
