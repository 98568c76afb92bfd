//! Shopify shop domain type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ShopDomain`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopDomainError {
    /// The input is empty after trimming.
    #[error("shop domain is required")]
    Empty,
    /// The normalized domain is not a `myshopify.com` host.
    #[error("shop domain must end with {suffix} (got {domain})")]
    InvalidSuffix {
        /// The normalized input.
        domain: String,
        /// Required suffix.
        suffix: &'static str,
    },
}

/// A normalized `*.myshopify.com` shop domain.
///
/// ## Normalization
///
/// - Surrounding whitespace is trimmed and the value is lowercased
/// - A bare shop handle (no `.`) gets `.myshopify.com` appended
/// - Anything containing a `.` is kept as-is and must already end with
///   `.myshopify.com`
///
/// ## Examples
///
/// ```
/// use podforge_core::ShopDomain;
///
/// assert_eq!(ShopDomain::parse("acme").unwrap().as_str(), "acme.myshopify.com");
/// assert_eq!(
///     ShopDomain::parse(" Acme.MyShopify.com ").unwrap().as_str(),
///     "acme.myshopify.com"
/// );
///
/// // Custom domains are rejected before any request is made
/// assert!(ShopDomain::parse("acme.com").is_err());
/// assert!(ShopDomain::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Suffix every valid shop domain ends with.
    pub const SUFFIX: &'static str = ".myshopify.com";

    /// Normalize raw operator input without validating it.
    ///
    /// Returns an empty string for blank input.
    #[must_use]
    pub fn normalize(input: &str) -> String {
        let cleaned = input.trim().to_lowercase();
        if cleaned.is_empty() || cleaned.contains('.') {
            return cleaned;
        }
        format!("{cleaned}{}", Self::SUFFIX)
    }

    /// Normalize and validate a shop domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is blank or the normalized value does
    /// not end with `.myshopify.com`.
    pub fn parse(input: &str) -> Result<Self, ShopDomainError> {
        let normalized = Self::normalize(input);

        if normalized.is_empty() {
            return Err(ShopDomainError::Empty);
        }

        if !normalized.ends_with(Self::SUFFIX) {
            return Err(ShopDomainError::InvalidSuffix {
                domain: normalized,
                suffix: Self::SUFFIX,
            });
        }

        Ok(Self(normalized))
    }

    /// Returns the domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `ShopDomain` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
