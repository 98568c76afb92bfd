//! Integration credential types.

use secrecy::{ExposeSecret, SecretString};

/// A server-side API key entered by the operator (e.g. for Gelato).
///
/// The key is only ever forwarded to the product service; it is never
/// cached client-side. `Debug` is redacted.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Trim and wrap a raw key.
    ///
    /// Returns `None` if the key is blank.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(SecretString::from(trimmed.to_owned())))
    }

    /// Expose the key for sending over the wire.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_rejected() {
        assert!(ApiKey::parse("").is_none());
        assert!(ApiKey::parse("   ").is_none());
    }

    #[test]
    fn test_key_trimmed_and_redacted() {
        let key = ApiKey::parse("  gel-123  ").unwrap();
        assert_eq!(key.expose(), "gel-123");
        assert_eq!(format!("{key:?}"), "ApiKey([REDACTED])");
    }
}
