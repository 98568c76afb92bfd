//! Query keys.

use std::fmt;
use std::sync::Arc;

/// One element of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Int(i64),
    Str(Arc<str>),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        Self::Str(Arc::from(s))
    }
}

impl From<i64> for KeyPart {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<podforge_core::DraftId> for KeyPart {
    fn from(id: podforge_core::DraftId) -> Self {
        Self::Int(id.as_i64())
    }
}

/// Identity of a cacheable read: an ordered tuple of primitive values.
///
/// Two keys are equal iff their parts are element-wise equal. Keys are
/// immutable; cloning shares the underlying parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Arc<[KeyPart]>);

impl QueryKey {
    /// Build a key from its parts.
    pub fn new(parts: impl IntoIterator<Item = KeyPart>) -> Self {
        Self(parts.into_iter().collect())
    }

    /// Whether `prefix` names this key or one of its ancestors.
    ///
    /// `("drafts")` is a prefix of `("drafts")` and `("drafts", "page", 2)`,
    /// but not of `("draft", 5)`.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{part}")?;
        }
        f.write_str(")")
    }
}

/// Build a [`QueryKey`] from a list of primitives.
///
/// ```
/// use podforge_client::query_key;
///
/// let key = query_key!("draft", 5_i64);
/// assert_eq!(key.to_string(), r#"("draft", 5)"#);
/// ```
#[macro_export]
macro_rules! query_key {
    ($($part:expr),+ $(,)?) => {
        $crate::cache::QueryKey::new([$($crate::cache::KeyPart::from($part)),+])
    };
}
