//! Per-provider connection state.
//!
//! Nothing here is stored independently: the state of a provider is a
//! projection of the server-confirmed integrations query plus the local set
//! of in-flight actions. The machine never marks a provider connected on its
//! own; only a re-read of the integrations query can do that.
//!
//! ```text
//! Disconnected --connect--> Pending --> Connected | Error
//! Connected --disconnect--> Pending --> Disconnected
//! Connected --test--------> Pending --> Connected | Error
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use podforge_core::{IntegrationItem, IntegrationList, IntegrationStatus, Provider};

use crate::error::{TransportError, ValidationError};

/// User-initiated action on a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderAction {
    Connect,
    Disconnect,
    Test,
}

impl ProviderAction {
    /// Whether the action may start from `state`, ignoring provider support.
    #[must_use]
    pub const fn allowed_from(self, state: &ConnectionState) -> bool {
        match state {
            ConnectionState::Pending(_) => false,
            ConnectionState::Disconnected => matches!(self, Self::Connect),
            ConnectionState::Connected | ConnectionState::Error { .. } => true,
        }
    }

    /// Whether `provider` offers this action at all.
    #[must_use]
    pub const fn supported_by(self, provider: Provider) -> bool {
        !matches!((self, provider), (Self::Test, Provider::Gelato))
    }
}

impl fmt::Display for ProviderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Disconnect => write!(f, "disconnect"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// Connection state of one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// An action is in flight; other actions are rejected locally.
    Pending(ProviderAction),
    Connected,
    /// The server reports the credential as broken.
    Error { message: Option<String> },
}

impl ConnectionState {
    /// State reported by the server for an item, ignoring local actions.
    #[must_use]
    pub fn from_item(item: &IntegrationItem) -> Self {
        match item.status {
            IntegrationStatus::Connected => Self::Connected,
            IntegrationStatus::Disconnected => Self::Disconnected,
            IntegrationStatus::Error => Self::Error {
                message: item.error_message.clone(),
            },
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Pending(action) => write!(f, "pending ({action})"),
            Self::Connected => write!(f, "connected"),
            Self::Error { message: Some(m) } => write!(f, "error: {m}"),
            Self::Error { message: None } => write!(f, "error"),
        }
    }
}

/// Everything a view needs to render one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderView {
    pub provider: Provider,
    /// Server record, or the fallback when the server has none.
    pub item: IntegrationItem,
    pub state: ConnectionState,
    /// Failure of the last integrations refresh, shown next to the last
    /// known state.
    pub refresh_error: Option<TransportError>,
}

impl ProviderView {
    /// Reject `action` locally if it is not legal right now.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` naming why the action cannot start.
    pub fn check(&self, action: ProviderAction) -> Result<(), ValidationError> {
        if !action.supported_by(self.provider) {
            return Err(ValidationError::Unsupported {
                provider: self.provider,
                action,
            });
        }
        if matches!(self.state, ConnectionState::Pending(_)) {
            return Err(ValidationError::Busy {
                provider: self.provider,
            });
        }
        if !action.allowed_from(&self.state) {
            return Err(ValidationError::NotConnected {
                provider: self.provider,
            });
        }
        Ok(())
    }
}

/// Project one provider's view from the integrations query and local flags.
///
/// `integrations` is `None` until the first successful load; the provider
/// then shows its fallback record.
#[must_use]
pub fn derive_view(
    provider: Provider,
    integrations: Option<&IntegrationList>,
    refresh_error: Option<&TransportError>,
    pending: Option<ProviderAction>,
) -> ProviderView {
    let item = integrations.map_or_else(
        || IntegrationItem::fallback(provider),
        |list| list.item_or_fallback(provider),
    );
    let state = pending.map_or_else(|| ConnectionState::from_item(&item), ConnectionState::Pending);

    ProviderView {
        provider,
        item,
        state,
        refresh_error: refresh_error.cloned(),
    }
}

/// In-flight actions, at most one per provider.
#[derive(Debug, Clone, Default)]
pub struct PendingActions {
    inner: Arc<Mutex<BTreeMap<Provider, ProviderAction>>>,
}

impl PendingActions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn actions(&self) -> MutexGuard<'_, BTreeMap<Provider, ProviderAction>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Action in flight for `provider`, if any.
    #[must_use]
    pub fn get(&self, provider: Provider) -> Option<ProviderAction> {
        self.actions().get(&provider).copied()
    }

    /// Mark `action` in flight until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Busy` if the provider already has an action
    /// in flight.
    pub fn begin(
        &self,
        provider: Provider,
        action: ProviderAction,
    ) -> Result<PendingGuard, ValidationError> {
        let mut actions = self.actions();
        if actions.contains_key(&provider) {
            return Err(ValidationError::Busy { provider });
        }
        actions.insert(provider, action);
        drop(actions);

        Ok(PendingGuard {
            actions: self.clone(),
            provider,
        })
    }
}

/// Clears the pending action when the mutation settles, however it ends.
#[derive(Debug)]
#[must_use = "the action stops being pending as soon as the guard is dropped"]
pub struct PendingGuard {
    actions: PendingActions,
    provider: Provider,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.actions.actions().remove(&self.provider);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integrations() -> IntegrationList {
        serde_json::from_str(
            r#"{"items":[{"provider":"shopify","status":"error","errorMessage":"token expired","metadata":{}}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_derives_error_and_fallback() {
        let list = integrations();

        let shopify = derive_view(Provider::Shopify, Some(&list), None, None);
        assert_eq!(
            shopify.state,
            ConnectionState::Error {
                message: Some("token expired".to_string())
            }
        );

        let gelato = derive_view(Provider::Gelato, Some(&list), None, None);
        assert_eq!(gelato.state, ConnectionState::Disconnected);
        assert!(gelato.item.metadata.is_empty());
    }

    #[test]
    fn test_unloaded_integrations_use_fallback() {
        let view = derive_view(Provider::Shopify, None, None, None);
        assert_eq!(view.state, ConnectionState::Disconnected);
        assert_eq!(view.item, IntegrationItem::fallback(Provider::Shopify));
    }

    #[test]
    fn test_pending_overrides_server_state() {
        let list = integrations();
        let view = derive_view(
            Provider::Shopify,
            Some(&list),
            None,
            Some(ProviderAction::Test),
        );
        assert_eq!(view.state, ConnectionState::Pending(ProviderAction::Test));
        assert_eq!(
            view.check(ProviderAction::Connect),
            Err(ValidationError::Busy {
                provider: Provider::Shopify
            })
        );
    }

    #[test]
    fn test_action_legality() {
        let disconnected = derive_view(Provider::Gelato, None, None, None);
        assert_eq!(disconnected.check(ProviderAction::Connect), Ok(()));
        assert_eq!(
            disconnected.check(ProviderAction::Disconnect),
            Err(ValidationError::NotConnected {
                provider: Provider::Gelato
            })
        );
        assert_eq!(
            disconnected.check(ProviderAction::Test),
            Err(ValidationError::Unsupported {
                provider: Provider::Gelato,
                action: ProviderAction::Test,
            })
        );

        let errored = derive_view(Provider::Shopify, Some(&integrations()), None, None);
        assert_eq!(errored.check(ProviderAction::Test), Ok(()));
        assert_eq!(errored.check(ProviderAction::Disconnect), Ok(()));
        assert_eq!(errored.check(ProviderAction::Connect), Ok(()));
    }

    #[test]
    fn test_refresh_error_is_kept_beside_last_state() {
        let list = integrations();
        let err = TransportError::Network("offline".to_string());
        let view = derive_view(Provider::Shopify, Some(&list), Some(&err), None);
        assert_eq!(view.refresh_error, Some(err));
        assert!(matches!(view.state, ConnectionState::Error { .. }));
    }

    #[test]
    fn test_pending_guard_clears_on_drop() {
        let pending = PendingActions::new();
        let guard = pending
            .begin(Provider::Gelato, ProviderAction::Connect)
            .unwrap();
        assert_eq!(pending.get(Provider::Gelato), Some(ProviderAction::Connect));
        assert!(pending
            .begin(Provider::Gelato, ProviderAction::Disconnect)
            .is_err());
        assert!(pending
            .begin(Provider::Shopify, ProviderAction::Connect)
            .is_ok());

        drop(guard);
        assert_eq!(pending.get(Provider::Gelato), None);
    }
}
