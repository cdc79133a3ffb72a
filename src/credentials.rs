//! Credential resolution for the live billing integration.
//!
//! Keys are resolved in two tiers: an operator-scoped override held by the
//! credential store collaborator, then a single process-wide default injected
//! through configuration. Absence at both tiers is a normal state meaning
//! "live billing integration disabled for this operator" - it is never an
//! error and never read from an ambient global.

use crate::error::Result;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

/// Name under which an operator-scoped billing key is stored.
pub const BILLING_API_KEY: &str = "billing_api_key";

/// Trait for the credential store collaborator.
///
/// Implement this against your secrets backend. Values are operator-scoped
/// and string-valued; length limits are the store's concern, not this
/// engine's. An in-memory implementation is provided for testing.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Get an operator-scoped credential value.
    ///
    /// Returns `Ok(None)` when the operator has no stored value for
    /// `key_name`.
    async fn get(&self, operator_id: &str, key_name: &str) -> Result<Option<String>>;
}

/// Two-tier credential lookup: operator override first, then the
/// process-wide default.
#[derive(Clone)]
pub struct CredentialResolver<S> {
    store: S,
    default_key: Option<SecretString>,
}

impl<S: CredentialStore> CredentialResolver<S> {
    /// Create a resolver over a credential store.
    ///
    /// `default_key` is the process-wide fallback, typically
    /// `RevenueConfig::default_api_key`.
    pub fn new(store: S, default_key: Option<String>) -> Self {
        Self {
            store,
            default_key: default_key.map(SecretString::new),
        }
    }

    /// Resolve the billing API key for an operator.
    ///
    /// Checks the operator-scoped override, then the process default.
    /// `Ok(None)` means the live integration is disabled for this operator.
    pub async fn resolve(&self, operator_id: &str) -> Result<Option<SecretString>> {
        if let Some(key) = self.store.get(operator_id, BILLING_API_KEY).await? {
            if !key.is_empty() {
                tracing::debug!(
                    target: "ledgerline::credentials",
                    operator_id = operator_id,
                    "Using operator-scoped billing key"
                );
                return Ok(Some(SecretString::new(key)));
            }
        }

        match &self.default_key {
            Some(key) => {
                tracing::debug!(
                    target: "ledgerline::credentials",
                    operator_id = operator_id,
                    "Using process-wide default billing key"
                );
                Ok(Some(key.clone()))
            }
            None => Ok(None),
        }
    }

    /// Whether a process-wide default key is configured.
    #[must_use]
    pub fn has_default(&self) -> bool {
        self.default_key.is_some()
    }
}

// Debug implementation that doesn't expose the default key
impl<S> std::fmt::Debug for CredentialResolver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("has_default", &self.default_key.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(any(test, feature = "test-revenue"))]
pub mod test {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    /// In-memory credential store for testing.
    #[derive(Default, Clone)]
    pub struct InMemoryCredentialStore {
        values: Arc<RwLock<HashMap<(String, String), String>>>,
    }

    impl InMemoryCredentialStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Store a credential for an operator.
        pub fn insert(&self, operator_id: &str, key_name: &str, value: &str) {
            self.values.write().unwrap().insert(
                (operator_id.to_string(), key_name.to_string()),
                value.to_string(),
            );
        }
    }

    #[async_trait]
    impl CredentialStore for InMemoryCredentialStore {
        async fn get(&self, operator_id: &str, key_name: &str) -> Result<Option<String>> {
            Ok(self
                .values
                .read()
                .unwrap()
                .get(&(operator_id.to_string(), key_name.to_string()))
                .cloned())
        }
    }
}
