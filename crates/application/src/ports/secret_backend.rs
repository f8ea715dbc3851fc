//! Secret backend port
//!
//! The backend performs the actual network call to a credential store. The
//! gateway translates typed provider settings into a [`SecretFetchRequest`]
//! and picks the requested entry out of the response.

use std::collections::BTreeMap;

use async_trait::async_trait;
use strata_domain::environment::SecretProviderType;

/// A single fetch addressed to one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretFetchRequest {
    /// Which kind of backend to talk to.
    pub provider_type: SecretProviderType,
    /// Connection parameters, keyed by camelCase name (`address`, `token`, ...).
    pub params: BTreeMap<String, String>,
    /// Provider-specific secret path or name.
    pub path: String,
}

impl SecretFetchRequest {
    /// Returns a connection parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// One key/value pair returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEntry {
    /// Key inside the secret.
    pub key: String,
    /// Secret value.
    pub value: String,
}

impl SecretEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The backend's answer to a [`SecretFetchRequest`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretFetchResponse {
    /// Whether the backend reports success.
    pub success: bool,
    /// Entries of the secret.
    pub secrets: Vec<SecretEntry>,
    /// Backend-supplied failure reason.
    pub error: Option<String>,
}

impl SecretFetchResponse {
    /// Creates a successful response.
    #[must_use]
    pub const fn ok(secrets: Vec<SecretEntry>) -> Self {
        Self {
            success: true,
            secrets,
            error: None,
        }
    }

    /// Creates a failed response.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            secrets: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Errors that can occur while talking to a backend.
#[derive(Debug, thiserror::Error)]
pub enum SecretBackendError {
    /// The request could not be sent or the connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with an unexpected status or body.
    #[error("backend error: {0}")]
    Backend(String),

    /// A required connection parameter is missing or malformed.
    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),

    /// The backend does not handle this provider type.
    #[error("unsupported provider type: {0}")]
    Unsupported(SecretProviderType),
}

/// Port for fetching secrets from external credential stores.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Performs one fetch.
    ///
    /// # Errors
    /// Returns an error if the backend could not be reached or answered with
    /// something that is not a secret.
    async fn fetch(
        &self,
        request: SecretFetchRequest,
    ) -> Result<SecretFetchResponse, SecretBackendError>;
}
