//! HTTP secret backend using reqwest.
//!
//! Talks to credential stores that expose a plain HTTP API:
//! - `HashiCorp` Vault, KV version 2 engine
//! - 1Password Connect
//!
//! The cloud providers need request signing or OAuth flows and are reported
//! as unsupported.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use strata_application::ports::{
    SecretBackend, SecretBackendError, SecretEntry, SecretFetchRequest, SecretFetchResponse,
};
use strata_domain::environment::SecretProviderType;
use tracing::debug;

/// [`SecretBackend`] that performs real HTTP calls.
#[derive(Debug, Clone)]
pub struct HttpSecretBackend {
    client: Client,
}

impl HttpSecretBackend {
    /// Creates a backend with default client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created.
    pub fn new() -> Result<Self, SecretBackendError> {
        let client = Client::builder()
            .user_agent(concat!("strata/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SecretBackendError::Transport(e.to_string()))?;

        Ok(Self { client })
    }

    async fn fetch_vault(
        &self,
        request: &SecretFetchRequest,
    ) -> Result<SecretFetchResponse, SecretBackendError> {
        let address = required(request, "address")?;
        let token = required(request, "token")?;
        let mount = request.param("mount").unwrap_or("secret");
        let url = format!(
            "{}/v1/{}/data/{}",
            address.trim_end_matches('/'),
            mount.trim_matches('/'),
            request.path.trim_start_matches('/')
        );

        let mut builder = self.client.get(&url).header("X-Vault-Token", token);
        if let Some(namespace) = request.param("namespace") {
            builder = builder.header("X-Vault-Namespace", namespace);
        }

        debug!(%url, "fetching vault secret");
        let response = builder.send().await.map_err(transport)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(SecretFetchResponse::failed("secret not found"));
        }
        if !status.is_success() {
            return Ok(SecretFetchResponse::failed(format!("vault returned {status}")));
        }

        let body: VaultResponse = response
            .json()
            .await
            .map_err(|e| SecretBackendError::Backend(format!("unexpected vault response: {e}")))?;

        let secrets = body
            .data
            .data
            .into_iter()
            .map(|(key, value)| SecretEntry::new(key, stringify(value)))
            .collect();
        Ok(SecretFetchResponse::ok(secrets))
    }

    async fn fetch_one_password(
        &self,
        request: &SecretFetchRequest,
    ) -> Result<SecretFetchResponse, SecretBackendError> {
        let host = required(request, "connectHost")?;
        let token = required(request, "connectToken")?;
        let url = format!(
            "{}/v1/{}",
            host.trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );

        debug!(%url, "fetching 1password item");
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(SecretFetchResponse::failed("item not found"));
        }
        if !status.is_success() {
            return Ok(SecretFetchResponse::failed(format!("1password returned {status}")));
        }

        let item: OnePasswordItem = response
            .json()
            .await
            .map_err(|e| SecretBackendError::Backend(format!("unexpected 1password response: {e}")))?;

        let secrets = item
            .fields
            .into_iter()
            .filter_map(|field| {
                let value = field.value?;
                let key = field.label.or(field.id)?;
                Some(SecretEntry::new(key, value))
            })
            .collect();
        Ok(SecretFetchResponse::ok(secrets))
    }
}

#[async_trait]
impl SecretBackend for HttpSecretBackend {
    async fn fetch(
        &self,
        request: SecretFetchRequest,
    ) -> Result<SecretFetchResponse, SecretBackendError> {
        match request.provider_type {
            SecretProviderType::HashicorpVault => self.fetch_vault(&request).await,
            SecretProviderType::OnePassword => self.fetch_one_password(&request).await,
            other => Err(SecretBackendError::Unsupported(other)),
        }
    }
}

#[derive(Deserialize)]
struct VaultResponse {
    data: VaultData,
}

#[derive(Deserialize)]
struct VaultData {
    #[serde(default)]
    data: serde_json::Map<String, Value>,
}

#[derive(Deserialize)]
struct OnePasswordItem {
    #[serde(default)]
    fields: Vec<OnePasswordField>,
}

#[derive(Deserialize)]
struct OnePasswordField {
    id: Option<String>,
    label: Option<String>,
    value: Option<String>,
}

fn required<'a>(request: &'a SecretFetchRequest, name: &str) -> Result<&'a str, SecretBackendError> {
    request
        .param(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SecretBackendError::InvalidConfig(format!("missing '{name}'")))
}

fn transport(error: reqwest::Error) -> SecretBackendError {
    SecretBackendError::Transport(error.to_string())
}

fn stringify(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
