//! External secret provider configuration
//!
//! A provider config only describes how to reach a credential backend. The
//! path of an individual secret lives on the variable that references it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::generate_id;

/// Points a variable at one secret inside a configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretProviderRef {
    /// Id of the [`SecretProviderConfig`] to fetch from.
    pub provider_id: String,
    /// Provider-specific path or name of the secret.
    pub secret_path: String,
    /// Key inside the secret. Empty when the secret holds a single value.
    #[serde(default)]
    pub secret_key: String,
}

impl SecretProviderRef {
    /// Creates a new provider reference.
    #[must_use]
    pub fn new(
        provider_id: impl Into<String>,
        secret_path: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            secret_path: secret_path.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Returns the cache key for this reference.
    #[must_use]
    pub fn cache_key(&self) -> SecretCacheKey {
        SecretCacheKey {
            provider_id: self.provider_id.clone(),
            secret_path: self.secret_path.clone(),
            secret_key: self.secret_key.clone(),
        }
    }
}

/// Composite key of the fetched-secret cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SecretCacheKey {
    /// Provider id.
    pub provider_id: String,
    /// Secret path.
    pub secret_path: String,
    /// Secret key.
    pub secret_key: String,
}

impl fmt::Display for SecretCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.provider_id, self.secret_path, self.secret_key)
    }
}

/// A configured external credential backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretProviderConfig {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Disabled providers are never contacted.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Type-specific connection settings.
    pub kind: SecretProviderKind,
}

const fn default_enabled() -> bool {
    true
}

impl SecretProviderConfig {
    /// Creates a new enabled provider.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: SecretProviderKind) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            enabled: true,
            kind,
        }
    }

    /// Replaces the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Returns the provider type discriminant.
    #[must_use]
    pub const fn provider_type(&self) -> SecretProviderType {
        self.kind.provider_type()
    }
}

/// Connection settings for each supported provider type.
///
/// The `type` field is used as the discriminator for JSON serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretProviderKind {
    /// `HashiCorp` Vault, KV version 2 engine.
    HashicorpVault {
        /// Server address, e.g. `https://vault.example.com:8200`.
        address: String,
        /// Access token.
        token: String,
        /// Enterprise namespace.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
        /// KV mount point.
        #[serde(default = "default_vault_mount")]
        mount: String,
    },
    /// AWS Secrets Manager.
    AwsSecretsManager {
        /// Region, e.g. `eu-west-1`.
        region: String,
        /// Access key id.
        access_key_id: String,
        /// Secret access key.
        secret_access_key: String,
        /// Session token for temporary credentials.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_token: Option<String>,
    },
    /// Azure Key Vault.
    AzureKeyVault {
        /// Vault URL, e.g. `https://my-vault.vault.azure.net`.
        vault_url: String,
        /// Directory (tenant) id.
        tenant_id: String,
        /// Application (client) id.
        client_id: String,
        /// Client secret.
        client_secret: String,
    },
    /// Google Cloud Secret Manager.
    GcpSecretManager {
        /// Project id.
        project_id: String,
        /// Service account key file contents.
        credentials_json: String,
    },
    /// 1Password Connect server.
    OnePassword {
        /// Connect server URL.
        connect_host: String,
        /// Connect access token.
        connect_token: String,
    },
    /// Bitwarden Secrets Manager.
    Bitwarden {
        /// Machine account access token.
        access_token: String,
        /// Organization id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        organization_id: Option<String>,
        /// Self-hosted server URL.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server_url: Option<String>,
    },
}

fn default_vault_mount() -> String {
    "secret".to_string()
}

impl SecretProviderKind {
    /// Returns the provider type discriminant.
    #[must_use]
    pub const fn provider_type(&self) -> SecretProviderType {
        match self {
            Self::HashicorpVault { .. } => SecretProviderType::HashicorpVault,
            Self::AwsSecretsManager { .. } => SecretProviderType::AwsSecretsManager,
            Self::AzureKeyVault { .. } => SecretProviderType::AzureKeyVault,
            Self::GcpSecretManager { .. } => SecretProviderType::GcpSecretManager,
            Self::OnePassword { .. } => SecretProviderType::OnePassword,
            Self::Bitwarden { .. } => SecretProviderType::Bitwarden,
        }
    }
}

/// Provider type without connection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretProviderType {
    /// `HashiCorp` Vault
    HashicorpVault,
    /// AWS Secrets Manager
    AwsSecretsManager,
    /// Azure Key Vault
    AzureKeyVault,
    /// Google Cloud Secret Manager
    GcpSecretManager,
    /// 1Password Connect
    OnePassword,
    /// Bitwarden Secrets Manager
    Bitwarden,
}

impl SecretProviderType {
    /// Returns the wire name of the provider type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HashicorpVault => "hashicorp_vault",
            Self::AwsSecretsManager => "aws_secrets_manager",
            Self::AzureKeyVault => "azure_key_vault",
            Self::GcpSecretManager => "gcp_secret_manager",
            Self::OnePassword => "one_password",
            Self::Bitwarden => "bitwarden",
        }
    }
}

impl fmt::Display for SecretProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_from_reference() {
        let reference = SecretProviderRef::new("p1", "kv/app", "password");
        let key = reference.cache_key();
        assert_eq!(key.provider_id, "p1");
        assert_eq!(key.to_string(), "p1:kv/app#password");
    }

    #[test]
    fn test_provider_config_deserialization_uses_type_tag() {
        let json = r#"{
            "id": "p1",
            "name": "Team Vault",
            "kind": {"type": "hashicorp_vault", "address": "http://127.0.0.1:8200", "token": "t"}
        }"#;
        let config: SecretProviderConfig = serde_json::from_str(json).expect("valid config");

        assert!(config.enabled);
        assert_eq!(config.provider_type(), SecretProviderType::HashicorpVault);
        match config.kind {
            SecretProviderKind::HashicorpVault { mount, namespace, .. } => {
                assert_eq!(mount, "secret");
                assert!(namespace.is_none());
            }
            _ => panic!("Expected Vault provider"),
        }
    }

    #[test]
    fn test_cross_type_fields_are_rejected() {
        let json = r#"{"type": "one_password", "address": "http://x", "token": "t"}"#;
        let result: Result<SecretProviderKind, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_provider_type_names() {
        assert_eq!(SecretProviderType::OnePassword.as_str(), "one_password");
        assert_eq!(SecretProviderType::AwsSecretsManager.to_string(), "aws_secrets_manager");
    }
}
