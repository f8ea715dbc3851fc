//! Scope repository port
//!
//! Persists globals, environments and secret provider settings of one
//! workspace.

use async_trait::async_trait;
use strata_domain::environment::{Environment, Globals, SecretProviderConfig};

/// Errors that can occur during scope persistence.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Repository trait for scope persistence.
#[async_trait]
pub trait ScopeRepository: Send + Sync {
    /// Loads the global variables. Returns empty globals if none are stored.
    async fn load_globals(&self) -> Result<Globals, RepositoryError>;

    /// Saves the global variables.
    async fn save_globals(&self, globals: &Globals) -> Result<(), RepositoryError>;

    /// Loads all environments, sorted by name.
    async fn load_environments(&self) -> Result<Vec<Environment>, RepositoryError>;

    /// Saves one environment, creating or replacing it.
    async fn save_environment(&self, environment: &Environment) -> Result<(), RepositoryError>;

    /// Deletes one environment.
    async fn delete_environment(&self, id: &str) -> Result<(), RepositoryError>;

    /// Loads the configured secret providers.
    async fn load_secret_providers(&self) -> Result<Vec<SecretProviderConfig>, RepositoryError>;

    /// Saves the secret providers, replacing the stored list.
    async fn save_secret_providers(
        &self,
        providers: &[SecretProviderConfig],
    ) -> Result<(), RepositoryError>;
}
