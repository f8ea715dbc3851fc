//! Encryption service port

use async_trait::async_trait;

/// Errors that can occur during encryption operations.
#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    /// No master key is configured for the workspace.
    #[error("encryption is not enabled for workspace {0}")]
    NotEnabled(String),

    /// Encrypting failed.
    #[error("encrypt failed: {0}")]
    Encrypt(String),

    /// Decrypting failed, including authentication and encoding failures.
    #[error("decrypt failed: {0}")]
    Decrypt(String),
}

/// Workspace-scoped symmetric encryption of sensitive values.
///
/// `variable_id` is bound to the ciphertext as associated data. A ciphertext
/// only decrypts under the id it was produced with.
#[async_trait]
pub trait EncryptionService: Send + Sync {
    /// Returns true if the workspace has a master key.
    async fn is_enabled(&self, workspace_id: &str) -> bool;

    /// Encrypts `plaintext`, binding it to `variable_id`.
    ///
    /// # Errors
    /// Returns an error if the workspace has no key or encryption fails.
    async fn encrypt(
        &self,
        workspace_id: &str,
        variable_id: &str,
        plaintext: &str,
    ) -> Result<String, EncryptionError>;

    /// Decrypts `ciphertext`.
    ///
    /// # Errors
    /// Returns an error if the workspace has no key or the ciphertext is
    /// malformed or was produced under a different key.
    async fn decrypt(
        &self,
        workspace_id: &str,
        variable_id: &str,
        ciphertext: &str,
    ) -> Result<String, EncryptionError>;
}
