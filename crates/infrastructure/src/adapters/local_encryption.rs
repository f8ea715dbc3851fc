//! AES-256-GCM encryption of sensitive variable values.
//!
//! Each workspace has its own 256-bit master key. A ciphertext is stored as
//! base64 of `nonce (12 bytes) || ciphertext || tag`, with the variable id
//! bound as associated data.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::RwLock;
use strata_application::ports::{EncryptionError, EncryptionService};
use tokio::fs;
use tracing::{debug, info};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Location of the master key inside a workspace directory.
pub const MASTER_KEY_PATH: &str = ".strata/master.key";

/// Returns the master key file of a workspace.
#[must_use]
pub fn master_key_path(workspace_dir: &Path) -> PathBuf {
    workspace_dir.join(MASTER_KEY_PATH)
}

/// [`EncryptionService`] backed by in-memory per-workspace AES keys.
#[derive(Default)]
pub struct LocalEncryptionService {
    keys: RwLock<HashMap<String, Key<Aes256Gcm>>>,
}

impl std::fmt::Debug for LocalEncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEncryptionService")
            .field("workspaces", &self.keys.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl LocalEncryptionService {
    /// Creates a service with no workspace enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables a workspace with a freshly generated key and returns the key
    /// encoded as base64.
    pub fn enable(&self, workspace_id: &str) -> String {
        let key = Aes256Gcm::generate_key(OsRng);
        let encoded = STANDARD.encode(key.as_slice());
        self.keys.write().insert(workspace_id.to_string(), key);
        encoded
    }

    /// Enables a workspace with a base64-encoded key.
    ///
    /// # Errors
    /// Returns an error if the key is not valid base64 or not 32 bytes long.
    pub fn enable_with_key(&self, workspace_id: &str, encoded: &str) -> Result<(), EncryptionError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| EncryptionError::Encrypt(format!("invalid master key: {e}")))?;
        if bytes.len() != KEY_LEN {
            return Err(EncryptionError::Encrypt(format!(
                "master key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let key = Key::<Aes256Gcm>::clone_from_slice(&bytes);
        self.keys.write().insert(workspace_id.to_string(), key);
        Ok(())
    }

    /// Forgets the key of a workspace.
    pub fn disable(&self, workspace_id: &str) {
        self.keys.write().remove(workspace_id);
    }

    /// Loads the master key stored in a workspace directory.
    ///
    /// Returns `Ok(false)` when the workspace has no key file.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or holds an
    /// invalid key.
    pub async fn load_key_file(
        &self,
        workspace_id: &str,
        workspace_dir: &Path,
    ) -> Result<bool, EncryptionError> {
        let path = master_key_path(workspace_dir);
        let encoded = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(EncryptionError::Decrypt(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };
        self.enable_with_key(workspace_id, &encoded)?;
        debug!(workspace = workspace_id, "loaded master key");
        Ok(true)
    }

    /// Generates a key for the workspace and writes it to its key file.
    ///
    /// # Errors
    /// Returns an error if the key file cannot be written.
    pub async fn create_key_file(
        &self,
        workspace_id: &str,
        workspace_dir: &Path,
    ) -> Result<PathBuf, EncryptionError> {
        let path = master_key_path(workspace_dir);
        let encoded = self.enable(workspace_id);
        let io_err = |e: std::io::Error| {
            EncryptionError::Encrypt(format!("cannot write {}: {e}", path.display()))
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        fs::write(&path, format!("{encoded}\n")).await.map_err(io_err)?;
        info!(workspace = workspace_id, path = %path.display(), "created master key");
        Ok(path)
    }

    fn cipher(&self, workspace_id: &str) -> Result<Aes256Gcm, EncryptionError> {
        self.keys
            .read()
            .get(workspace_id)
            .map(Aes256Gcm::new)
            .ok_or_else(|| EncryptionError::NotEnabled(workspace_id.to_string()))
    }
}

#[async_trait]
impl EncryptionService for LocalEncryptionService {
    async fn is_enabled(&self, workspace_id: &str) -> bool {
        self.keys.read().contains_key(workspace_id)
    }

    async fn encrypt(
        &self,
        workspace_id: &str,
        variable_id: &str,
        plaintext: &str,
    ) -> Result<String, EncryptionError> {
        let cipher = self.cipher(workspace_id)?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let payload = Payload {
            msg: plaintext.as_bytes(),
            aad: variable_id.as_bytes(),
        };
        let sealed = cipher
            .encrypt(&nonce, payload)
            .map_err(|e| EncryptionError::Encrypt(e.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_LEN + sealed.len());
        combined.extend_from_slice(nonce.as_slice());
        combined.extend_from_slice(&sealed);
        Ok(STANDARD.encode(combined))
    }

    async fn decrypt(
        &self,
        workspace_id: &str,
        variable_id: &str,
        ciphertext: &str,
    ) -> Result<String, EncryptionError> {
        let cipher = self.cipher(workspace_id)?;
        let combined = STANDARD
            .decode(ciphertext)
            .map_err(|e| EncryptionError::Decrypt(format!("invalid base64: {e}")))?;
        if combined.len() <= NONCE_LEN {
            return Err(EncryptionError::Decrypt("ciphertext too short".to_string()));
        }

        let (nonce, sealed) = combined.split_at(NONCE_LEN);
        let payload = Payload {
            msg: sealed,
            aad: variable_id.as_bytes(),
        };
        let opened = cipher
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|_| EncryptionError::Decrypt("authentication failed".to_string()))?;

        String::from_utf8(opened).map_err(|e| EncryptionError::Decrypt(e.to_string()))
    }
}
