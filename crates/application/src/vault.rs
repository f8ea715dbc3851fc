//! Sensitive value vault
//!
//! Encrypts and decrypts `is_secret` variables through the workspace
//! [`EncryptionService`] and caches plaintext per variable id.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use strata_domain::environment::Variable;
use tracing::{debug, warn};

use crate::error::ResolutionError;
use crate::ports::{EncryptionError, EncryptionService};

type DecryptOutcome = Result<String, ResolutionError>;
type InFlight = Shared<BoxFuture<'static, DecryptOutcome>>;
type DecryptedCache = HashMap<String, DecryptedEntry>;

/// Cached plaintext of one sensitive variable.
///
/// The entry is only valid while the variable still holds `ciphertext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedEntry {
    ciphertext: String,
    plaintext: String,
}

/// Point-in-time view of the decrypted cache.
#[derive(Debug, Clone)]
pub struct DecryptedSnapshot {
    entries: Arc<DecryptedCache>,
}

impl DecryptedSnapshot {
    /// Returns the cached plaintext if it matches the variable's ciphertext.
    #[must_use]
    pub fn get(&self, variable: &Variable) -> Option<String> {
        self.entries
            .get(&variable.id)
            .filter(|entry| entry.ciphertext == variable.value)
            .map(|entry| entry.plaintext.clone())
    }
}

/// Encrypts, decrypts and caches sensitive variable values.
pub struct SensitiveVault<E> {
    service: Arc<E>,
    workspace_id: Arc<ArcSwap<String>>,
    cache: Arc<ArcSwap<DecryptedCache>>,
    in_flight: Arc<Mutex<HashMap<String, (u64, InFlight)>>>,
    epoch: Arc<AtomicU64>,
    tickets: AtomicU64,
}

impl<E: EncryptionService + 'static> SensitiveVault<E> {
    /// Creates a vault bound to a workspace.
    pub fn new(service: Arc<E>, workspace_id: impl Into<String>) -> Self {
        Self {
            service,
            workspace_id: Arc::new(ArcSwap::from_pointee(workspace_id.into())),
            cache: Arc::new(ArcSwap::from_pointee(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            epoch: Arc::new(AtomicU64::new(0)),
            tickets: AtomicU64::new(0),
        }
    }

    /// Returns the current workspace id.
    #[must_use]
    pub fn workspace_id(&self) -> Arc<String> {
        self.workspace_id.load_full()
    }

    /// Switches to another workspace and drops all cached plaintext.
    pub fn set_workspace(&self, workspace_id: impl Into<String>) {
        self.workspace_id.store(Arc::new(workspace_id.into()));
        self.clear_cache();
    }

    /// Returns true if the workspace has an encryption key.
    pub async fn is_enabled(&self) -> bool {
        self.service.is_enabled(&self.workspace_id()).await
    }

    /// Encrypts a value.
    ///
    /// # Errors
    /// Returns [`ResolutionError::VaultNotEnabled`] if the workspace has no
    /// key, or [`ResolutionError::Encryption`] if encryption fails.
    pub async fn encrypt(&self, variable_id: &str, plaintext: &str) -> Result<String, ResolutionError> {
        let workspace_id = self.workspace_id();
        self.service
            .encrypt(&workspace_id, variable_id, plaintext)
            .await
            .map_err(|e| map_encryption_error(e, &workspace_id))
    }

    /// Decrypts a value.
    ///
    /// # Errors
    /// Returns [`ResolutionError::VaultNotEnabled`] if the workspace has no
    /// key, or [`ResolutionError::Decryption`] if decryption fails.
    pub async fn decrypt(&self, variable_id: &str, ciphertext: &str) -> Result<String, ResolutionError> {
        let workspace_id = self.workspace_id();
        self.service
            .decrypt(&workspace_id, variable_id, ciphertext)
            .await
            .map_err(|e| map_encryption_error(e, &workspace_id))
    }

    /// Returns a point-in-time view of the cache.
    #[must_use]
    pub fn snapshot(&self) -> DecryptedSnapshot {
        DecryptedSnapshot {
            entries: self.cache.load_full(),
        }
    }

    /// Returns the cached plaintext of a variable.
    #[must_use]
    pub fn cached_value(&self, variable: &Variable) -> Option<String> {
        self.snapshot().get(variable)
    }

    /// Returns the usable value of a variable: the raw value when it is not
    /// sensitive, otherwise its plaintext.
    ///
    /// Concurrent calls for the same variable share one decrypt call. Failures
    /// are logged and yield `None`.
    pub async fn decrypt_sensitive_value(&self, variable: &Variable) -> Option<String> {
        self.try_decrypt_sensitive_value(variable).await.ok()
    }

    /// Like [`decrypt_sensitive_value`](Self::decrypt_sensitive_value),
    /// reporting why no value is available.
    ///
    /// # Errors
    /// Returns the decryption failure.
    pub async fn try_decrypt_sensitive_value(
        &self,
        variable: &Variable,
    ) -> Result<String, ResolutionError> {
        if !variable.needs_decryption() {
            return Ok(variable.value.clone());
        }

        if let Some(plaintext) = self.cached_value(variable) {
            debug!(variable = %variable.key, "decrypted cache hit");
            return Ok(plaintext);
        }

        let shared = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&variable.id) {
                Some((_, existing)) => existing.clone(),
                None => {
                    let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
                    let decrypt = self.start_decrypt(variable, ticket);
                    in_flight.insert(variable.id.clone(), (ticket, decrypt.clone()));
                    decrypt
                }
            }
        };

        shared.await
    }

    fn start_decrypt(&self, variable: &Variable, ticket: u64) -> InFlight {
        let service = Arc::clone(&self.service);
        let workspace_id = self.workspace_id();
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let epoch = Arc::clone(&self.epoch);
        let started_in = epoch.load(Ordering::SeqCst);
        let id = variable.id.clone();
        let name = variable.key.clone();
        let ciphertext = variable.value.clone();

        async move {
            let outcome = service.decrypt(&workspace_id, &id, &ciphertext).await;

            {
                let mut in_flight = in_flight.lock();
                if in_flight.get(&id).is_some_and(|(t, _)| *t == ticket) {
                    in_flight.remove(&id);
                }
            }

            match outcome {
                Ok(plaintext) => {
                    if epoch.load(Ordering::SeqCst) == started_in {
                        let entry = DecryptedEntry {
                            ciphertext,
                            plaintext: plaintext.clone(),
                        };
                        cache.rcu(|current| {
                            let mut next = HashMap::clone(current);
                            next.insert(id.clone(), entry.clone());
                            next
                        });
                    }
                    Ok(plaintext)
                }
                Err(e) => {
                    warn!(variable = %name, error = %e, "failed to decrypt sensitive value");
                    Err(map_encryption_error(e, &workspace_id))
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Turns secrecy of a variable on or off and returns the updated variable.
    ///
    /// Turning it on encrypts the current value; turning it off stores the
    /// plaintext. The input is left untouched, so a failure changes nothing.
    ///
    /// # Errors
    /// Returns [`ResolutionError::VaultNotEnabled`] when turning secrecy on in
    /// a workspace without a key, or the encryption/decryption failure.
    pub async fn toggle_secret(
        &self,
        variable: &Variable,
        make_secret: bool,
    ) -> Result<Variable, ResolutionError> {
        if variable.is_secret == make_secret {
            return Ok(variable.clone());
        }

        let mut updated = variable.clone();
        if make_secret {
            if !self.is_enabled().await {
                return Err(ResolutionError::VaultNotEnabled(self.workspace_id().to_string()));
            }
            let ciphertext = self.encrypt(&variable.id, &variable.value).await?;
            self.remember(&variable.id, &ciphertext, &variable.value);
            updated.value = ciphertext;
            updated.is_secret = true;
        } else {
            let plaintext = match self.cached_value(variable) {
                Some(plaintext) => plaintext,
                None => self.decrypt(&variable.id, &variable.value).await?,
            };
            self.invalidate(&variable.id);
            updated.value = plaintext;
            updated.is_secret = false;
        }

        debug!(variable = %variable.key, is_secret = make_secret, "toggled secrecy");
        Ok(updated)
    }

    /// Encrypts a new plaintext for a sensitive variable.
    ///
    /// # Errors
    /// Returns the encryption failure.
    pub async fn seal(&self, variable: &Variable, plaintext: &str) -> Result<Variable, ResolutionError> {
        let ciphertext = self.encrypt(&variable.id, plaintext).await?;
        self.remember(&variable.id, &ciphertext, plaintext);
        Ok(Variable {
            value: ciphertext,
            ..variable.clone()
        })
    }

    fn remember(&self, id: &str, ciphertext: &str, plaintext: &str) {
        let entry = DecryptedEntry {
            ciphertext: ciphertext.to_string(),
            plaintext: plaintext.to_string(),
        };
        self.cache.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(id.to_string(), entry.clone());
            next
        });
    }

    /// Drops the cached plaintext of one variable.
    pub fn invalidate(&self, id: &str) {
        self.cache.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(id);
            next
        });
        self.in_flight.lock().remove(id);
    }

    /// Drops all cached plaintext.
    pub fn clear_cache(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cache.store(Arc::new(HashMap::new()));
        self.in_flight.lock().clear();
    }
}

fn map_encryption_error(error: EncryptionError, workspace_id: &str) -> ResolutionError {
    match error {
        EncryptionError::NotEnabled(_) => ResolutionError::VaultNotEnabled(workspace_id.to_string()),
        EncryptionError::Encrypt(msg) => ResolutionError::Encryption(msg),
        EncryptionError::Decrypt(msg) => ResolutionError::Decryption(msg),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testing::MockEncryption;
    use pretty_assertions::assert_eq;

    fn vault(service: MockEncryption) -> (Arc<MockEncryption>, SensitiveVault<MockEncryption>) {
        let service = Arc::new(service);
        let vault = SensitiveVault::new(Arc::clone(&service), "ws");
        (service, vault)
    }

    fn secret_token() -> Variable {
        Variable::secret("TOKEN", MockEncryption::seal("v1", "T")).with_id("v1")
    }

    #[tokio::test]
    async fn test_encrypt_then_decrypt_round_trip() {
        let (_, vault) = vault(MockEncryption::enabled_for("ws"));
        let ciphertext = vault.encrypt("k", "value").await.unwrap();
        assert_ne!(ciphertext, "value");
        assert_eq!(vault.decrypt("k", &ciphertext).await.unwrap(), "value");
    }

    #[tokio::test]
    async fn test_decrypt_sensitive_value_caches() {
        let (service, vault) = vault(MockEncryption::enabled_for("ws"));
        let variable = secret_token();

        assert_eq!(vault.decrypt_sensitive_value(&variable).await.as_deref(), Some("T"));
        assert_eq!(vault.decrypt_sensitive_value(&variable).await.as_deref(), Some("T"));
        assert_eq!(service.decrypt_calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_decrypts_share_one_call() {
        let (service, vault) = vault(MockEncryption::enabled_for("ws"));
        let variable = secret_token();

        let (a, b) = tokio::join!(
            vault.decrypt_sensitive_value(&variable),
            vault.decrypt_sensitive_value(&variable)
        );

        assert_eq!(a, b);
        assert_eq!(service.decrypt_calls(), 1);
    }

    #[tokio::test]
    async fn test_plain_variable_is_returned_as_is() {
        let (service, vault) = vault(MockEncryption::enabled_for("ws"));
        let plain = Variable::new("HOST", "localhost");
        assert_eq!(vault.decrypt_sensitive_value(&plain).await.as_deref(), Some("localhost"));
        assert_eq!(service.decrypt_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_decrypt_is_absent_and_not_cached() {
        let (_, vault) = vault(MockEncryption::enabled_for("ws"));
        let broken = Variable::secret("TOKEN", "not base64!").with_id("v1");

        assert_eq!(vault.decrypt_sensitive_value(&broken).await, None);
        assert!(vault.cached_value(&broken).is_none());
    }

    #[tokio::test]
    async fn test_stale_cache_entry_is_ignored_after_value_change() {
        let (_, vault) = vault(MockEncryption::enabled_for("ws"));
        let variable = secret_token();
        vault.decrypt_sensitive_value(&variable).await;

        let changed = Variable {
            value: MockEncryption::seal("v1", "U"),
            ..variable
        };
        assert!(vault.cached_value(&changed).is_none());
        assert_eq!(vault.decrypt_sensitive_value(&changed).await.as_deref(), Some("U"));
    }

    #[tokio::test]
    async fn test_toggle_on_requires_enabled_vault() {
        let (_, vault) = vault(MockEncryption::disabled());
        let variable = Variable::new("TOKEN", "T");

        let err = vault.toggle_secret(&variable, true).await.unwrap_err();
        assert_eq!(err, ResolutionError::VaultNotEnabled("ws".into()));
    }

    #[tokio::test]
    async fn test_toggle_on_and_off() {
        let (_, vault) = vault(MockEncryption::enabled_for("ws"));
        let variable = Variable::new("TOKEN", "T").with_id("v1");

        let sealed = vault.toggle_secret(&variable, true).await.unwrap();
        assert!(sealed.is_secret);
        assert_eq!(sealed.value, MockEncryption::seal("v1", "T"));
        assert_eq!(vault.cached_value(&sealed).as_deref(), Some("T"));

        let opened = vault.toggle_secret(&sealed, false).await.unwrap();
        assert!(!opened.is_secret);
        assert_eq!(opened.value, "T");
        assert!(vault.cached_value(&sealed).is_none());
    }

    #[tokio::test]
    async fn test_toggle_to_same_state_is_noop() {
        let (_, vault) = vault(MockEncryption::disabled());
        let variable = Variable::new("HOST", "x");
        assert_eq!(vault.toggle_secret(&variable, false).await.unwrap(), variable);
    }

    #[tokio::test]
    async fn test_set_workspace_clears_cache() {
        let (_, vault) = vault(MockEncryption::enabled_for("ws"));
        let variable = secret_token();
        vault.decrypt_sensitive_value(&variable).await;

        vault.set_workspace("other");

        assert_eq!(vault.workspace_id().as_str(), "other");
        assert!(vault.cached_value(&variable).is_none());
    }
}
