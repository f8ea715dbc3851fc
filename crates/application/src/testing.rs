//! In-memory port implementations for tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use strata_domain::environment::{Environment, Globals, SecretProviderConfig};

use crate::ports::{
    Clock, EncryptionError, EncryptionService, RepositoryError, ScopeRepository, SecretBackend,
    SecretBackendError, SecretEntry, SecretFetchRequest, SecretFetchResponse,
};

pub struct MockClock {
    now: Mutex<DateTime<Utc>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, secs: i64) {
        *self.now.lock() += chrono::Duration::seconds(secs);
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Serves secrets keyed by path, counting calls.
pub struct MockBackend {
    secrets: Mutex<HashMap<String, Result<SecretFetchResponse, String>>>,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<SecretFetchRequest>>,
    delay: Duration,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            secrets: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            delay: Duration::from_millis(20),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_secret(self, path: &str, entries: &[(&str, &str)]) -> Self {
        self.respond(
            path,
            Ok(SecretFetchResponse::ok(
                entries.iter().map(|(k, v)| SecretEntry::new(*k, *v)).collect(),
            )),
        );
        self
    }

    pub fn respond(&self, path: &str, response: Result<SecretFetchResponse, String>) {
        self.secrets.lock().insert(path.to_string(), response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretBackend for MockBackend {
    async fn fetch(
        &self,
        request: SecretFetchRequest,
    ) -> Result<SecretFetchResponse, SecretBackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());
        tokio::time::sleep(self.delay).await;
        let response = self.secrets.lock().get(&request.path).cloned();
        match response {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(SecretBackendError::Transport(message)),
            None => Ok(SecretFetchResponse::failed(format!("no secret at {}", request.path))),
        }
    }
}

/// Reversible stand-in cipher: base64 of `variable_id|plaintext`.
pub struct MockEncryption {
    enabled: Mutex<HashSet<String>>,
    pub decrypt_calls: AtomicUsize,
}

impl MockEncryption {
    pub fn enabled_for(workspace_id: &str) -> Self {
        Self {
            enabled: Mutex::new(HashSet::from([workspace_id.to_string()])),
            decrypt_calls: AtomicUsize::new(0),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: Mutex::new(HashSet::new()),
            decrypt_calls: AtomicUsize::new(0),
        }
    }

    pub fn seal(variable_id: &str, plaintext: &str) -> String {
        STANDARD.encode(format!("{variable_id}|{plaintext}"))
    }

    pub fn decrypt_calls(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EncryptionService for MockEncryption {
    async fn is_enabled(&self, workspace_id: &str) -> bool {
        self.enabled.lock().contains(workspace_id)
    }

    async fn encrypt(
        &self,
        workspace_id: &str,
        variable_id: &str,
        plaintext: &str,
    ) -> Result<String, EncryptionError> {
        if !self.is_enabled(workspace_id).await {
            return Err(EncryptionError::NotEnabled(workspace_id.to_string()));
        }
        Ok(Self::seal(variable_id, plaintext))
    }

    async fn decrypt(
        &self,
        workspace_id: &str,
        variable_id: &str,
        ciphertext: &str,
    ) -> Result<String, EncryptionError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        if !self.is_enabled(workspace_id).await {
            return Err(EncryptionError::NotEnabled(workspace_id.to_string()));
        }
        let bytes = STANDARD
            .decode(ciphertext)
            .map_err(|e| EncryptionError::Decrypt(e.to_string()))?;
        let text = String::from_utf8(bytes).map_err(|e| EncryptionError::Decrypt(e.to_string()))?;
        text.strip_prefix(&format!("{variable_id}|"))
            .map(str::to_string)
            .ok_or_else(|| EncryptionError::Decrypt("key mismatch".into()))
    }
}

#[derive(Default)]
pub struct MockRepository {
    pub globals: Mutex<Globals>,
    pub environments: Mutex<Vec<Environment>>,
    pub providers: Mutex<Vec<SecretProviderConfig>>,
    pub fail_saves: AtomicBool,
    pub saves: AtomicUsize,
}

impl MockRepository {
    pub fn with_state(globals: Globals, environments: Vec<Environment>) -> Self {
        Self {
            globals: Mutex::new(globals),
            environments: Mutex::new(environments),
            ..Self::default()
        }
    }

    fn check_save(&self) -> Result<(), RepositoryError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RepositoryError::Io(std::io::Error::other("disk full")));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl ScopeRepository for MockRepository {
    async fn load_globals(&self) -> Result<Globals, RepositoryError> {
        Ok(self.globals.lock().clone())
    }

    async fn save_globals(&self, globals: &Globals) -> Result<(), RepositoryError> {
        self.check_save()?;
        *self.globals.lock() = globals.clone();
        Ok(())
    }

    async fn load_environments(&self) -> Result<Vec<Environment>, RepositoryError> {
        Ok(self.environments.lock().clone())
    }

    async fn save_environment(&self, environment: &Environment) -> Result<(), RepositoryError> {
        self.check_save()?;
        let mut environments = self.environments.lock();
        environments.retain(|e| e.id != environment.id);
        environments.push(environment.clone());
        Ok(())
    }

    async fn delete_environment(&self, id: &str) -> Result<(), RepositoryError> {
        self.check_save()?;
        self.environments.lock().retain(|e| e.id != id);
        Ok(())
    }

    async fn load_secret_providers(&self) -> Result<Vec<SecretProviderConfig>, RepositoryError> {
        Ok(self.providers.lock().clone())
    }

    async fn save_secret_providers(
        &self,
        providers: &[SecretProviderConfig],
    ) -> Result<(), RepositoryError> {
        self.check_save()?;
        *self.providers.lock() = providers.to_vec();
        Ok(())
    }
}
