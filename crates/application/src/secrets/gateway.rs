//! Secret provider gateway
//!
//! Fetches provider-backed secrets through a [`SecretBackend`], caches them for
//! a TTL and coalesces concurrent fetches of the same secret into one backend
//! call.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use strata_domain::environment::{
    SecretCacheKey, SecretProviderConfig, SecretProviderKind, SecretProviderRef, Variable,
};
use tracing::{debug, warn};

use crate::error::ResolutionError;
use crate::ports::{Clock, SecretBackend, SecretFetchRequest, SecretFetchResponse};

type FetchOutcome = Result<String, ResolutionError>;
type InFlight = Shared<BoxFuture<'static, FetchOutcome>>;
type SecretCache = HashMap<SecretCacheKey, SecretCacheEntry>;

/// A cached secret value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretCacheEntry {
    /// The fetched value.
    pub value: String,
    /// When the value was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl SecretCacheEntry {
    fn is_live(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.fetched_at)
            .to_std()
            .is_ok_and(|age| age < ttl)
    }
}

/// Point-in-time view of the secret cache.
#[derive(Debug, Clone)]
pub struct SecretSnapshot {
    entries: Arc<SecretCache>,
    now: DateTime<Utc>,
    ttl: Duration,
}

impl SecretSnapshot {
    /// Returns the live cached value for a reference.
    #[must_use]
    pub fn get(&self, reference: &SecretProviderRef) -> Option<String> {
        self.entries
            .get(&reference.cache_key())
            .filter(|entry| entry.is_live(self.now, self.ttl))
            .map(|entry| entry.value.clone())
    }
}

/// Fetches, caches and de-duplicates provider secrets.
pub struct SecretGateway<B> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    providers: ArcSwap<Vec<SecretProviderConfig>>,
    cache: Arc<ArcSwap<SecretCache>>,
    in_flight: Arc<Mutex<HashMap<SecretCacheKey, (u64, InFlight)>>>,
    epoch: Arc<AtomicU64>,
    tickets: AtomicU64,
    ttl: Duration,
    timeout: Duration,
}

impl<B: SecretBackend + 'static> SecretGateway<B> {
    /// Creates a gateway with no providers.
    pub fn new(backend: Arc<B>, clock: Arc<dyn Clock>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            backend,
            clock,
            providers: ArcSwap::from_pointee(Vec::new()),
            cache: Arc::new(ArcSwap::from_pointee(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            epoch: Arc::new(AtomicU64::new(0)),
            tickets: AtomicU64::new(0),
            ttl,
            timeout,
        }
    }

    /// Replaces the provider list and drops every cached secret.
    pub fn set_providers(&self, providers: Vec<SecretProviderConfig>) {
        self.providers.store(Arc::new(providers));
        self.clear_cache();
    }

    /// Adds a provider or replaces the one with the same id.
    pub fn upsert_provider(&self, provider: SecretProviderConfig) {
        let id = provider.id.clone();
        self.providers.rcu(|current| {
            let mut next: Vec<_> = current.iter().filter(|p| p.id != id).cloned().collect();
            next.push(provider.clone());
            next
        });
        self.forget_provider(&id);
    }

    /// Removes a provider. Returns the removed config, if any.
    pub fn remove_provider(&self, id: &str) -> Option<SecretProviderConfig> {
        let removed = self.provider(id)?;
        self.providers.rcu(|current| {
            current
                .iter()
                .filter(|p| p.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        self.forget_provider(id);
        Some(removed)
    }

    /// Returns the configured providers.
    #[must_use]
    pub fn providers(&self) -> Arc<Vec<SecretProviderConfig>> {
        self.providers.load_full()
    }

    /// Returns a provider by id.
    #[must_use]
    pub fn provider(&self, id: &str) -> Option<SecretProviderConfig> {
        self.providers.load().iter().find(|p| p.id == id).cloned()
    }

    /// Drops every cached secret. Fetches still running will not populate
    /// the cache when they finish.
    pub fn clear_cache(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cache.store(Arc::new(HashMap::new()));
        self.in_flight.lock().clear();
        debug!("secret cache cleared");
    }

    fn forget_provider(&self, id: &str) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cache.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.retain(|key, _| key.provider_id != id);
            next
        });
        self.in_flight.lock().retain(|key, _| key.provider_id != id);
    }

    /// Returns a point-in-time view of the cache.
    #[must_use]
    pub fn snapshot(&self) -> SecretSnapshot {
        SecretSnapshot {
            entries: self.cache.load_full(),
            now: self.clock.now(),
            ttl: self.ttl,
        }
    }

    /// Returns the live cached value for a reference.
    #[must_use]
    pub fn cached_value(&self, reference: &SecretProviderRef) -> Option<String> {
        self.snapshot().get(reference)
    }

    /// Returns the number of cached entries, live or expired.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.load().len()
    }

    /// Fetches the value of a provider-backed variable.
    ///
    /// Returns `None` when the variable has no provider reference, the
    /// provider is unknown or disabled, or the fetch failed.
    pub async fn fetch_secret_value(&self, variable: &Variable) -> Option<String> {
        self.try_fetch_secret_value(variable).await.ok()
    }

    /// Like [`fetch_secret_value`](Self::fetch_secret_value), reporting why no
    /// value is available.
    ///
    /// # Errors
    /// Returns [`ResolutionError::SecretFetch`] describing the failure.
    pub async fn try_fetch_secret_value(&self, variable: &Variable) -> Result<String, ResolutionError> {
        let Some(reference) = variable.secret_provider_ref.as_ref() else {
            return Err(fetch_error(&variable.key, "variable has no secret provider reference"));
        };
        let key = reference.cache_key();

        let Some(provider) = self.provider(&reference.provider_id) else {
            debug!(secret = %key, "unknown secret provider");
            return Err(fetch_error(&key, "unknown provider"));
        };
        if !provider.enabled {
            debug!(secret = %key, provider = %provider.name, "secret provider is disabled");
            return Err(fetch_error(&key, "provider is disabled"));
        }

        if let Some(value) = self.cached_value(reference) {
            debug!(secret = %key, "secret cache hit");
            return Ok(value);
        }

        let shared = {
            let mut in_flight = self.in_flight.lock();
            if let Some((_, existing)) = in_flight.get(&key) {
                debug!(secret = %key, "joining in-flight secret fetch");
                existing.clone()
            } else if let Some(value) = self.cached_value(reference) {
                return Ok(value);
            } else {
                debug!(secret = %key, provider = %provider.name, "secret cache miss");
                let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
                let fetch = self.start_fetch(&provider, reference, ticket);
                in_flight.insert(key, (ticket, fetch.clone()));
                fetch
            }
        };

        shared.await
    }

    fn start_fetch(
        &self,
        provider: &SecretProviderConfig,
        reference: &SecretProviderRef,
        ticket: u64,
    ) -> InFlight {
        let backend = Arc::clone(&self.backend);
        let clock = Arc::clone(&self.clock);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let epoch = Arc::clone(&self.epoch);
        let started_in = epoch.load(Ordering::SeqCst);
        let timeout = self.timeout;
        let request = build_request(&provider.kind, &reference.secret_path);
        let secret_key = reference.secret_key.clone();
        let key = reference.cache_key();

        async move {
            let outcome = match tokio::time::timeout(timeout, backend.fetch(request)).await {
                Ok(Ok(response)) => select_secret(response, &secret_key),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("timed out after {}s", timeout.as_secs_f64())),
            };

            {
                let mut in_flight = in_flight.lock();
                if in_flight.get(&key).is_some_and(|(t, _)| *t == ticket) {
                    in_flight.remove(&key);
                }
            }

            match outcome {
                Ok(value) => {
                    if epoch.load(Ordering::SeqCst) == started_in {
                        let entry = SecretCacheEntry {
                            value: value.clone(),
                            fetched_at: clock.now(),
                        };
                        cache.rcu(|current| {
                            let mut next = HashMap::clone(current);
                            next.insert(key.clone(), entry.clone());
                            next
                        });
                    } else {
                        debug!(secret = %key, "cache was cleared during fetch, not caching");
                    }
                    Ok(value)
                }
                Err(reason) => {
                    warn!(secret = %key, %reason, "secret fetch failed");
                    Err(fetch_error(&key, reason))
                }
            }
        }
        .boxed()
        .shared()
    }
}

fn fetch_error(key: impl ToString, reason: impl Into<String>) -> ResolutionError {
    ResolutionError::SecretFetch {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Picks the requested entry out of a backend response.
///
/// The entry whose key equals `secret_key` wins; otherwise a response with
/// exactly one entry yields that entry.
fn select_secret(response: SecretFetchResponse, secret_key: &str) -> Result<String, String> {
    if !response.success {
        return Err(response
            .error
            .unwrap_or_else(|| "backend reported failure".to_string()));
    }

    let mut secrets = response.secrets;
    if let Some(pos) = secrets.iter().position(|s| s.key == secret_key) {
        return Ok(secrets.swap_remove(pos).value);
    }
    if secrets.len() == 1 {
        return Ok(secrets.swap_remove(0).value);
    }
    Err(format!("key '{secret_key}' not found in secret"))
}

/// Translates typed provider settings into a backend request.
#[must_use]
pub fn build_request(kind: &SecretProviderKind, path: &str) -> SecretFetchRequest {
    let mut params = BTreeMap::new();
    let mut put = |name: &str, value: &str| {
        params.insert(name.to_string(), value.to_string());
    };

    match kind {
        SecretProviderKind::HashicorpVault {
            address,
            token,
            namespace,
            mount,
        } => {
            put("address", address);
            put("token", token);
            put("mount", mount);
            if let Some(namespace) = namespace {
                put("namespace", namespace);
            }
        }
        SecretProviderKind::AwsSecretsManager {
            region,
            access_key_id,
            secret_access_key,
            session_token,
        } => {
            put("region", region);
            put("accessKeyId", access_key_id);
            put("secretAccessKey", secret_access_key);
            if let Some(token) = session_token {
                put("sessionToken", token);
            }
        }
        SecretProviderKind::AzureKeyVault {
            vault_url,
            tenant_id,
            client_id,
            client_secret,
        } => {
            put("vaultUrl", vault_url);
            put("tenantId", tenant_id);
            put("clientId", client_id);
            put("clientSecret", client_secret);
        }
        SecretProviderKind::GcpSecretManager {
            project_id,
            credentials_json,
        } => {
            put("projectId", project_id);
            put("credentialsJson", credentials_json);
        }
        SecretProviderKind::OnePassword {
            connect_host,
            connect_token,
        } => {
            put("connectHost", connect_host);
            put("connectToken", connect_token);
        }
        SecretProviderKind::Bitwarden {
            access_token,
            organization_id,
            server_url,
        } => {
            put("accessToken", access_token);
            if let Some(org) = organization_id {
                put("organizationId", org);
            }
            if let Some(url) = server_url {
                put("serverUrl", url);
            }
        }
    }

    SecretFetchRequest {
        provider_type: kind.provider_type(),
        params,
        path: path.to_string(),
    }
}
