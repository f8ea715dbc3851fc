//! Resolution session
//!
//! Owns the scope store, the secret gateway and the vault of one workspace and
//! exposes interpolation plus every mutation of scope state.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use strata_domain::collection::{
    CollectionSettings, InheritanceResolver, RequestSettings, ResolvedSettings,
};
use strata_domain::environment::{
    CachedValues, Environment, Globals, ResolvedView, SecretProviderConfig, SecretProviderRef,
    Variable,
};
use strata_domain::request::{Header, Headers};
use strata_domain::{AuthConfig, DomainError, ResolverSettings};
use tracing::{debug, info, warn};

use crate::error::ResolutionError;
use crate::ports::{Clock, EncryptionService, ScopeRepository, SecretBackend};
use crate::scope_store::{ScopeId, ScopeStore};
use crate::secrets::{SecretGateway, SecretSnapshot};
use crate::vault::{DecryptedSnapshot, SensitiveVault};
use crate::variable_resolver::{
    EvalContext, ResolutionResult, VariableResolver, extract_variable_names,
};

/// Cache snapshots taken together for one view build.
struct CacheSnapshot {
    secrets: SecretSnapshot,
    decrypted: DecryptedSnapshot,
}

impl CachedValues for CacheSnapshot {
    fn secret_value(&self, reference: &SecretProviderRef) -> Option<String> {
        self.secrets.get(reference)
    }

    fn decrypted_value(&self, variable: &Variable) -> Option<String> {
        self.decrypted.get(variable)
    }
}

/// Resolution state of one workspace.
pub struct ResolutionSession<B, E, R> {
    store: ScopeStore,
    gateway: SecretGateway<B>,
    vault: SensitiveVault<E>,
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
    settings: ResolverSettings,
}

impl<B, E, R> ResolutionSession<B, E, R>
where
    B: SecretBackend + 'static,
    E: EncryptionService + 'static,
    R: ScopeRepository,
{
    /// Creates an empty session. Call [`load`](Self::load) to read stored state.
    pub fn new(
        workspace_id: impl Into<String>,
        backend: Arc<B>,
        encryption: Arc<E>,
        repository: Arc<R>,
        clock: Arc<dyn Clock>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            store: ScopeStore::new(),
            gateway: SecretGateway::new(
                backend,
                Arc::clone(&clock),
                settings.secret_cache_ttl(),
                settings.secret_fetch_timeout(),
            ),
            vault: SensitiveVault::new(encryption, workspace_id),
            repository,
            clock,
            settings,
        }
    }

    /// Replaces in-memory state with what the repository holds.
    ///
    /// # Errors
    /// Returns [`ResolutionError::Persistence`] if any part fails to load;
    /// the current state is kept in that case.
    pub async fn load(&mut self) -> Result<(), ResolutionError> {
        let globals = self.repository.load_globals().await.map_err(persistence)?;
        let environments = self
            .repository
            .load_environments()
            .await
            .map_err(persistence)?;
        let providers = self
            .repository
            .load_secret_providers()
            .await
            .map_err(persistence)?;

        info!(
            globals = globals.variables.len(),
            environments = environments.len(),
            providers = providers.len(),
            "loaded workspace scopes"
        );

        let active = self.store.active_environment_id().map(str::to_string);
        self.store = ScopeStore::from_parts(globals, environments, active);
        self.gateway.set_providers(providers);
        self.vault.clear_cache();
        Ok(())
    }

    /// Returns the scope store.
    #[must_use]
    pub const fn store(&self) -> &ScopeStore {
        &self.store
    }

    /// Returns the secret gateway.
    #[must_use]
    pub const fn gateway(&self) -> &SecretGateway<B> {
        &self.gateway
    }

    /// Returns the vault.
    #[must_use]
    pub const fn vault(&self) -> &SensitiveVault<E> {
        &self.vault
    }

    /// Returns the resolver settings.
    #[must_use]
    pub const fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    fn caches(&self) -> CacheSnapshot {
        CacheSnapshot {
            secrets: self.gateway.snapshot(),
            decrypted: self.vault.snapshot(),
        }
    }

    /// Builds the resolved view from current state and caches.
    #[must_use]
    pub fn resolved_view(&self, inherited: &[Variable]) -> ResolvedView {
        self.store.resolved_view(inherited, &self.caches())
    }

    /// Substitutes variables whose values are already available.
    ///
    /// Never fetches or decrypts; function calls are left as they are.
    #[must_use]
    pub fn interpolate_fast(&self, text: &str) -> String {
        VariableResolver::new(self.resolved_view(&[])).resolve(text).resolved
    }

    /// Fully interpolates a string: fetches and decrypts referenced secrets,
    /// substitutes variables, then evaluates function calls.
    pub async fn interpolate(&self, text: &str) -> String {
        self.interpolate_with(text, &[]).await.resolved
    }

    /// Like [`interpolate`](Self::interpolate), with collection and folder
    /// variables layered between globals and the active environment.
    pub async fn interpolate_with(&self, text: &str, inherited: &[Variable]) -> ResolutionResult {
        self.prefetch(text, inherited).await;
        let resolver = VariableResolver::new(self.resolved_view(inherited));
        resolver.resolve_with_functions(text, &EvalContext::at(self.clock.now()))
    }

    /// Interpolates and fails if any variable stays unresolved.
    ///
    /// # Errors
    /// Returns [`ResolutionError::UnresolvedReference`] naming the variables
    /// that could not be resolved.
    pub async fn interpolate_strict(&self, text: &str) -> Result<String, ResolutionError> {
        let result = self.interpolate_with(text, &[]).await;
        if result.is_complete {
            Ok(result.resolved)
        } else {
            Err(ResolutionError::UnresolvedReference(result.unresolved))
        }
    }

    /// Returns referenced names that are neither defined nor function calls.
    #[must_use]
    pub fn get_unresolved_variables(&self, text: &str) -> Vec<String> {
        VariableResolver::new(self.resolved_view(&[])).find_unresolved(text)
    }

    /// Fetches or decrypts, concurrently, every secret `text` refers to that
    /// is not cached yet.
    async fn prefetch(&self, text: &str, inherited: &[Variable]) {
        let mut pending: Vec<BoxFuture<'_, Option<String>>> = Vec::new();

        for name in extract_variable_names(text) {
            let Some(variable) = self.store.effective_variable(&name, inherited) else {
                continue;
            };
            if let Some(reference) = &variable.secret_provider_ref {
                if self.gateway.cached_value(reference).is_none() {
                    pending.push(self.gateway.fetch_secret_value(variable).boxed());
                }
            } else if variable.needs_decryption() && self.vault.cached_value(variable).is_none() {
                pending.push(self.vault.decrypt_sensitive_value(variable).boxed());
            }
        }

        if !pending.is_empty() {
            debug!(count = pending.len(), "resolving secret values");
            join_all(pending).await;
        }
    }

    /// Applies folder inheritance to a request and interpolates the
    /// resulting auth, headers and base URL.
    pub async fn resolve_request(
        &self,
        collection: &CollectionSettings,
        folder_id: Option<&str>,
        request: &RequestSettings,
    ) -> ResolvedSettings {
        let resolver = InheritanceResolver::new(self.settings.max_inheritance_depth);
        let mut resolved = resolver.resolve(collection, folder_id, request);
        let inherited = resolved.variables.clone();

        let mut headers = Headers::new();
        for header in resolved.headers.iter() {
            headers.add(Header {
                value: self.interpolate_with(&header.value, &inherited).await.resolved,
                ..header.clone()
            });
        }
        resolved.headers = headers;

        resolved.auth = match resolved.auth {
            AuthConfig::Bearer { token, prefix } => AuthConfig::Bearer {
                token: self.interpolate_with(&token, &inherited).await.resolved,
                prefix,
            },
            AuthConfig::Basic { username, password } => AuthConfig::Basic {
                username: self.interpolate_with(&username, &inherited).await.resolved,
                password: self.interpolate_with(&password, &inherited).await.resolved,
            },
            AuthConfig::ApiKey {
                key,
                name,
                location,
            } => AuthConfig::ApiKey {
                key: self.interpolate_with(&key, &inherited).await.resolved,
                name: self.interpolate_with(&name, &inherited).await.resolved,
                location,
            },
            other => other,
        };

        if let Some(base_url) = resolved.base_url.take() {
            resolved.base_url = Some(self.interpolate_with(&base_url, &inherited).await.resolved);
        }

        resolved
    }

    /// Adds a variable to a scope.
    ///
    /// # Errors
    /// Returns a domain error if the key is invalid or taken.
    pub async fn add_variable(&mut self, scope: &ScopeId, variable: Variable) -> Result<(), ResolutionError> {
        self.store.add_variable(scope, variable)?;
        self.persist(scope).await;
        Ok(())
    }

    /// Replaces a variable by id. Secrecy is kept as stored; use
    /// [`set_variable_secret`](Self::set_variable_secret) to change it.
    ///
    /// # Errors
    /// Returns a domain error if the variable does not exist or the key is
    /// invalid or taken.
    pub async fn update_variable(
        &mut self,
        scope: &ScopeId,
        mut variable: Variable,
    ) -> Result<(), ResolutionError> {
        variable.is_secret = self.store.variable(scope, &variable.id)?.is_secret;
        let previous = self.store.update_variable(scope, variable.clone())?;
        if previous.value != variable.value {
            self.vault.invalidate(&variable.id);
        }
        self.persist(scope).await;
        Ok(())
    }

    /// Sets the plaintext value of a variable, encrypting it if the variable
    /// is sensitive.
    ///
    /// # Errors
    /// Returns a domain error if the variable does not exist, or the
    /// encryption failure.
    pub async fn set_variable_value(
        &mut self,
        scope: &ScopeId,
        id: &str,
        plaintext: &str,
    ) -> Result<(), ResolutionError> {
        let current = self.store.variable(scope, id)?.clone();
        let updated = if current.needs_decryption() {
            self.vault.seal(&current, plaintext).await?
        } else {
            Variable {
                value: plaintext.to_string(),
                ..current
            }
        };
        self.store.update_variable(scope, updated)?;
        self.persist(scope).await;
        Ok(())
    }

    /// Removes a variable.
    ///
    /// # Errors
    /// Returns a domain error if the variable does not exist.
    pub async fn delete_variable(&mut self, scope: &ScopeId, id: &str) -> Result<Variable, ResolutionError> {
        let removed = self.store.delete_variable(scope, id)?;
        self.vault.invalidate(id);
        self.persist(scope).await;
        Ok(removed)
    }

    /// Flips the enabled flag of a variable. Returns the new state.
    ///
    /// # Errors
    /// Returns a domain error if the variable does not exist.
    pub async fn toggle_variable(&mut self, scope: &ScopeId, id: &str) -> Result<bool, ResolutionError> {
        let enabled = self.store.toggle_variable(scope, id)?;
        self.persist(scope).await;
        Ok(enabled)
    }

    /// Turns secrecy of a variable on or off, converting its stored value.
    /// Nothing changes if the conversion fails.
    ///
    /// # Errors
    /// Returns [`ResolutionError::VaultNotEnabled`] when turning secrecy on
    /// without a workspace key, the encryption or decryption failure, or a
    /// domain error if the variable does not exist.
    pub async fn set_variable_secret(
        &mut self,
        scope: &ScopeId,
        id: &str,
        make_secret: bool,
    ) -> Result<Variable, ResolutionError> {
        let current = self.store.variable(scope, id)?.clone();
        let updated = self.vault.toggle_secret(&current, make_secret).await?;
        if updated != current {
            self.store.update_variable(scope, updated.clone())?;
            self.persist(scope).await;
        }
        Ok(updated)
    }

    /// Adds a sensitive variable from its plaintext. The value is encrypted
    /// before the first save.
    ///
    /// # Errors
    /// Returns [`ResolutionError::VaultNotEnabled`] without a workspace key,
    /// the encryption failure, or a domain error if the key is invalid or
    /// taken.
    pub async fn add_secret_variable(
        &mut self,
        scope: &ScopeId,
        variable: Variable,
    ) -> Result<(), ResolutionError> {
        let plain = Variable {
            is_secret: false,
            ..variable
        };
        let sealed = self.vault.toggle_secret(&plain, true).await?;
        if let Err(e) = self.store.add_variable(scope, sealed) {
            self.vault.invalidate(&plain.id);
            return Err(e.into());
        }
        self.persist(scope).await;
        Ok(())
    }

    /// Replaces the value of a variable with the encryption of `plaintext`,
    /// making the variable sensitive if it was not.
    ///
    /// # Errors
    /// Returns [`ResolutionError::VaultNotEnabled`] without a workspace key,
    /// the encryption failure, or a domain error if the variable does not
    /// exist.
    pub async fn set_secret_value(
        &mut self,
        scope: &ScopeId,
        id: &str,
        plaintext: &str,
    ) -> Result<(), ResolutionError> {
        let current = self.store.variable(scope, id)?.clone();
        let updated = if current.is_secret {
            self.vault.seal(&current, plaintext).await?
        } else {
            let draft = Variable {
                value: plaintext.to_string(),
                ..current
            };
            self.vault.toggle_secret(&draft, true).await?
        };
        self.store.update_variable(scope, updated)?;
        self.persist(scope).await;
        Ok(())
    }

    /// Adds an environment.
    ///
    /// # Errors
    /// Returns a domain error if its variables have invalid or duplicate keys.
    pub async fn add_environment(&mut self, environment: Environment) -> Result<(), ResolutionError> {
        let scope = ScopeId::Environment(environment.id.clone());
        let previous = self.active_id();
        self.store.add_environment(environment)?;
        self.on_active_change(previous);
        self.persist(&scope).await;
        Ok(())
    }

    /// Replaces an environment by id.
    ///
    /// # Errors
    /// Returns a domain error if the environment does not exist or its
    /// variables have invalid or duplicate keys.
    pub async fn update_environment(&mut self, environment: Environment) -> Result<(), ResolutionError> {
        let scope = ScopeId::Environment(environment.id.clone());
        self.store.update_environment(environment)?;
        self.persist(&scope).await;
        Ok(())
    }

    /// Removes an environment.
    ///
    /// # Errors
    /// Returns a domain error if the environment does not exist.
    pub async fn delete_environment(&mut self, id: &str) -> Result<Environment, ResolutionError> {
        let previous = self.active_id();
        let removed = self.store.delete_environment(id)?;
        self.on_active_change(previous);
        self.persist(&ScopeId::Environment(id.to_string())).await;
        Ok(removed)
    }

    /// Activates an environment, clearing both caches if it changed.
    ///
    /// # Errors
    /// Returns a domain error if the environment does not exist.
    pub fn set_active_environment(&mut self, id: &str) -> Result<(), ResolutionError> {
        if self.store.set_active_environment(id)? {
            info!(environment_id = id, "switched active environment");
            self.clear_caches();
        }
        Ok(())
    }

    /// Switches to another workspace: clears both caches, rebinds the vault
    /// and repository, and loads the new workspace's state.
    ///
    /// # Errors
    /// Returns [`ResolutionError::Persistence`] if loading fails.
    pub async fn switch_workspace(
        &mut self,
        workspace_id: impl Into<String>,
        repository: Arc<R>,
    ) -> Result<(), ResolutionError> {
        let workspace_id = workspace_id.into();
        info!(workspace_id = %workspace_id, "switching workspace");
        self.gateway.clear_cache();
        self.vault.set_workspace(workspace_id);
        self.repository = repository;
        self.store = ScopeStore::new();
        self.load().await
    }

    /// Adds or replaces a secret provider.
    pub async fn upsert_secret_provider(&self, provider: SecretProviderConfig) {
        self.gateway.upsert_provider(provider);
        self.persist_providers().await;
    }

    /// Removes a secret provider.
    ///
    /// # Errors
    /// Returns a domain error if no provider has this id.
    pub async fn remove_secret_provider(&self, id: &str) -> Result<SecretProviderConfig, ResolutionError> {
        let removed = self
            .gateway
            .remove_provider(id)
            .ok_or_else(|| DomainError::SecretProviderNotFound(id.to_string()))?;
        self.persist_providers().await;
        Ok(removed)
    }

    /// Drops all cached secrets and plaintext.
    pub fn clear_caches(&self) {
        self.gateway.clear_cache();
        self.vault.clear_cache();
    }

    fn active_id(&self) -> Option<String> {
        self.store.active_environment_id().map(str::to_string)
    }

    fn on_active_change(&self, previous: Option<String>) {
        if self.store.active_environment_id() != previous.as_deref() {
            debug!(
                environment_id = ?self.store.active_environment_id(),
                "active environment changed"
            );
            self.clear_caches();
        }
    }

    async fn persist(&self, scope: &ScopeId) {
        let result = match scope {
            ScopeId::Global => {
                let globals = Globals::from_variables(self.store.globals().to_vec());
                self.repository.save_globals(&globals).await
            }
            ScopeId::Environment(id) => match self.store.environment(id) {
                Some(environment) => self.repository.save_environment(environment).await,
                None => self.repository.delete_environment(id).await,
            },
        };

        if let Err(error) = result {
            warn!(%scope, %error, "failed to persist scope, keeping in-memory state");
        }
    }

    async fn persist_providers(&self) {
        let providers = self.gateway.providers();
        if let Err(error) = self.repository.save_secret_providers(&providers).await {
            warn!(%error, "failed to persist secret providers, keeping in-memory state");
        }
    }
}

fn persistence(error: impl std::fmt::Display) -> ResolutionError {
    ResolutionError::Persistence(error.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, MockClock, MockEncryption, MockRepository};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;
    use strata_domain::collection::FolderSettings;
    use strata_domain::environment::SecretProviderKind;

    type TestSession = ResolutionSession<MockBackend, MockEncryption, MockRepository>;

    struct Harness {
        session: TestSession,
        backend: Arc<MockBackend>,
        encryption: Arc<MockEncryption>,
        repository: Arc<MockRepository>,
    }

    async fn harness(globals: Vec<Variable>, environments: Vec<Environment>) -> Harness {
        harness_with(globals, environments, MockEncryption::enabled_for("ws")).await
    }

    async fn harness_with(
        globals: Vec<Variable>,
        environments: Vec<Environment>,
        encryption: MockEncryption,
    ) -> Harness {
        let backend = Arc::new(MockBackend::new().with_secret("app/db", &[("password", "s3cret")]));
        let encryption = Arc::new(encryption);
        let repository = Arc::new(MockRepository::with_state(
            Globals::from_variables(globals),
            environments,
        ));
        *repository.providers.lock() = vec![vault_provider(true)];
        let clock = Arc::new(MockClock::at(Utc.with_ymd_and_hms(2024, 1, 26, 12, 0, 0).unwrap()));

        let mut session = ResolutionSession::new(
            "ws",
            Arc::clone(&backend),
            Arc::clone(&encryption),
            Arc::clone(&repository),
            clock,
            ResolverSettings::default(),
        );
        session.load().await.unwrap();

        Harness {
            session,
            backend,
            encryption,
            repository,
        }
    }

    fn vault_provider(enabled: bool) -> SecretProviderConfig {
        let mut provider = SecretProviderConfig::new(
            "Vault",
            SecretProviderKind::HashicorpVault {
                address: "http://vault:8200".into(),
                token: "t".into(),
                namespace: None,
                mount: "secret".into(),
            },
        )
        .with_id("vault");
        provider.enabled = enabled;
        provider
    }

    fn staging() -> Environment {
        Environment {
            id: "staging".into(),
            ..Environment::new("Staging")
        }
        .with_variable(Variable::new("HOST", "staging.example.com"))
    }

    fn db_pass() -> Variable {
        Variable::from_provider("DB_PASS", SecretProviderRef::new("vault", "app/db", "password"))
    }

    #[tokio::test]
    async fn test_environment_override_in_url() {
        let h = harness(vec![Variable::new("HOST", "api.example.com")], vec![staging()]).await;

        assert_eq!(
            h.session.interpolate("https://{{HOST}}/v1").await,
            "https://staging.example.com/v1"
        );
    }

    #[tokio::test]
    async fn test_secret_variable_is_decrypted_for_interpolation() {
        let token = Variable::secret("TOKEN", MockEncryption::seal("t1", "T")).with_id("t1");
        let h = harness(vec![token], vec![]).await;

        assert_eq!(h.session.interpolate_fast("Bearer {{TOKEN}}"), "Bearer {{TOKEN}}");
        assert_eq!(h.session.interpolate("Bearer {{TOKEN}}").await, "Bearer T");
        assert_eq!(h.session.interpolate_fast("Bearer {{TOKEN}}"), "Bearer T");
        assert_eq!(h.encryption.decrypt_calls(), 1);
    }

    #[tokio::test]
    async fn test_undecryptable_secret_never_leaks_ciphertext() {
        let token = Variable::secret("TOKEN", "garbage").with_id("t1");
        let h = harness(vec![token], vec![]).await;

        assert_eq!(h.session.interpolate("{{TOKEN}}").await, "{{TOKEN}}");
    }

    #[tokio::test]
    async fn test_provider_secret_is_fetched_once() {
        let h = harness(vec![db_pass()], vec![]).await;

        assert_eq!(
            h.session.interpolate("{{DB_PASS}}:{{DB_PASS}}").await,
            "s3cret:s3cret"
        );
        assert_eq!(h.session.interpolate("{{DB_PASS}}").await, "s3cret");
        assert_eq!(h.backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_provider_leaves_placeholder() {
        let h = harness(vec![db_pass()], vec![]).await;
        h.session.upsert_secret_provider(vault_provider(false)).await;

        assert_eq!(h.session.interpolate("{{DB_PASS}}").await, "{{DB_PASS}}");
        assert_eq!(h.backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_functions_and_variables_together() {
        let h = harness(vec![Variable::new("NAME", "hi")], vec![]).await;

        assert_eq!(
            h.session
                .interpolate("{{base64.encode('{{NAME}}')}} {{base64.decode('aGk=')}} {{$timestamp}}")
                .await,
            "aGk= hi 1706270400"
        );
    }

    #[tokio::test]
    async fn test_get_unresolved_variables() {
        let h = harness(vec![], vec![]).await;
        assert_eq!(h.session.get_unresolved_variables("{{A}}{{hash.md5('x')}}"), vec!["A"]);

        let h = harness(vec![Variable::new("A", "1")], vec![]).await;
        assert!(h.session.get_unresolved_variables("{{A}}{{hash.md5('x')}}").is_empty());
    }

    #[tokio::test]
    async fn test_interpolate_strict() {
        let h = harness(vec![Variable::new("A", "1")], vec![]).await;

        assert_eq!(h.session.interpolate_strict("{{A}}").await.unwrap(), "1");
        assert_eq!(
            h.session.interpolate_strict("{{A}}{{B}}").await,
            Err(ResolutionError::UnresolvedReference(vec!["B".into()]))
        );
    }

    #[tokio::test]
    async fn test_switching_environment_clears_caches() {
        let prod = Environment {
            id: "prod".into(),
            ..Environment::new("Production")
        };
        let mut h = harness(vec![db_pass()], vec![staging(), prod]).await;
        h.session.interpolate("{{DB_PASS}}").await;
        assert_eq!(h.session.gateway().cache_len(), 1);

        h.session.set_active_environment("prod").unwrap();

        assert_eq!(h.session.gateway().cache_len(), 0);
        h.session.interpolate("{{DB_PASS}}").await;
        assert_eq!(h.backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_toggle_disabled_removes_from_view_without_deleting() {
        let mut h = harness(vec![Variable::new("A", "1").with_id("a")], vec![]).await;

        assert!(!h.session.toggle_variable(&ScopeId::Global, "a").await.unwrap());

        assert_eq!(h.session.interpolate("{{A}}").await, "{{A}}");
        assert_eq!(h.session.store().globals().len(), 1);
        assert!(!h.repository.globals.lock().variables[0].enabled);
    }

    #[tokio::test]
    async fn test_set_variable_secret_round_trip() {
        let mut h = harness(vec![Variable::new("TOKEN", "T").with_id("t1")], vec![]).await;

        let sealed = h.session.set_variable_secret(&ScopeId::Global, "t1", true).await.unwrap();
        assert!(sealed.is_secret);
        assert_ne!(sealed.value, "T");
        assert_eq!(h.repository.globals.lock().variables[0].value, sealed.value);
        assert_eq!(h.session.interpolate("{{TOKEN}}").await, "T");

        let opened = h.session.set_variable_secret(&ScopeId::Global, "t1", false).await.unwrap();
        assert_eq!(opened.value, "T");
        assert!(!h.session.store().globals()[0].is_secret);
    }

    #[tokio::test]
    async fn test_secret_toggle_rejected_without_vault() {
        let mut h = harness_with(
            vec![Variable::new("TOKEN", "T").with_id("t1")],
            vec![],
            MockEncryption::disabled(),
        )
        .await;

        let err = h
            .session
            .set_variable_secret(&ScopeId::Global, "t1", true)
            .await
            .unwrap_err();

        assert_eq!(err, ResolutionError::VaultNotEnabled("ws".into()));
        let stored = &h.session.store().globals()[0];
        assert!(!stored.is_secret);
        assert_eq!(stored.value, "T");
    }

    #[tokio::test]
    async fn test_set_value_of_secret_encrypts() {
        let token = Variable::secret("TOKEN", MockEncryption::seal("t1", "old")).with_id("t1");
        let mut h = harness(vec![token], vec![]).await;
        assert_eq!(h.session.interpolate("{{TOKEN}}").await, "old");

        h.session
            .set_variable_value(&ScopeId::Global, "t1", "new")
            .await
            .unwrap();

        assert_eq!(h.session.store().globals()[0].value, MockEncryption::seal("t1", "new"));
        assert_eq!(h.session.interpolate("{{TOKEN}}").await, "new");
    }

    #[tokio::test]
    async fn test_add_secret_variable_saves_only_ciphertext() {
        let mut h = harness(vec![], vec![]).await;

        h.session
            .add_secret_variable(&ScopeId::Global, Variable::new("TOKEN", "T").with_id("t1"))
            .await
            .unwrap();

        assert_eq!(h.repository.saves.load(Ordering::SeqCst), 1);
        let stored = h.repository.globals.lock().variables[0].clone();
        assert!(stored.is_secret);
        assert_eq!(stored.value, MockEncryption::seal("t1", "T"));
        assert_eq!(h.session.interpolate("{{TOKEN}}").await, "T");
    }

    #[tokio::test]
    async fn test_add_secret_variable_without_vault_changes_nothing() {
        let mut h = harness_with(vec![], vec![], MockEncryption::disabled()).await;

        let err = h
            .session
            .add_secret_variable(&ScopeId::Global, Variable::new("TOKEN", "T"))
            .await
            .unwrap_err();

        assert_eq!(err, ResolutionError::VaultNotEnabled("ws".into()));
        assert!(h.session.store().globals().is_empty());
        assert_eq!(h.repository.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_set_secret_value_on_plain_variable_saves_once() {
        let mut h = harness(vec![Variable::new("TOKEN", "old").with_id("t1")], vec![]).await;

        h.session
            .set_secret_value(&ScopeId::Global, "t1", "new")
            .await
            .unwrap();

        assert_eq!(h.repository.saves.load(Ordering::SeqCst), 1);
        let stored = h.repository.globals.lock().variables[0].clone();
        assert!(stored.is_secret);
        assert_eq!(stored.value, MockEncryption::seal("t1", "new"));
        assert_eq!(h.session.interpolate("{{TOKEN}}").await, "new");
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_memory_state() {
        let mut h = harness(vec![], vec![]).await;
        h.repository.fail_saves.store(true, Ordering::SeqCst);

        h.session
            .add_variable(&ScopeId::Global, Variable::new("A", "1"))
            .await
            .unwrap();

        assert_eq!(h.session.interpolate("{{A}}").await, "1");
        assert!(h.repository.globals.lock().variables.is_empty());
    }

    #[tokio::test]
    async fn test_environment_lifecycle_is_persisted() {
        let mut h = harness(vec![], vec![staging()]).await;
        let scope = ScopeId::Environment("staging".into());

        h.session
            .add_variable(&scope, Variable::new("PORT", "8080"))
            .await
            .unwrap();
        assert_eq!(h.repository.environments.lock()[0].variables.len(), 2);

        h.session.delete_environment("staging").await.unwrap();
        assert!(h.repository.environments.lock().is_empty());
        assert!(h.session.store().active_environment().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_key_is_rejected() {
        let mut h = harness(vec![Variable::new("A", "1")], vec![]).await;
        let err = h
            .session
            .add_variable(&ScopeId::Global, Variable::new("A", "2"))
            .await
            .unwrap_err();
        assert_eq!(err, ResolutionError::Domain(DomainError::DuplicateVariableKey("A".into())));
        assert_eq!(h.repository.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remove_secret_provider() {
        let h = harness(vec![], vec![]).await;
        h.session.remove_secret_provider("vault").await.unwrap();
        assert!(h.repository.providers.lock().is_empty());
        assert!(h.session.remove_secret_provider("vault").await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_request_interpolates_inherited_settings() {
        let h = harness(vec![Variable::new("TOKEN", "abc")], vec![staging()]).await;
        let collection = CollectionSettings::new(
            FolderSettings::new("API")
                .with_id("root")
                .with_header("X-Env", "base")
                .with_auth(AuthConfig::bearer("{{TOKEN}}"))
                .with_base_url("https://{{HOST}}"),
        )
        .with_folder(
            FolderSettings::new("Users")
                .with_id("users")
                .with_parent("root")
                .with_header("X-Env", "{{STAGE}}")
                .with_variable(Variable::new("STAGE", "folder")),
        );

        let resolved = h
            .session
            .resolve_request(&collection, Some("users"), &RequestSettings::default())
            .await;

        assert_eq!(resolved.headers.get("x-env"), Some("folder"));
        assert_eq!(resolved.auth, AuthConfig::bearer("abc"));
        assert_eq!(resolved.base_url.as_deref(), Some("https://staging.example.com"));
    }

    #[tokio::test]
    async fn test_switch_workspace_reloads_and_clears() {
        let mut h = harness(vec![db_pass()], vec![]).await;
        h.session.interpolate("{{DB_PASS}}").await;

        let other = Arc::new(MockRepository::with_state(
            Globals::from_variables(vec![Variable::new("ONLY_OTHER", "x")]),
            vec![],
        ));
        h.session.switch_workspace("other", other).await.unwrap();

        assert_eq!(h.session.vault().workspace_id().as_str(), "other");
        assert_eq!(h.session.gateway().cache_len(), 0);
        assert!(h.session.gateway().providers().is_empty());
        assert_eq!(h.session.interpolate("{{ONLY_OTHER}}").await, "x");
    }
}
