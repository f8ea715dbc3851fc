//! Opening a workspace directory as a resolution session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata_application::{ResolutionSession, ScopeId, ScopeStore};
use strata_domain::environment::Variable;
use strata_infrastructure::{
    FileScopeRepository, HttpSecretBackend, LocalEncryptionService, SettingsRepository,
    SystemClock, default_workspace_dir,
};
use tracing::debug;

use crate::error::CliError;

/// Session type used by the CLI.
pub type Session = ResolutionSession<HttpSecretBackend, LocalEncryptionService, FileScopeRepository>;

/// An opened workspace.
pub struct Workspace {
    dir: PathBuf,
    id: String,
    encryption: Arc<LocalEncryptionService>,
    session: Session,
}

impl Workspace {
    /// Opens the workspace at `dir`, or the default workspace.
    ///
    /// Loads settings, the master key if one exists, scopes and providers,
    /// then activates `environment` (matched by name, then by id).
    ///
    /// # Errors
    /// Returns an error if any part of the workspace cannot be loaded or the
    /// environment does not exist.
    pub async fn open(dir: Option<PathBuf>, environment: Option<&str>) -> Result<Self, CliError> {
        let dir = dir.or_else(default_workspace_dir).ok_or(CliError::NoWorkspace)?;
        let id = dir.display().to_string();

        let settings = SettingsRepository::new(&dir).load().await?;
        let encryption = Arc::new(LocalEncryptionService::new());
        if encryption.load_key_file(&id, &dir).await? {
            debug!(workspace = %id, "encryption enabled");
        }

        let mut session = ResolutionSession::new(
            id.clone(),
            Arc::new(HttpSecretBackend::new()?),
            Arc::clone(&encryption),
            Arc::new(FileScopeRepository::new(&dir)),
            Arc::new(SystemClock::new()),
            settings,
        );
        session.load().await?;

        if let Some(name) = environment {
            let env_id = environment_id(session.store(), name)?;
            session.set_active_environment(&env_id)?;
        }

        Ok(Self {
            dir,
            id,
            encryption,
            session,
        })
    }

    /// Returns the workspace directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the workspace id the encryption key is registered under.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the encryption service.
    #[must_use]
    pub fn encryption(&self) -> &LocalEncryptionService {
        &self.encryption
    }

    /// Returns the session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the session for mutation.
    pub const fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Maps an optional environment name to a scope. `None` is the global scope.
    ///
    /// # Errors
    /// Returns [`CliError::NotFound`] if the environment does not exist.
    pub fn scope(&self, environment: Option<&str>) -> Result<ScopeId, CliError> {
        environment.map_or(Ok(ScopeId::Global), |name| {
            self.environment_id(name).map(ScopeId::Environment)
        })
    }

    /// Finds an environment by name, then by id.
    ///
    /// # Errors
    /// Returns [`CliError::NotFound`] if no environment matches.
    pub fn environment_id(&self, name: &str) -> Result<String, CliError> {
        environment_id(self.session.store(), name)
    }

    /// Finds a variable of a scope by key.
    ///
    /// # Errors
    /// Returns [`CliError::NotFound`] if the scope has no such variable.
    pub fn variable(&self, scope: &ScopeId, key: &str) -> Result<Variable, CliError> {
        self.session
            .store()
            .variables(scope)
            .map_err(strata_application::ResolutionError::from)?
            .iter()
            .find(|v| v.key == key)
            .cloned()
            .ok_or_else(|| CliError::NotFound(format!("variable '{key}' not found in {scope}")))
    }
}

fn environment_id(store: &ScopeStore, name: &str) -> Result<String, CliError> {
    store
        .environments()
        .iter()
        .find(|e| e.name == name)
        .or_else(|| store.environment(name))
        .map(|e| e.id.clone())
        .ok_or_else(|| CliError::NotFound(format!("environment '{name}' not found")))
}
