//! File-based scope repository.
//!
//! Stores the scopes of one workspace as JSON files:
//! ```text
//! workspace/
//!   globals.json
//!   secret_providers.json
//!   environments/
//!     <environment id>.json
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use strata_application::ports::{RepositoryError, ScopeRepository};
use strata_domain::environment::{Environment, Globals, SecretProviderConfig};
use tokio::fs;
use tracing::{debug, warn};

use crate::serialization::{SerializationError, read_json_file, write_json_file};

const GLOBALS_FILE: &str = "globals.json";
const PROVIDERS_FILE: &str = "secret_providers.json";
const ENVIRONMENTS_DIR: &str = "environments";

fn convert(error: SerializationError) -> RepositoryError {
    match error {
        SerializationError::Io(e) => RepositoryError::Io(e),
        other => RepositoryError::Serialization(other.to_string()),
    }
}

/// Scope repository rooted at a workspace directory.
#[derive(Debug, Clone)]
pub struct FileScopeRepository {
    root: PathBuf,
}

impl FileScopeRepository {
    /// Creates a repository for the workspace at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn environments_dir(&self) -> PathBuf {
        self.root.join(ENVIRONMENTS_DIR)
    }

    fn environment_path(&self, id: &str) -> Result<PathBuf, RepositoryError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(RepositoryError::Serialization(format!(
                "environment id {id:?} cannot be used as a file name"
            )));
        }
        Ok(self.environments_dir().join(format!("{id}.json")))
    }
}

#[async_trait]
impl ScopeRepository for FileScopeRepository {
    async fn load_globals(&self) -> Result<Globals, RepositoryError> {
        let globals = read_json_file(&self.root.join(GLOBALS_FILE))
            .await
            .map_err(convert)?;
        Ok(globals.unwrap_or_default())
    }

    async fn save_globals(&self, globals: &Globals) -> Result<(), RepositoryError> {
        write_json_file(&self.root.join(GLOBALS_FILE), globals)
            .await
            .map_err(convert)
    }

    async fn load_environments(&self) -> Result<Vec<Environment>, RepositoryError> {
        let dir = self.environments_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut environments = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match read_json_file::<Environment>(&path).await {
                Ok(Some(environment)) => environments.push(environment),
                Ok(None) => {}
                Err(error) => warn!(path = %path.display(), %error, "skipping unreadable environment"),
            }
        }

        environments.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        debug!(count = environments.len(), "loaded environments");
        Ok(environments)
    }

    async fn save_environment(&self, environment: &Environment) -> Result<(), RepositoryError> {
        let path = self.environment_path(&environment.id)?;
        write_json_file(&path, environment).await.map_err(convert)
    }

    async fn delete_environment(&self, id: &str) -> Result<(), RepositoryError> {
        let path = self.environment_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RepositoryError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn load_secret_providers(&self) -> Result<Vec<SecretProviderConfig>, RepositoryError> {
        let providers = read_json_file(&self.root.join(PROVIDERS_FILE))
            .await
            .map_err(convert)?;
        Ok(providers.unwrap_or_default())
    }

    async fn save_secret_providers(
        &self,
        providers: &[SecretProviderConfig],
    ) -> Result<(), RepositoryError> {
        write_json_file(&self.root.join(PROVIDERS_FILE), &providers)
            .await
            .map_err(convert)
    }
}
