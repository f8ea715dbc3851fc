//! Resolver settings persistence.
//!
//! Settings live next to the scopes of a workspace as `settings.json`. When no
//! workspace is given, the default workspace is used:
//! - Linux: ~/.config/strata/default
//! - macOS: ~/Library/Application Support/strata/default
//! - Windows: %APPDATA%/strata/default

use std::path::{Path, PathBuf};

use strata_domain::ResolverSettings;
use tracing::debug;

use crate::serialization::{SerializationError, read_json_file, write_json_file};

const SETTINGS_FILE: &str = "settings.json";

/// Error type for settings operations.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Reading or writing the settings file failed.
    #[error("settings error: {0}")]
    Serialization(#[from] SerializationError),
}

/// Returns the directory of the default workspace.
#[must_use]
pub fn default_workspace_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("strata").join("default"))
}

/// Repository for the resolver settings of one workspace.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    path: PathBuf,
}

impl SettingsRepository {
    /// Creates a repository for the workspace at `workspace_dir`.
    #[must_use]
    pub fn new(workspace_dir: &Path) -> Self {
        Self {
            path: workspace_dir.join(SETTINGS_FILE),
        }
    }

    /// Returns the settings file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads settings. Returns defaults if the file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self) -> Result<ResolverSettings, SettingsError> {
        let settings = read_json_file(&self.path).await?;
        if settings.is_none() {
            debug!(path = %self.path.display(), "no settings file, using defaults");
        }
        Ok(settings.unwrap_or_default())
    }

    /// Saves settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, settings: &ResolverSettings) -> Result<(), SettingsError> {
        write_json_file(&self.path, settings).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_workspace_dir_is_under_strata() {
        if let Some(dir) = default_workspace_dir() {
            assert!(dir.ends_with("strata/default"));
        }
    }

    #[tokio::test]
    async fn load_returns_defaults_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SettingsRepository::new(dir.path());
        assert_eq!(repo.load().await.unwrap(), ResolverSettings::default());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SettingsRepository::new(dir.path());
        let settings = ResolverSettings {
            secret_cache_ttl_secs: 60,
            ..ResolverSettings::default()
        };

        repo.save(&settings).await.unwrap();
        assert_eq!(repo.load().await.unwrap(), settings);
    }
}
