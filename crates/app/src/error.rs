//! CLI error type.

use std::io;
use std::path::PathBuf;

use strata_application::ResolutionError;
use strata_application::ports::{EncryptionError, SecretBackendError};
use strata_infrastructure::{SerializationError, SettingsError};

/// Errors reported by CLI commands.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The resolution engine rejected the operation.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Workspace settings could not be loaded.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The workspace master key could not be loaded or created.
    #[error("encryption: {0}")]
    Encryption(#[from] EncryptionError),

    /// The secret backend could not be created.
    #[error("secret backend: {0}")]
    Backend(#[from] SecretBackendError),

    /// An input file could not be read.
    #[error(transparent)]
    Input(#[from] SerializationError),

    /// Writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A named item does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The workspace already has a master key.
    #[error("{} already exists; pass --force to replace it", .0.display())]
    KeyExists(PathBuf),

    /// No workspace was given and the platform has no config directory.
    #[error("no workspace directory; pass --workspace")]
    NoWorkspace,
}
