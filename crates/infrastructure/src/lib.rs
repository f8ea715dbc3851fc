//! Strata Infrastructure - Adapters and implementations
//!
//! Concrete implementations of the ports defined in the application layer:
//! AES-GCM encryption of sensitive values, HTTP secret backends, and
//! JSON-file persistence of workspace scopes and settings.

pub mod adapters;
pub mod persistence;
pub mod serialization;

pub use adapters::{HttpSecretBackend, LocalEncryptionService, SystemClock, master_key_path};
pub use persistence::{
    FileScopeRepository, SettingsError, SettingsRepository, default_workspace_dir,
};
pub use serialization::{SerializationError, read_json_file, to_json_stable, write_json_file};
