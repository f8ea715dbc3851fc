//! File-based persistence of workspace state.

mod scope_repository;
mod settings_repository;

pub use scope_repository::FileScopeRepository;
pub use settings_repository::{SettingsError, SettingsRepository, default_workspace_dir};
