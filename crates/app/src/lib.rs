//! Strata - command line front end of the resolution engine
//!
//! Opens a workspace directory, loads its scopes and secret providers, and
//! resolves `{{variable}}` and `{{$function()}}` placeholders against them.

mod cli;
mod commands;
mod error;
mod workspace;

pub use cli::{Cli, Commands, EnvironmentCommands, KeyCommands, ProviderCommands, VarCommands, run};
pub use error::CliError;
pub use workspace::{Session, Workspace};
