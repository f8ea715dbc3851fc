//! Command line definition and dispatch.

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands;
use crate::error::CliError;
use crate::workspace::Workspace;

/// Resolve `{{variables}}`, secrets and template functions against a workspace.
#[derive(Parser, Debug)]
#[command(name = "strata", version, about)]
pub struct Cli {
    /// Workspace directory. Defaults to the per-user default workspace.
    #[arg(short, long, global = true, env = "STRATA_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Environment to activate, by name or id. Variable commands edit this
    /// environment instead of the globals.
    #[arg(short, long, global = true)]
    pub environment: Option<String>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interpolate a string. Pass `-` to read it from stdin.
    Resolve {
        /// Text containing placeholders.
        text: String,
        /// Fail if any variable stays unresolved.
        #[arg(long)]
        strict: bool,
    },
    /// List referenced variables that are not defined.
    Unresolved {
        /// Text containing placeholders. Pass `-` to read it from stdin.
        text: String,
    },
    /// Resolve the effective auth, headers and base URL of a request.
    Request(RequestArgs),
    /// List the variables in effect.
    Vars {
        /// Fetch and decrypt secrets and print their values.
        #[arg(long)]
        reveal: bool,
    },
    /// List the template functions.
    Functions,
    /// Manage variables.
    #[command(subcommand)]
    Var(VarCommands),
    /// Manage environments.
    #[command(name = "env", subcommand)]
    Environment(EnvironmentCommands),
    /// Manage secret providers.
    #[command(subcommand)]
    Provider(ProviderCommands),
    /// Manage the workspace master key.
    #[command(subcommand)]
    Key(KeyCommands),
}

/// Inputs of the `request` command.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Collection settings file (JSON).
    #[arg(long)]
    pub collection: PathBuf,
    /// Folder the request lives in. Defaults to the collection root.
    #[arg(long)]
    pub folder: Option<String>,
    /// Request settings file (JSON).
    #[arg(long)]
    pub request: Option<PathBuf>,
}

/// Variable commands.
#[derive(Subcommand, Debug)]
pub enum VarCommands {
    /// Create or update a variable.
    Set {
        /// Variable key.
        key: String,
        /// Plaintext value.
        value: String,
        /// Store the value encrypted.
        #[arg(long)]
        secret: bool,
    },
    /// Point a variable at a secret provider.
    Link {
        /// Variable key.
        key: String,
        /// Provider id.
        #[arg(long)]
        provider: String,
        /// Secret path inside the provider.
        #[arg(long)]
        path: String,
        /// Key inside the secret.
        #[arg(long, default_value = "")]
        field: String,
    },
    /// Delete a variable.
    #[command(name = "rm")]
    Remove {
        /// Variable key.
        key: String,
    },
    /// Enable or disable a variable.
    Toggle {
        /// Variable key.
        key: String,
    },
    /// Encrypt a variable's value, or decrypt it with `--off`.
    Secret {
        /// Variable key.
        key: String,
        /// Store the value as plaintext again.
        #[arg(long)]
        off: bool,
    },
}

/// Environment commands.
#[derive(Subcommand, Debug)]
pub enum EnvironmentCommands {
    /// List environments.
    List,
    /// Create an environment.
    Add {
        /// Environment name.
        name: String,
        /// Activate it when no other environment is chosen.
        #[arg(long)]
        default: bool,
    },
    /// Delete an environment.
    #[command(name = "rm")]
    Remove {
        /// Environment name or id.
        name: String,
    },
}

/// Secret provider commands.
#[derive(Subcommand, Debug)]
pub enum ProviderCommands {
    /// List providers.
    List,
    /// Add or replace a provider from a JSON file.
    Add {
        /// Provider configuration file.
        file: PathBuf,
    },
    /// Delete a provider.
    #[command(name = "rm")]
    Remove {
        /// Provider id.
        id: String,
    },
}

/// Master key commands.
#[derive(Subcommand, Debug)]
pub enum KeyCommands {
    /// Generate a master key for the workspace.
    Init {
        /// Replace an existing key. Values encrypted with it become unreadable.
        #[arg(long)]
        force: bool,
    },
    /// Show whether the workspace has a master key.
    Status,
}

/// Runs a parsed command line, writing results to `out`.
///
/// # Errors
/// Returns the first error of opening the workspace or running the command.
pub async fn run(cli: Cli, out: &mut impl Write) -> Result<(), CliError> {
    let mut workspace = Workspace::open(cli.workspace, cli.environment.as_deref()).await?;
    let environment = cli.environment.as_deref();

    match cli.command {
        Commands::Resolve { text, strict } => {
            commands::resolve::cmd_resolve(&workspace, &text, strict, out).await
        }
        Commands::Unresolved { text } => commands::resolve::cmd_unresolved(&workspace, &text, out),
        Commands::Request(args) => commands::resolve::cmd_request(&workspace, args, out).await,
        Commands::Vars { reveal } => commands::resolve::cmd_vars(&workspace, reveal, out).await,
        Commands::Functions => commands::resolve::cmd_functions(out),
        Commands::Var(command) => {
            let scope = workspace.scope(environment)?;
            commands::variables::cmd_var(&mut workspace, &scope, command, out).await
        }
        Commands::Environment(command) => {
            commands::environments::cmd_env(&mut workspace, command, out).await
        }
        Commands::Provider(command) => {
            commands::providers::cmd_provider(&workspace, command, out).await
        }
        Commands::Key(command) => commands::key::cmd_key(&workspace, command, out).await,
    }
}
