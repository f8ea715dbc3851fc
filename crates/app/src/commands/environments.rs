//! Environment commands.

use std::io::Write;

use strata_domain::environment::Environment;

use crate::cli::EnvironmentCommands;
use crate::error::CliError;
use crate::workspace::Workspace;

pub async fn cmd_env(
    workspace: &mut Workspace,
    command: EnvironmentCommands,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        EnvironmentCommands::List => {
            let store = workspace.session().store();
            let active = store.active_environment_id();
            for environment in store.environments() {
                let marker = if active == Some(environment.id.as_str()) { "*" } else { " " };
                let default = if environment.is_default { " (default)" } else { "" };
                writeln!(
                    out,
                    "{marker} {}{default}  {} variables  [{}]",
                    environment.name,
                    environment.variable_count(),
                    environment.id
                )?;
            }
        }
        EnvironmentCommands::Add { name, default } => {
            let mut environment = Environment::new(&name);
            if default {
                environment = environment.as_default();
            }
            let id = environment.id.clone();
            workspace.session_mut().add_environment(environment).await?;
            writeln!(out, "created environment {name} [{id}]")?;
        }
        EnvironmentCommands::Remove { name } => {
            let id = workspace.environment_id(&name)?;
            let removed = workspace.session_mut().delete_environment(&id).await?;
            writeln!(out, "removed environment {}", removed.name)?;
        }
    }
    Ok(())
}
