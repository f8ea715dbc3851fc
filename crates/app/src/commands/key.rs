//! Master key commands.

use std::io::Write;

use strata_infrastructure::master_key_path;

use crate::cli::KeyCommands;
use crate::error::CliError;
use crate::workspace::Workspace;

pub async fn cmd_key(workspace: &Workspace, command: KeyCommands, out: &mut impl Write) -> Result<(), CliError> {
    let enabled = workspace.session().vault().is_enabled().await;
    match command {
        KeyCommands::Init { force } => {
            if enabled && !force {
                return Err(CliError::KeyExists(master_key_path(workspace.dir())));
            }
            let path = workspace
                .encryption()
                .create_key_file(workspace.id(), workspace.dir())
                .await?;
            writeln!(out, "wrote {}", path.display())?;
        }
        KeyCommands::Status => {
            let path = master_key_path(workspace.dir());
            if enabled {
                writeln!(out, "encryption enabled ({})", path.display())?;
            } else {
                writeln!(out, "encryption disabled; run `strata key init`")?;
            }
        }
    }
    Ok(())
}
