//! Secret provider commands.

use std::io::Write;

use strata_domain::environment::SecretProviderConfig;
use strata_infrastructure::read_json_file;

use crate::cli::ProviderCommands;
use crate::error::CliError;
use crate::workspace::Workspace;

pub async fn cmd_provider(
    workspace: &Workspace,
    command: ProviderCommands,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let session = workspace.session();
    match command {
        ProviderCommands::List => {
            for provider in session.gateway().providers().iter() {
                let state = if provider.enabled { "" } else { "  (disabled)" };
                writeln!(
                    out,
                    "{}  {}  {}{state}",
                    provider.id,
                    provider.provider_type(),
                    provider.name
                )?;
            }
        }
        ProviderCommands::Add { file } => {
            let provider: SecretProviderConfig = read_json_file(&file)
                .await?
                .ok_or_else(|| CliError::NotFound(format!("{} not found", file.display())))?;
            let id = provider.id.clone();
            session.upsert_secret_provider(provider).await;
            writeln!(out, "saved provider {id}")?;
        }
        ProviderCommands::Remove { id } => {
            let removed = session.remove_secret_provider(&id).await?;
            writeln!(out, "removed provider {}", removed.name)?;
        }
    }
    Ok(())
}
