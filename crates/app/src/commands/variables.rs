//! Variable editing commands.

use std::io::Write;

use strata_application::{ResolutionError, ScopeId};
use strata_domain::environment::{SecretProviderRef, Variable};

use crate::cli::VarCommands;
use crate::error::CliError;
use crate::workspace::Workspace;

pub async fn cmd_var(
    workspace: &mut Workspace,
    scope: &ScopeId,
    command: VarCommands,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        VarCommands::Set { key, value, secret } => {
            set_variable(workspace, scope, &key, &value, secret).await?;
            writeln!(out, "set {key} in {scope}")?;
        }
        VarCommands::Link {
            key,
            provider,
            path,
            field,
        } => {
            if workspace.session().gateway().provider(&provider).is_none() {
                return Err(CliError::NotFound(format!("provider '{provider}' not found")));
            }
            let reference = SecretProviderRef::new(provider, path, field);
            link_variable(workspace, scope, &key, reference).await?;
            writeln!(out, "linked {key} in {scope}")?;
        }
        VarCommands::Remove { key } => {
            let variable = workspace.variable(scope, &key)?;
            workspace.session_mut().delete_variable(scope, &variable.id).await?;
            writeln!(out, "removed {key} from {scope}")?;
        }
        VarCommands::Toggle { key } => {
            let variable = workspace.variable(scope, &key)?;
            let enabled = workspace
                .session_mut()
                .toggle_variable(scope, &variable.id)
                .await?;
            let state = if enabled { "enabled" } else { "disabled" };
            writeln!(out, "{key} {state}")?;
        }
        VarCommands::Secret { key, off } => {
            let variable = workspace.variable(scope, &key)?;
            workspace
                .session_mut()
                .set_variable_secret(scope, &variable.id, !off)
                .await?;
            let state = if off { "plaintext" } else { "encrypted" };
            writeln!(out, "{key} is now {state}")?;
        }
    }
    Ok(())
}

async fn set_variable(
    workspace: &mut Workspace,
    scope: &ScopeId,
    key: &str,
    value: &str,
    secret: bool,
) -> Result<(), CliError> {
    if secret {
        return set_secret(workspace, scope, key, value).await;
    }

    match workspace.variable(scope, key) {
        Ok(existing) => {
            workspace
                .session_mut()
                .set_variable_value(scope, &existing.id, value)
                .await?;
        }
        Err(CliError::NotFound(_)) => {
            workspace
                .session_mut()
                .add_variable(scope, Variable::new(key, value))
                .await?;
        }
        Err(other) => return Err(other),
    }
    Ok(())
}

/// The plaintext is encrypted before anything is saved.
async fn set_secret(
    workspace: &mut Workspace,
    scope: &ScopeId,
    key: &str,
    value: &str,
) -> Result<(), CliError> {
    if !workspace.session().vault().is_enabled().await {
        return Err(ResolutionError::VaultNotEnabled(workspace.id().to_string()).into());
    }

    match workspace.variable(scope, key) {
        Ok(existing) => {
            workspace
                .session_mut()
                .set_secret_value(scope, &existing.id, value)
                .await?;
        }
        Err(CliError::NotFound(_)) => {
            workspace
                .session_mut()
                .add_secret_variable(scope, Variable::new(key, value))
                .await?;
        }
        Err(other) => return Err(other),
    }
    Ok(())
}

async fn link_variable(
    workspace: &mut Workspace,
    scope: &ScopeId,
    key: &str,
    reference: SecretProviderRef,
) -> Result<(), CliError> {
    match workspace.variable(scope, key) {
        Ok(existing) => {
            let updated = Variable {
                value: String::new(),
                secret_provider_ref: Some(reference),
                ..existing
            };
            workspace.session_mut().update_variable(scope, updated).await?;
        }
        Err(CliError::NotFound(_)) => {
            workspace
                .session_mut()
                .add_variable(scope, Variable::from_provider(key, reference))
                .await?;
        }
        Err(other) => return Err(other),
    }
    Ok(())
}
