//! Read-only resolution commands.

use std::io::{self, Write};

use strata_application::variable_resolver::TemplateFunctions;
use strata_domain::collection::{CollectionSettings, RequestSettings};
use strata_domain::environment::{ResolvedVariable, ValueState};
use strata_infrastructure::{read_json_file, to_json_stable};

use crate::cli::RequestArgs;
use crate::error::CliError;
use crate::workspace::Workspace;

const MASK: &str = "********";

/// Reads the text argument, or stdin when it is `-`.
fn input(text: &str) -> Result<String, CliError> {
    if text == "-" {
        Ok(io::read_to_string(io::stdin())?)
    } else {
        Ok(text.to_string())
    }
}

pub async fn cmd_resolve(
    workspace: &Workspace,
    text: &str,
    strict: bool,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let text = input(text)?;
    let session = workspace.session();
    let resolved = if strict {
        session.interpolate_strict(&text).await?
    } else {
        session.interpolate(&text).await
    };
    writeln!(out, "{resolved}")?;
    Ok(())
}

pub fn cmd_unresolved(workspace: &Workspace, text: &str, out: &mut impl Write) -> Result<(), CliError> {
    let text = input(text)?;
    for name in workspace.session().get_unresolved_variables(&text) {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

pub async fn cmd_request(
    workspace: &Workspace,
    args: RequestArgs,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let collection: CollectionSettings = read_json_file(&args.collection)
        .await?
        .ok_or_else(|| CliError::NotFound(format!("{} not found", args.collection.display())))?;
    let request: RequestSettings = match &args.request {
        Some(path) => read_json_file(path)
            .await?
            .ok_or_else(|| CliError::NotFound(format!("{} not found", path.display())))?,
        None => RequestSettings::default(),
    };

    let resolved = workspace
        .session()
        .resolve_request(&collection, args.folder.as_deref(), &request)
        .await;
    out.write_all(&to_json_stable(&resolved)?)?;
    Ok(())
}

pub async fn cmd_vars(workspace: &Workspace, reveal: bool, out: &mut impl Write) -> Result<(), CliError> {
    let session = workspace.session();
    let mut view = session.resolved_view(&[]);

    if reveal {
        let pending: String = view
            .iter()
            .filter(|r| r.state == ValueState::Pending)
            .map(|r| format!("{{{{{}}}}}", r.name))
            .collect();
        if !pending.is_empty() {
            session.interpolate(&pending).await;
            view = session.resolved_view(&[]);
        }
    }

    let mut entries: Vec<&ResolvedVariable> = view.iter().collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    let width = entries.iter().map(|r| r.name.len()).max().unwrap_or(0);

    for entry in entries {
        let value = match entry.state {
            ValueState::Plain => entry.value.as_str(),
            ValueState::Pending => "<unavailable>",
            ValueState::Decrypted | ValueState::FromSecretProvider if reveal => entry.value.as_str(),
            ValueState::Decrypted | ValueState::FromSecretProvider => MASK,
        };
        writeln!(
            out,
            "{:<width$}  {:<11}  {value}",
            entry.name,
            entry.scope.display_name(),
        )?;
    }
    Ok(())
}

pub fn cmd_functions(out: &mut impl Write) -> Result<(), CliError> {
    let functions = TemplateFunctions::available();
    let width = functions
        .iter()
        .map(|f| f.name.len() + f.signature.len())
        .max()
        .unwrap_or(0);

    for function in functions {
        let call = format!("{}{}", function.name, function.signature);
        writeln!(out, "{call:<width$}  {}", function.description)?;
    }
    Ok(())
}
