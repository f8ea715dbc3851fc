//! Variable resolution engine
//!
//! Substitutes `{{variable}}` references from a [`ResolvedView`] and evaluates
//! template function calls.

use strata_domain::environment::{ResolvedVariable, ResolvedView};

use super::functions::{EvalContext, TemplateFunctions, error_marker};
use super::parser::{VariableReference, parse_function_call, parse_variables};

/// Result of variable resolution for a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionResult {
    /// The string with every available variable substituted.
    pub resolved: String,

    /// Variables that were successfully resolved.
    pub resolved_variables: Vec<ResolvedVariable>,

    /// Variable names that could not be resolved, missing or still pending.
    pub unresolved: Vec<String>,

    /// Whether all variables were successfully resolved.
    pub is_complete: bool,
}

impl ResolutionResult {
    /// Creates a result for input with no variables.
    #[must_use]
    pub fn no_variables(input: &str) -> Self {
        Self {
            resolved: input.to_string(),
            resolved_variables: Vec::new(),
            unresolved: Vec::new(),
            is_complete: true,
        }
    }

    /// Returns the count of resolved variables.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.resolved_variables.len()
    }
}

/// The variable resolution engine.
#[derive(Debug, Clone, Default)]
pub struct VariableResolver {
    view: ResolvedView,
}

impl VariableResolver {
    /// Creates a new resolver over the given view.
    #[must_use]
    pub const fn new(view: ResolvedView) -> Self {
        Self { view }
    }

    /// Substitutes every variable whose value is ready.
    ///
    /// Function calls and pending or unknown variables keep their original
    /// text. Nothing is fetched or decrypted here.
    #[must_use]
    pub fn resolve(&self, input: &str) -> ResolutionResult {
        let references = parse_variables(input);

        if references.is_empty() {
            return ResolutionResult::no_variables(input);
        }

        let mut resolved_vars = Vec::new();
        let mut unresolved = Vec::new();

        let resolved = splice(input, &references, |var_ref| {
            if var_ref.is_function {
                return None;
            }
            match self.view.get(&var_ref.name).filter(|r| r.is_ready()) {
                Some(entry) => {
                    resolved_vars.push(entry.clone());
                    Some(entry.value.clone())
                }
                None => {
                    if !unresolved.contains(&var_ref.name) {
                        unresolved.push(var_ref.name.clone());
                    }
                    None
                }
            }
        });

        ResolutionResult {
            resolved,
            resolved_variables: resolved_vars,
            is_complete: unresolved.is_empty(),
            unresolved,
        }
    }

    /// Replaces function calls left to right.
    ///
    /// Unknown functions keep their original text; failing calls become an
    /// `[error: <name>: <message>]` marker. Output is not re-scanned.
    #[must_use]
    pub fn evaluate_functions(input: &str, ctx: &EvalContext) -> String {
        let references = parse_variables(input);
        if references.iter().all(|r| !r.is_function) {
            return input.to_string();
        }

        splice(input, &references, |var_ref| {
            let call = parse_function_call(&var_ref.name)?;
            match TemplateFunctions::evaluate(&call, ctx)? {
                Ok(value) => Some(value),
                Err(error) => {
                    tracing::debug!(function = %call.name, %error, "template function failed");
                    Some(error_marker(&call.name, &error))
                }
            }
        })
    }

    /// Runs [`resolve`](Self::resolve) and then evaluates function calls.
    #[must_use]
    pub fn resolve_with_functions(&self, input: &str, ctx: &EvalContext) -> ResolutionResult {
        let mut result = self.resolve(input);
        result.resolved = Self::evaluate_functions(&result.resolved, ctx);
        result
    }

    /// Returns names that are neither defined in the view nor function
    /// calls, de-duplicated in first-seen order.
    ///
    /// Pending secrets count as defined.
    #[must_use]
    pub fn find_unresolved(&self, input: &str) -> Vec<String> {
        let mut unresolved: Vec<String> = Vec::new();

        for var_ref in parse_variables(input) {
            if !var_ref.is_function
                && !self.view.contains(&var_ref.name)
                && !unresolved.contains(&var_ref.name)
            {
                unresolved.push(var_ref.name);
            }
        }

        unresolved
    }
}

/// Rebuilds `input`, replacing each reference for which `replace` returns a
/// value and copying the rest verbatim.
fn splice(
    input: &str,
    references: &[VariableReference],
    mut replace: impl FnMut(&VariableReference) -> Option<String>,
) -> String {
    let mut result = String::with_capacity(input.len());
    let mut last_end = 0;

    for var_ref in references {
        result.push_str(&input[last_end..var_ref.span.start]);
        match replace(var_ref) {
            Some(value) => result.push_str(&value),
            None => result.push_str(&input[var_ref.span.clone()]),
        }
        last_end = var_ref.span.end;
    }

    result.push_str(&input[last_end..]);
    result
}
