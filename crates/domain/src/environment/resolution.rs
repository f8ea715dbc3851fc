//! Resolved view for variable substitution
//!
//! Merges every variable source into one key → value map with proper precedence.

use std::collections::HashMap;

use super::secrets::SecretProviderRef;
use super::variable::{ResolvedVariable, ValueState, Variable, VariableScope};

/// Supplies the values that are not stored on the variables themselves.
pub trait CachedValues {
    /// Returns the cached, still-live value of a provider-backed secret.
    fn secret_value(&self, reference: &SecretProviderRef) -> Option<String>;

    /// Returns the cached plaintext of a sensitive variable.
    fn decrypted_value(&self, variable: &Variable) -> Option<String>;
}

/// A [`CachedValues`] with nothing cached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCachedValues;

impl CachedValues for NoCachedValues {
    fn secret_value(&self, _reference: &SecretProviderRef) -> Option<String> {
        None
    }

    fn decrypted_value(&self, _variable: &Variable) -> Option<String> {
        None
    }
}

/// Merged, override-applied, enabled-only map of variables.
///
/// Variables are layered in order of precedence (highest wins):
/// 1. Active environment
/// 2. Collection and folder variables inherited by the request
/// 3. Global
///
/// The view is rebuilt for every resolution and holds no state of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedView {
    entries: HashMap<String, ResolvedVariable>,
}

impl ResolvedView {
    /// Creates an empty view.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a view from the given sources.
    #[must_use]
    pub fn build(
        globals: &[Variable],
        inherited: &[Variable],
        environment: &[Variable],
        cached: &impl CachedValues,
    ) -> Self {
        let mut view = Self::new();
        view.layer(globals, VariableScope::Global, cached);
        view.layer(inherited, VariableScope::Collection, cached);
        view.layer(environment, VariableScope::Environment, cached);
        view
    }

    fn layer(&mut self, variables: &[Variable], scope: VariableScope, cached: &impl CachedValues) {
        for variable in variables.iter().filter(|v| v.enabled) {
            let resolved = Self::effective(variable, scope, cached);
            self.entries.insert(variable.key.clone(), resolved);
        }
    }

    fn effective(
        variable: &Variable,
        scope: VariableScope,
        cached: &impl CachedValues,
    ) -> ResolvedVariable {
        if let Some(reference) = &variable.secret_provider_ref {
            return match cached.secret_value(reference) {
                Some(value) => {
                    ResolvedVariable::new(variable, value, scope, ValueState::FromSecretProvider)
                }
                None => ResolvedVariable::new(variable, "", scope, ValueState::Pending),
            };
        }

        if variable.needs_decryption() {
            return match cached.decrypted_value(variable) {
                Some(value) => ResolvedVariable::new(variable, value, scope, ValueState::Decrypted),
                None => ResolvedVariable::new(variable, "", scope, ValueState::Pending),
            };
        }

        ResolvedVariable::new(variable, variable.value.clone(), scope, ValueState::Plain)
    }

    /// Returns the entry for a key, ready or pending.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResolvedVariable> {
        self.entries.get(name)
    }

    /// Returns true if the key is defined in any scope.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Resolves a key to its value if the value is available.
    #[must_use]
    pub fn resolve_value(&self, name: &str) -> Option<&str> {
        self.entries
            .get(name)
            .filter(|r| r.is_ready())
            .map(|r| r.value.as_str())
    }

    /// Returns all keys, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no variable is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedVariable> {
        self.entries.values()
    }
}
