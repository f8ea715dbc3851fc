//! Scope store
//!
//! Holds global variables and environments, tracks the active environment and
//! builds the [`ResolvedView`]. Every mutation swaps in a new copy of the
//! affected collection, so views and snapshots taken earlier never change
//! under their holders.

use std::fmt;
use std::sync::Arc;

use strata_domain::environment::{CachedValues, Environment, Globals, ResolvedView, Variable};
use strata_domain::{DomainError, DomainResult};
use tracing::debug;

use crate::variable_resolver::is_valid_variable_name;

/// Identifies a variable collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeId {
    /// The global variables.
    Global,
    /// The variables of one environment.
    Environment(String),
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Environment(id) => write!(f, "environment {id}"),
        }
    }
}

/// In-memory state of global variables and environments.
#[derive(Debug, Clone, Default)]
pub struct ScopeStore {
    globals: Arc<Vec<Variable>>,
    environments: Arc<Vec<Environment>>,
    active_environment_id: Option<String>,
}

impl ScopeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from loaded state and activates an environment.
    #[must_use]
    pub fn from_parts(globals: Globals, environments: Vec<Environment>, active: Option<String>) -> Self {
        let mut store = Self {
            globals: Arc::new(globals.variables),
            environments: Arc::new(environments),
            active_environment_id: active,
        };
        store.ensure_active();
        store
    }

    /// Returns the global variables.
    #[must_use]
    pub fn globals(&self) -> &[Variable] {
        &self.globals
    }

    /// Returns the environments.
    #[must_use]
    pub fn environments(&self) -> &[Environment] {
        &self.environments
    }

    /// Returns an environment by id.
    #[must_use]
    pub fn environment(&self, id: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.id == id)
    }

    /// Returns the id of the active environment.
    #[must_use]
    pub fn active_environment_id(&self) -> Option<&str> {
        self.active_environment_id.as_deref()
    }

    /// Returns the active environment.
    #[must_use]
    pub fn active_environment(&self) -> Option<&Environment> {
        self.active_environment_id
            .as_deref()
            .and_then(|id| self.environment(id))
    }

    /// Returns the variables of a scope.
    ///
    /// # Errors
    /// Returns [`DomainError::EnvironmentNotFound`] for an unknown environment.
    pub fn variables(&self, scope: &ScopeId) -> DomainResult<&[Variable]> {
        match scope {
            ScopeId::Global => Ok(&self.globals),
            ScopeId::Environment(id) => self
                .environment(id)
                .map(|e| e.variables.as_slice())
                .ok_or_else(|| DomainError::EnvironmentNotFound(id.clone())),
        }
    }

    /// Returns a variable of a scope by id.
    ///
    /// # Errors
    /// Returns an error if the scope or variable does not exist.
    pub fn variable(&self, scope: &ScopeId, id: &str) -> DomainResult<&Variable> {
        self.variables(scope)?
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| DomainError::VariableNotFound(id.to_string()))
    }

    /// Adds a variable to a scope.
    ///
    /// # Errors
    /// Returns an error if the key is invalid or already used in the scope.
    pub fn add_variable(&mut self, scope: &ScopeId, variable: Variable) -> DomainResult<()> {
        validate_key(&variable.key)?;
        self.edit(scope, |variables| {
            if variables.iter().any(|v| v.key == variable.key) {
                return Err(DomainError::DuplicateVariableKey(variable.key.clone()));
            }
            variables.push(variable);
            Ok(())
        })
    }

    /// Replaces the variable with the same id. Returns the previous version.
    ///
    /// # Errors
    /// Returns an error if the variable does not exist or the new key is
    /// invalid or taken by another variable of the scope.
    pub fn update_variable(&mut self, scope: &ScopeId, variable: Variable) -> DomainResult<Variable> {
        validate_key(&variable.key)?;
        self.edit(scope, |variables| {
            if variables
                .iter()
                .any(|v| v.key == variable.key && v.id != variable.id)
            {
                return Err(DomainError::DuplicateVariableKey(variable.key.clone()));
            }
            let slot = variables
                .iter_mut()
                .find(|v| v.id == variable.id)
                .ok_or_else(|| DomainError::VariableNotFound(variable.id.clone()))?;
            Ok(std::mem::replace(slot, variable))
        })
    }

    /// Removes a variable. Returns the removed variable.
    ///
    /// # Errors
    /// Returns an error if the scope or variable does not exist.
    pub fn delete_variable(&mut self, scope: &ScopeId, id: &str) -> DomainResult<Variable> {
        self.edit(scope, |variables| {
            let pos = variables
                .iter()
                .position(|v| v.id == id)
                .ok_or_else(|| DomainError::VariableNotFound(id.to_string()))?;
            Ok(variables.remove(pos))
        })
    }

    /// Flips the enabled flag of a variable. Returns the new state.
    ///
    /// # Errors
    /// Returns an error if the scope or variable does not exist.
    pub fn toggle_variable(&mut self, scope: &ScopeId, id: &str) -> DomainResult<bool> {
        self.edit(scope, |variables| {
            let variable = variables
                .iter_mut()
                .find(|v| v.id == id)
                .ok_or_else(|| DomainError::VariableNotFound(id.to_string()))?;
            variable.enabled = !variable.enabled;
            Ok(variable.enabled)
        })
    }

    fn edit<R>(
        &mut self,
        scope: &ScopeId,
        f: impl FnOnce(&mut Vec<Variable>) -> DomainResult<R>,
    ) -> DomainResult<R> {
        match scope {
            ScopeId::Global => {
                let mut next = Vec::clone(&self.globals);
                let result = f(&mut next)?;
                self.globals = Arc::new(next);
                Ok(result)
            }
            ScopeId::Environment(id) => {
                let mut next = Vec::clone(&self.environments);
                let environment = next
                    .iter_mut()
                    .find(|e| e.id == *id)
                    .ok_or_else(|| DomainError::EnvironmentNotFound(id.clone()))?;
                let result = f(&mut environment.variables)?;
                self.environments = Arc::new(next);
                Ok(result)
            }
        }
    }

    /// Adds an environment. Activates it if no environment is active.
    ///
    /// # Errors
    /// Returns an error if one of its variables has an invalid or duplicate key.
    pub fn add_environment(&mut self, environment: Environment) -> DomainResult<()> {
        validate_keys(&environment.variables)?;
        let mut next = Vec::clone(&self.environments);
        next.retain(|e| e.id != environment.id);
        next.push(environment);
        self.environments = Arc::new(next);
        self.ensure_active();
        Ok(())
    }

    /// Replaces the environment with the same id.
    ///
    /// # Errors
    /// Returns an error if the environment does not exist or its variables
    /// have invalid or duplicate keys.
    pub fn update_environment(&mut self, environment: Environment) -> DomainResult<()> {
        validate_keys(&environment.variables)?;
        let mut next = Vec::clone(&self.environments);
        let slot = next
            .iter_mut()
            .find(|e| e.id == environment.id)
            .ok_or_else(|| DomainError::EnvironmentNotFound(environment.id.clone()))?;
        *slot = environment;
        self.environments = Arc::new(next);
        Ok(())
    }

    /// Removes an environment. If it was active, another one is activated.
    ///
    /// # Errors
    /// Returns an error if the environment does not exist.
    pub fn delete_environment(&mut self, id: &str) -> DomainResult<Environment> {
        let mut next = Vec::clone(&self.environments);
        let pos = next
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| DomainError::EnvironmentNotFound(id.to_string()))?;
        let removed = next.remove(pos);
        self.environments = Arc::new(next);
        if self.active_environment_id.as_deref() == Some(id) {
            self.active_environment_id = None;
        }
        self.ensure_active();
        Ok(removed)
    }

    /// Activates an environment. Returns true if the active environment changed.
    ///
    /// # Errors
    /// Returns an error if the environment does not exist.
    pub fn set_active_environment(&mut self, id: &str) -> DomainResult<bool> {
        if self.environment(id).is_none() {
            return Err(DomainError::EnvironmentNotFound(id.to_string()));
        }
        if self.active_environment_id.as_deref() == Some(id) {
            return Ok(false);
        }
        self.active_environment_id = Some(id.to_string());
        Ok(true)
    }

    /// Makes sure an environment is active whenever any exists: the current
    /// one if it still exists, else the default, else the first.
    fn ensure_active(&mut self) {
        if self.active_environment().is_some() {
            return;
        }
        let next = self
            .environments
            .iter()
            .find(|e| e.is_default)
            .or_else(|| self.environments.first())
            .map(|e| e.id.clone());
        if let Some(id) = &next {
            debug!(environment_id = %id, "activating environment");
        }
        self.active_environment_id = next;
    }

    /// Returns the enabled variable that wins for `key`: active environment,
    /// then inherited collection variables, then globals.
    #[must_use]
    pub fn effective_variable<'a>(&'a self, key: &str, inherited: &'a [Variable]) -> Option<&'a Variable> {
        let find = |variables: &'a [Variable]| variables.iter().find(|v| v.enabled && v.key == key);
        self.active_environment()
            .and_then(|e| find(&e.variables))
            .or_else(|| find(inherited))
            .or_else(|| find(&self.globals))
    }

    /// Builds the resolved view over the current state.
    #[must_use]
    pub fn resolved_view(&self, inherited: &[Variable], cached: &impl CachedValues) -> ResolvedView {
        let environment = self
            .active_environment()
            .map_or(&[][..], |e| e.variables.as_slice());
        ResolvedView::build(&self.globals, inherited, environment, cached)
    }
}

fn validate_key(key: &str) -> DomainResult<()> {
    if is_valid_variable_name(key) {
        Ok(())
    } else {
        Err(DomainError::InvalidVariableKey(key.to_string()))
    }
}

fn validate_keys(variables: &[Variable]) -> DomainResult<()> {
    for (i, variable) in variables.iter().enumerate() {
        validate_key(&variable.key)?;
        if variables[..i].iter().any(|v| v.key == variable.key) {
            return Err(DomainError::DuplicateVariableKey(variable.key.clone()));
        }
    }
    Ok(())
}
