//! Global variables shared across all collections and environments

use serde::{Deserialize, Serialize};

use super::variable::Variable;

/// Global variables shared across all collections and environments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Globals {
    /// Schema version for migration support.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Global variables available everywhere.
    #[serde(default)]
    pub variables: Vec<Variable>,
}

const fn default_schema_version() -> u32 {
    1
}

impl Globals {
    /// Creates a new empty globals store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            schema_version: 1,
            variables: Vec::new(),
        }
    }

    /// Creates globals from an existing list of variables.
    #[must_use]
    pub const fn from_variables(variables: Vec<Variable>) -> Self {
        Self {
            schema_version: 1,
            variables,
        }
    }

    /// Gets a variable by key.
    #[must_use]
    pub fn get_variable(&self, key: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.key == key)
    }

    /// Resolves a raw value (returns value only if variable is enabled).
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.get_variable(key).and_then(Variable::enabled_value)
    }
}

impl Default for Globals {
    fn default() -> Self {
        Self::new()
    }
}
