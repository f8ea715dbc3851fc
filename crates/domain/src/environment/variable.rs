//! Environment variable types

use serde::{Deserialize, Serialize};

use super::secrets::SecretProviderRef;
use crate::id::generate_id;

/// Represents a single variable with its value and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Unique identifier.
    pub id: String,

    /// The variable key, unique within its owning scope.
    pub key: String,

    /// The variable value. Holds ciphertext when `is_secret` is set.
    #[serde(default)]
    pub value: String,

    /// If true, `value` is ciphertext produced by the workspace encryption service.
    #[serde(default)]
    pub is_secret: bool,

    /// Reference into an external secret provider. When present the value is
    /// fetched from the provider instead of read from `value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_provider_ref: Option<SecretProviderRef>,

    /// Whether this variable is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

impl Variable {
    /// Creates a new plain variable.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            key: key.into(),
            value: value.into(),
            is_secret: false,
            secret_provider_ref: None,
            enabled: true,
        }
    }

    /// Creates a sensitive variable whose value is already ciphertext.
    #[must_use]
    pub fn secret(key: impl Into<String>, ciphertext: impl Into<String>) -> Self {
        Self {
            is_secret: true,
            ..Self::new(key, ciphertext)
        }
    }

    /// Creates a variable backed by an external secret provider.
    #[must_use]
    pub fn from_provider(key: impl Into<String>, reference: SecretProviderRef) -> Self {
        Self {
            secret_provider_ref: Some(reference),
            ..Self::new(key, "")
        }
    }

    /// Creates a disabled variable.
    #[must_use]
    pub fn disabled(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            enabled: false,
            ..Self::new(key, value)
        }
    }

    /// Replaces the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Returns the raw value if the variable is enabled.
    #[must_use]
    pub fn enabled_value(&self) -> Option<&str> {
        if self.enabled {
            Some(&self.value)
        } else {
            None
        }
    }

    /// Returns true if the value must come from a secret provider.
    #[must_use]
    pub const fn is_provider_backed(&self) -> bool {
        self.secret_provider_ref.is_some()
    }

    /// Returns true if the stored value is ciphertext that needs decrypting.
    #[must_use]
    pub const fn needs_decryption(&self) -> bool {
        self.is_secret && self.secret_provider_ref.is_none()
    }
}

/// Defines the scope/origin of a variable for resolution precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VariableScope {
    /// Global variables - lowest precedence
    Global = 0,
    /// Variables inherited from the collection and its folders
    Collection = 1,
    /// Variables of the active environment - highest precedence
    Environment = 2,
}

impl VariableScope {
    /// Returns the precedence level (higher = takes priority).
    #[must_use]
    pub const fn precedence(&self) -> u8 {
        *self as u8
    }

    /// Returns a human-readable name for the scope.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Global => "Global",
            Self::Collection => "Collection",
            Self::Environment => "Environment",
        }
    }
}

/// Where the effective value of a resolved variable came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueState {
    /// The raw value of a non-sensitive variable.
    Plain,
    /// A cached value fetched from a secret provider.
    FromSecretProvider,
    /// A cached plaintext of a sensitive variable.
    Decrypted,
    /// The variable exists but its value has not been fetched or decrypted yet.
    Pending,
}

/// A resolved variable with its value and origin scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVariable {
    /// Id of the variable that won the merge.
    pub variable_id: String,
    /// The variable name (without {{ }}).
    pub name: String,
    /// The resolved value. Empty while `state` is `Pending`.
    pub value: String,
    /// The scope from which this value was resolved.
    pub scope: VariableScope,
    /// Origin of the value.
    pub state: ValueState,
}

impl ResolvedVariable {
    /// Creates a new resolved variable.
    #[must_use]
    pub fn new(
        variable: &Variable,
        value: impl Into<String>,
        scope: VariableScope,
        state: ValueState,
    ) -> Self {
        Self {
            variable_id: variable.id.clone(),
            name: variable.key.clone(),
            value: value.into(),
            scope,
            state,
        }
    }

    /// Returns true if the value can be substituted into text.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state != ValueState::Pending
    }
}

/// An environment containing an ordered set of variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Unique identifier
    pub id: String,
    /// Environment name (e.g., "Development", "Production")
    pub name: String,
    /// Display color, as a CSS-style hex string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Schema version for migration support.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Variables in this environment, in user-defined order.
    #[serde(default)]
    pub variables: Vec<Variable>,
    /// Whether this environment is activated when no other one is.
    #[serde(default)]
    pub is_default: bool,
    /// Whether this environment may be synchronized with other machines.
    #[serde(default)]
    pub shareable: bool,
}

const fn default_schema_version() -> u32 {
    1
}

impl Environment {
    /// Creates a new environment with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            color: None,
            schema_version: 1,
            variables: Vec::new(),
            is_default: false,
            shareable: false,
        }
    }

    /// Marks this environment as the default one.
    #[must_use]
    pub const fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Appends a variable, builder style.
    #[must_use]
    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    /// Gets a variable by key.
    #[must_use]
    pub fn get_variable(&self, key: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.key == key)
    }

    /// Returns the number of variables in this environment.
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Returns keys of all variables marked as secret.
    #[must_use]
    pub fn secret_variable_keys(&self) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|v| v.is_secret)
            .map(|v| v.key.as_str())
            .collect()
    }

    /// Resolves a raw value (returns value only if variable is enabled).
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.get_variable(key).and_then(Variable::enabled_value)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new("New Environment")
    }
}
