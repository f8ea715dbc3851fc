//! Domain error types

use thiserror::Error;

/// Domain-level errors raised when a mutation would break a scope invariant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A variable with the same key already exists in the scope.
    #[error("duplicate variable key: {0}")]
    DuplicateVariableKey(String),

    /// No variable with this id exists in the scope.
    #[error("variable not found: {0}")]
    VariableNotFound(String),

    /// No environment with this id exists.
    #[error("environment not found: {0}")]
    EnvironmentNotFound(String),

    /// A variable key is malformed.
    #[error("invalid variable key: {0:?}")]
    InvalidVariableKey(String),

    /// No secret provider with this id exists.
    #[error("secret provider not found: {0}")]
    SecretProviderNotFound(String),
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
