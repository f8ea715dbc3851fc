//! Application error types

use thiserror::Error;
use strata_domain::DomainError;

/// Errors raised by the resolution engine.
///
/// Interpolation itself never fails: missing values stay as placeholders and
/// function failures become inline markers. These errors surface from
/// mutators, secrecy toggles and the strict interpolation entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Placeholders remained after interpolation.
    #[error("unresolved variables: {}", .0.join(", "))]
    UnresolvedReference(Vec<String>),

    /// A secret could not be fetched from its provider.
    #[error("secret fetch failed for {key}: {reason}")]
    SecretFetch {
        /// Cache key of the secret (`provider:path#key`).
        key: String,
        /// What went wrong.
        reason: String,
    },

    /// A sensitive value could not be encrypted.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// A sensitive value could not be decrypted.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// A template function rejected its arguments or failed.
    #[error("{name}: {message}")]
    TemplateFunction {
        /// Function name, e.g. `hash.md5`.
        name: String,
        /// Error message.
        message: String,
    },

    /// Loading or saving scope data failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The workspace has no encryption key configured.
    #[error("vault is not enabled for workspace {0}")]
    VaultNotEnabled(String),

    /// A domain validation error occurred.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Result type alias for resolution operations.
pub type EngineResult<T> = Result<T, ResolutionError>;
