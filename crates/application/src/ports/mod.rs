//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the application core and external systems.
//! Each port is a trait that can be implemented by adapters in the infrastructure layer.

mod clock;
mod encryption;
mod scope_repository;
mod secret_backend;

pub use clock::Clock;
pub use encryption::{EncryptionError, EncryptionService};
pub use scope_repository::{RepositoryError, ScopeRepository};
pub use secret_backend::{
    SecretBackend, SecretBackendError, SecretEntry, SecretFetchRequest, SecretFetchResponse,
};
