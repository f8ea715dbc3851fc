//! Strata Application - Resolution use cases
//!
//! This crate contains the resolution engine and its ports:
//! - `variable_resolver`: placeholder parsing, substitution and template functions
//! - `secrets`: cached, de-duplicated access to external secret providers
//! - `vault`: encryption and decryption of sensitive variables
//! - `scope_store`: global variables, environments and the active environment
//! - `session`: the per-workspace entry point tying everything together
//! - `ports`: interfaces implemented by the infrastructure layer

pub mod error;
pub mod ports;
pub mod scope_store;
pub mod secrets;
pub mod session;
pub mod variable_resolver;
pub mod vault;

#[cfg(test)]
mod testing;

pub use error::{EngineResult, ResolutionError};
pub use scope_store::{ScopeId, ScopeStore};
pub use secrets::SecretGateway;
pub use session::ResolutionSession;
pub use vault::SensitiveVault;
