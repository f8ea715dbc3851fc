//! Strata Domain - Core resolution types
//!
//! This crate defines the domain model of the Strata resolution engine:
//! variables and the scopes that hold them, secret provider configuration,
//! and the folder inheritance chain of a collection.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod collection;
pub mod environment;
pub mod error;
pub mod id;
pub mod request;
pub mod settings;

pub use auth::{ApiKeyLocation, AuthConfig};
pub use error::{DomainError, DomainResult};
pub use id::generate_id;
pub use settings::ResolverSettings;
