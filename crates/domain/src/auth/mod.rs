//! Authentication domain types

mod config;

pub use config::{ApiKeyLocation, AuthConfig};
