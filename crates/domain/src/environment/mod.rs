//! Environment and variable domain types

mod globals;
mod resolution;
mod secrets;
mod variable;

pub use globals::Globals;
pub use resolution::{CachedValues, NoCachedValues, ResolvedView};
pub use secrets::{
    SecretCacheKey, SecretProviderConfig, SecretProviderKind, SecretProviderRef,
    SecretProviderType,
};
pub use variable::{Environment, ResolvedVariable, ValueState, Variable, VariableScope};
