//! Command implementations.

pub mod environments;
pub mod key;
pub mod providers;
pub mod resolve;
pub mod variables;
