//! Request-level settings types

mod header;

pub use header::{Header, Headers};
