//! External secret provider access

mod gateway;

pub use gateway::{SecretCacheEntry, SecretGateway, SecretSnapshot, build_request};
