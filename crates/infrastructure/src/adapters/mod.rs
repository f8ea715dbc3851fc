//! Adapters implementing application ports.

mod http_secret_backend;
mod local_encryption;
mod system_clock;

pub use http_secret_backend::HttpSecretBackend;
pub use local_encryption::{LocalEncryptionService, MASTER_KEY_PATH, master_key_path};
pub use system_clock::SystemClock;
