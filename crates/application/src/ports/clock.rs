//! Time source port

use chrono::{DateTime, Utc};

/// Supplies the current time to secret cache expiry and the `timestamp`
/// template functions.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}
