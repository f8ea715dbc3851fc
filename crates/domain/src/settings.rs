//! Resolver settings
//!
//! Tunables of the resolution engine, stored as `settings.json` in a workspace.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collection::DEFAULT_MAX_DEPTH;

/// Tunables of the resolution engine. Missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Schema version for migration support.
    pub schema_version: u32,
    /// How long a fetched provider secret stays valid, in seconds.
    pub secret_cache_ttl_secs: u64,
    /// Upper bound on a single secret backend call, in seconds.
    pub secret_fetch_timeout_secs: u64,
    /// Upper bound on the number of folders walked above a request.
    pub max_inheritance_depth: usize,
}

impl ResolverSettings {
    /// Secret cache TTL as a duration.
    #[must_use]
    pub const fn secret_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.secret_cache_ttl_secs)
    }

    /// Secret fetch timeout as a duration.
    #[must_use]
    pub const fn secret_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.secret_fetch_timeout_secs)
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            schema_version: 1,
            secret_cache_ttl_secs: 300,
            secret_fetch_timeout_secs: 30,
            max_inheritance_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
