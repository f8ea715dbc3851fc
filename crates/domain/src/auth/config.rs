//! Authentication configuration types

use serde::{Deserialize, Serialize};

/// Authentication configuration for a request, folder or collection.
///
/// All string values may contain `{{variables}}` for dynamic resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// Use whatever the enclosing folder or collection defines.
    #[default]
    Inherit,
    /// No authentication
    None,
    /// API Key authentication
    ApiKey {
        /// The API key value
        key: String,
        /// Header or query parameter name
        name: String,
        /// Where to add the key
        location: ApiKeyLocation,
    },
    /// Bearer token authentication
    Bearer {
        /// The bearer token (may contain variables like `{{access_token}}`)
        token: String,
        /// Optional prefix, defaults to "Bearer"
        #[serde(default = "default_bearer_prefix")]
        prefix: String,
    },
    /// Basic authentication
    Basic {
        /// Username (may contain variables)
        username: String,
        /// Password (may contain variables)
        password: String,
    },
}

fn default_bearer_prefix() -> String {
    "Bearer".to_string()
}

/// Location for API key authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyLocation {
    /// Add to request headers
    #[default]
    Header,
    /// Add to query parameters
    Query,
}

impl AuthConfig {
    /// Returns true if this config defers to the enclosing level.
    #[must_use]
    pub const fn is_inherit(&self) -> bool {
        matches!(self, Self::Inherit)
    }

    /// Creates a bearer token authentication.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
            prefix: default_bearer_prefix(),
        }
    }

    /// Creates a basic authentication.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}
