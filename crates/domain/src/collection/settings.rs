//! Per-level settings of a collection tree.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::auth::AuthConfig;
use crate::environment::Variable;
use crate::id::generate_id;
use crate::request::{Header, Headers};

/// Settings defined on a folder, or on the collection root.
///
/// Folders form a singly-linked chain through `parent_id`; a folder without a
/// parent hangs directly off the collection root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSettings {
    /// Unique identifier.
    pub id: String,

    /// Human-readable folder name.
    pub name: String,

    /// Id of the enclosing folder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Authentication applied to requests below this level.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Headers applied to requests below this level.
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,

    /// Variables visible to requests below this level.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,

    /// Base URL prepended to relative request URLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl FolderSettings {
    /// Creates a new folder with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            parent_id: None,
            auth: AuthConfig::Inherit,
            headers: Headers::new(),
            variables: Vec::new(),
            base_url: None,
        }
    }

    /// Replaces the generated id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the enclosing folder.
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Sets the folder-level authentication.
    #[must_use]
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(Header::new(name, value));
        self
    }

    /// Adds a variable.
    #[must_use]
    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// A collection: its root settings plus every folder, keyed by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSettings {
    /// Settings of the collection itself. Its id is the collection id.
    pub root: FolderSettings,

    /// All folders of the collection, at any depth.
    #[serde(default)]
    pub folders: HashMap<String, FolderSettings>,
}

impl CollectionSettings {
    /// Creates a collection with the given root settings.
    #[must_use]
    pub fn new(root: FolderSettings) -> Self {
        Self {
            root,
            folders: HashMap::new(),
        }
    }

    /// Adds a folder, builder style.
    #[must_use]
    pub fn with_folder(mut self, folder: FolderSettings) -> Self {
        self.insert_folder(folder);
        self
    }

    /// Adds or replaces a folder.
    pub fn insert_folder(&mut self, folder: FolderSettings) {
        self.folders.insert(folder.id.clone(), folder);
    }

    /// Returns the collection id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.root.id
    }

    /// Gets a folder by id.
    #[must_use]
    pub fn folder(&self, id: &str) -> Option<&FolderSettings> {
        self.folders.get(id)
    }
}

/// Settings defined on the request itself, the most specific level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSettings {
    /// Request authentication; `Inherit` defers to the folder chain.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Request headers.
    #[serde(default)]
    pub headers: Headers,

    /// Request variables.
    #[serde(default)]
    pub variables: Vec<Variable>,

    /// Request-level base URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_builder() {
        let folder = FolderSettings::new("Users")
            .with_id("f1")
            .with_parent("root")
            .with_header("Accept", "application/json")
            .with_base_url("https://api.example.com");

        assert_eq!(folder.id, "f1");
        assert_eq!(folder.parent_id.as_deref(), Some("root"));
        assert!(folder.auth.is_inherit());
        assert_eq!(folder.headers.get("accept"), Some("application/json"));
    }

    #[test]
    fn test_collection_folder_lookup() {
        let collection = CollectionSettings::new(FolderSettings::new("API").with_id("c1"))
            .with_folder(FolderSettings::new("Users").with_id("f1"));

        assert_eq!(collection.id(), "c1");
        assert!(collection.folder("f1").is_some());
        assert!(collection.folder("missing").is_none());
    }
}
