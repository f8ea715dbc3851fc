//! Inheritance of auth, headers, variables and base URL along a folder chain.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use super::settings::{CollectionSettings, FolderSettings, RequestSettings};
use crate::auth::AuthConfig;
use crate::environment::Variable;
use crate::request::Headers;

/// Default bound on the number of folders walked above a request.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Ordered folder path from a folder up to its collection root,
/// most specific first. The root is always the last level.
#[derive(Debug, Clone)]
pub struct InheritanceChain<'a> {
    levels: Vec<&'a FolderSettings>,
    truncated: bool,
}

impl<'a> InheritanceChain<'a> {
    /// Levels, most specific first.
    #[must_use]
    pub fn levels(&self) -> &[&'a FolderSettings] {
        &self.levels
    }

    /// True if the walk stopped early on a cycle or the depth bound.
    #[must_use]
    pub const fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Number of levels including the root.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Always false: a chain holds at least the collection root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Settings effective for one request after inheritance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSettings {
    /// Effective authentication; `None` when nothing in the chain sets one.
    pub auth: AuthConfig,
    /// Merged enabled headers.
    pub headers: Headers,
    /// Merged enabled variables, keyed by `Variable::key`.
    pub variables: Vec<Variable>,
    /// Effective base URL.
    pub base_url: Option<String>,
}

/// Walks folder parent chains and reduces them per settings category.
#[derive(Debug, Clone, Copy)]
pub struct InheritanceResolver {
    max_depth: usize,
}

impl InheritanceResolver {
    /// Creates a resolver that walks at most `max_depth` folders.
    #[must_use]
    pub const fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Builds the chain for a request located in `folder_id`
    /// (`None` for a request at the collection root).
    #[must_use]
    pub fn chain<'a>(
        &self,
        collection: &'a CollectionSettings,
        folder_id: Option<&str>,
    ) -> InheritanceChain<'a> {
        let mut levels = Vec::new();
        let mut visited = HashSet::new();
        let mut truncated = false;
        let mut current = folder_id;

        while let Some(id) = current {
            if id == collection.id() {
                break;
            }
            if levels.len() >= self.max_depth {
                warn!(folder_id = id, max_depth = self.max_depth, "folder chain exceeds maximum depth");
                truncated = true;
                break;
            }
            if !visited.insert(id) {
                warn!(folder_id = id, "cycle in folder parent chain");
                truncated = true;
                break;
            }
            let Some(folder) = collection.folder(id) else {
                debug!(folder_id = id, "unknown folder, falling back to collection root");
                break;
            };
            levels.push(folder);
            current = folder.parent_id.as_deref();
        }

        levels.push(&collection.root);
        InheritanceChain { levels, truncated }
    }

    /// Resolves every settings category for a request.
    #[must_use]
    pub fn resolve(
        &self,
        collection: &CollectionSettings,
        folder_id: Option<&str>,
        request: &RequestSettings,
    ) -> ResolvedSettings {
        let chain = self.chain(collection, folder_id);
        ResolvedSettings {
            auth: resolve_auth(&request.auth, &chain),
            headers: resolve_headers(&chain, &request.headers),
            variables: resolve_variables(&chain, &request.variables),
            base_url: resolve_base_url(&chain, request.base_url.as_deref()),
        }
    }
}

impl Default for InheritanceResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

/// An explicit request auth wins outright; otherwise the first non-inherit
/// auth walking outward; otherwise no auth.
#[must_use]
pub fn resolve_auth(request_auth: &AuthConfig, chain: &InheritanceChain<'_>) -> AuthConfig {
    if !request_auth.is_inherit() {
        return request_auth.clone();
    }
    chain
        .levels()
        .iter()
        .map(|level| &level.auth)
        .find(|auth| !auth.is_inherit())
        .cloned()
        .unwrap_or(AuthConfig::None)
}

/// Least specific first, each level overwriting by case-insensitive name.
#[must_use]
pub fn resolve_headers(chain: &InheritanceChain<'_>, request_headers: &Headers) -> Headers {
    let mut merged = Headers::new();
    let levels = chain.levels().iter().rev().map(|level| &level.headers);
    for headers in levels.chain(std::iter::once(request_headers)) {
        merged.overlay(headers);
    }
    merged
}

/// Least specific first, each level overwriting by key.
#[must_use]
pub fn resolve_variables(
    chain: &InheritanceChain<'_>,
    request_variables: &[Variable],
) -> Vec<Variable> {
    let mut merged: Vec<Variable> = Vec::new();
    let levels = chain.levels().iter().rev().map(|level| level.variables.as_slice());
    for variables in levels.chain(std::iter::once(request_variables)) {
        for variable in variables.iter().filter(|v| v.enabled) {
            match merged.iter_mut().find(|v| v.key == variable.key) {
                Some(existing) => *existing = variable.clone(),
                None => merged.push(variable.clone()),
            }
        }
    }
    merged
}

/// First non-empty base URL, starting at the request and walking outward.
#[must_use]
pub fn resolve_base_url(chain: &InheritanceChain<'_>, request_base_url: Option<&str>) -> Option<String> {
    request_base_url
        .into_iter()
        .chain(chain.levels().iter().filter_map(|level| level.base_url.as_deref()))
        .find(|url| !url.trim().is_empty())
        .map(str::to_string)
}
