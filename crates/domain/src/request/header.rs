//! Headers carried by collections, folders and requests.
//!
//! Names compare case-insensitively. Values are templates and are only
//! interpolated once the inheritance chain has been reduced.

use serde::{Deserialize, Serialize};

/// One header entry. Disabled entries are stored but never inherited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name as written by the user.
    pub name: String,
    /// Template value, e.g. `Bearer {{token}}`.
    pub value: String,
    /// Off entries are skipped when levels are merged.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

const fn enabled_by_default() -> bool {
    true
}

impl Header {
    /// Creates an enabled header.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            enabled: true,
        }
    }

    /// Creates a header that is kept but switched off.
    #[must_use]
    pub fn disabled(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            enabled: false,
            ..Self::new(name, value)
        }
    }

    fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Headers of one level, in insertion order.
///
/// Serialized as a plain JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(Vec<Header>);

impl Headers {
    /// No headers.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a header, even if one with the same name exists.
    pub fn add(&mut self, header: Header) {
        self.0.push(header);
    }

    /// Replaces the first header with the same name in place, or appends.
    pub fn set(&mut self, header: Header) {
        match self.0.iter_mut().find(|h| h.is_named(&header.name)) {
            Some(slot) => *slot = header,
            None => self.0.push(header),
        }
    }

    /// Applies the enabled headers of a more specific level on top of these.
    pub fn overlay(&mut self, level: &Self) {
        for header in level.enabled() {
            self.set(header.clone());
        }
    }

    /// Value of the first header with this name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|h| h.is_named(name)).map(|h| h.value.as_str())
    }

    /// Enabled headers in order.
    pub fn enabled(&self) -> impl Iterator<Item = &Header> {
        self.0.iter().filter(|h| h.enabled)
    }

    /// Every header in order.
    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    /// Number of entries, disabled ones included.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no entries.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Header> for Headers {
    fn from_iter<T: IntoIterator<Item = Header>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
