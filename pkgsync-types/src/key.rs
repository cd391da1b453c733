//! Artifact keys.
//!
//! A key is the relative path of one package file below a configured root.
//! The same key string identifies the artifact on every tier, so it is the
//! join key between a local and a remote observation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reasons a string is rejected as an [`ArtifactKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("artifact key is empty")]
    Empty,

    #[error("artifact key must be relative: {0}")]
    Absolute(String),

    #[error("artifact key escapes its root: {0}")]
    Traversal(String),

    #[error("artifact key has an empty path segment: {0}")]
    EmptySegment(String),

    /// Hidden names are reserved for in-flight temporary files and never
    /// appear in a filesystem listing.
    #[error("artifact key has a hidden path segment: {0}")]
    Hidden(String),

    #[error("artifact key {key:?} contains forbidden character {ch:?}")]
    InvalidCharacter { key: String, ch: char },
}

/// Relative path of a package file, e.g. `demo-1.0.tar.gz` or
/// `internal/demo-1.0-py3-none-any.whl`.
///
/// Invariants: never empty, `/`-separated, no empty, `.` or `..` segments,
/// no segment starting with `.`, no backslashes or NUL bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// Validates and wraps a key.
    pub fn parse(s: impl Into<String>) -> Result<Self, KeyError> {
        let s = s.into();
        validate(&s)?;
        Ok(Self(s))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the last path segment (the file name).
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Iterates over the `/`-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// True when the key falls under `prefix`. An empty prefix matches
    /// everything.
    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// Builds the key from a root-prefixed object name, e.g.
    /// `packages/demo-1.0.tar.gz` with root `packages`.
    pub fn strip_root(name: &str, root: &str) -> Result<Self, KeyError> {
        let root = root.trim_matches('/');
        let relative = if root.is_empty() {
            name
        } else {
            name.strip_prefix(root)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(name)
        };
        Self::parse(relative)
    }

    /// Joins the key under a root prefix, the inverse of [`Self::strip_root`].
    #[must_use]
    pub fn under_root(&self, root: &str) -> String {
        let root = root.trim_matches('/');
        if root.is_empty() {
            self.0.clone()
        } else {
            format!("{root}/{}", self.0)
        }
    }
}

fn validate(s: &str) -> Result<(), KeyError> {
    if s.is_empty() {
        return Err(KeyError::Empty);
    }
    if s.starts_with('/') {
        return Err(KeyError::Absolute(s.to_string()));
    }
    if let Some(ch) = s.chars().find(|c| *c == '\\' || *c == '\0') {
        return Err(KeyError::InvalidCharacter {
            key: s.to_string(),
            ch,
        });
    }
    for segment in s.split('/') {
        match segment {
            "" => return Err(KeyError::EmptySegment(s.to_string())),
            "." | ".." => return Err(KeyError::Traversal(s.to_string())),
            seg if seg.starts_with('.') => return Err(KeyError::Hidden(s.to_string())),
            _ => {}
        }
    }
    Ok(())
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ArtifactKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ArtifactKey {
    type Error = KeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for ArtifactKey {
    type Error = KeyError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<ArtifactKey> for String {
    fn from(key: ArtifactKey) -> Self {
        key.0
    }
}

impl AsRef<str> for ArtifactKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
