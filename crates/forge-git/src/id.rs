//! Canonical repository identifier

use std::fmt;

use serde::{Serialize, Serializer};

/// A repository on the hosting backend, addressed as `owner/repo`.
///
/// Both segments are non-empty and contain neither `/` nor whitespace, since
/// neither can appear in an owner or repository name on Gitea or Forgejo.
/// Case is kept exactly as supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryId {
    owner: String,
    name: String,
}

impl RepositoryId {
    /// Build an identifier from its two segments.
    ///
    /// Returns `None` if either segment is empty or contains a slash or
    /// whitespace.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Option<Self> {
        let owner = owner.into();
        let name = name.into();
        if is_valid_segment(&owner) && is_valid_segment(&name) {
            Some(Self { owner, name })
        } else {
            None
        }
    }

    /// Parse an explicit `owner/repo` string.
    ///
    /// Exactly one slash is allowed. Surrounding whitespace is ignored, but
    /// nothing else is normalized.
    pub fn from_name(value: &str) -> Option<Self> {
        let (owner, name) = value.trim().split_once('/')?;
        Self::new(owner, name)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains('/') && !segment.chars().any(char::is_whitespace)
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl Serialize for RepositoryId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
