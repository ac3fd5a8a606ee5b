use crate::domain::SemanticVersion;
use std::fmt;

/// Represents a release tag (`v` + version)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
}

impl Tag {
    /// Create a new tag from a string
    pub fn new(name: impl Into<String>) -> Self {
        Tag { name: name.into() }
    }

    /// The release tag for a version (e.g., 0.1.3 -> "v0.1.3")
    pub fn for_version(version: &SemanticVersion) -> Self {
        Tag::new(format!("v{}", version))
    }

    /// Fully qualified reference name
    pub fn refname(&self) -> String {
        format!("refs/tags/{}", self.name)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
