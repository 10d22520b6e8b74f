use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Tag naming one relationship artifact (`<kind>.tar.gz`).
///
/// Restricted to ASCII alphanumerics, `-`, `_` and `.` because the tag is
/// used verbatim as a file name, an object key and a URL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelationshipKind(String);

impl RelationshipKind {
    /// Kind used when none is configured.
    pub const DEFAULT: &'static str = "relationships";

    pub fn new(kind: impl Into<String>) -> Result<Self, TransportError> {
        let kind = kind.into();
        let valid = !kind.is_empty()
            && !kind.starts_with('.')
            && kind
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(Self(kind))
        } else {
            Err(TransportError::InvalidKind(kind))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the compressed artifact.
    pub fn archive_name(&self) -> String {
        format!("{}.tar.gz", self.0)
    }
}

impl Default for RelationshipKind {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RelationshipKind {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RelationshipKind {
    type Error = TransportError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RelationshipKind> for String {
    fn from(kind: RelationshipKind) -> Self {
        kind.0
    }
}
