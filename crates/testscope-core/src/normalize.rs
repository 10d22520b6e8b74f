//! Path canonicalization for changed files and recorded module requests.
//!
//! Changed files arrive in whatever shape the reporter emits them: relative
//! to the repository, relative to some nested working directory, absolute,
//! or with a bundler query suffix. The relationship graph is keyed by
//! repository-relative paths, so every input goes through [`PathNormalizer`]
//! before it is used as a join key.

use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::Serialize;

/// Substrings that always mark a path as runtime noise (hot-reload
/// machinery, third-party modules).
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &["webpack", "node_modules"];

/// Repository-relative, `/`-separated path without query suffix.
///
/// Only [`PathNormalizer::to_canonical`] creates these.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CanonicalPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Filters and canonicalizes raw paths against one project root.
#[derive(Debug, Clone)]
pub struct PathNormalizer {
    root_segments: Vec<String>,
    ignore_patterns: Vec<String>,
}

impl PathNormalizer {
    /// Normalizer for `project_root` with the default ignore patterns.
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        let root = unify(&project_root.as_ref().to_string_lossy());
        let root_segments = resolve_lexically(&root)
            .into_iter()
            .map(str::to_string)
            .collect();

        PathNormalizer {
            root_segments,
            ignore_patterns: Vec::new(),
        }
        .with_ignore_patterns(DEFAULT_IGNORE_PATTERNS.iter().copied())
    }

    /// Append ignore patterns. Empty and duplicate patterns are skipped.
    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if !pattern.is_empty() && !self.ignore_patterns.iter().any(|p| p == pattern) {
                self.ignore_patterns.push(pattern.to_string());
            }
        }
        self
    }

    pub fn ignore_patterns(&self) -> &[String] {
        &self.ignore_patterns
    }

    /// Project root as an absolute `/`-separated string.
    pub fn project_root(&self) -> String {
        format!("/{}", self.root_segments.join("/"))
    }

    /// Whether `path` belongs to the tracked project tree.
    ///
    /// False when it contains an ignore pattern, or when `.`/`..` resolution
    /// lands outside the root. Relative paths resolve against the root;
    /// absolute paths must lie under it.
    pub fn is_in_project(&self, path: &str) -> bool {
        if self.ignore_patterns.iter().any(|p| path.contains(p.as_str())) {
            return false;
        }

        let unified = unify(strip_query(path));
        if unified.starts_with('/') {
            match resolve_strictly(&unified) {
                Some(segments) => {
                    segments.len() >= self.root_segments.len()
                        && segments
                            .iter()
                            .zip(&self.root_segments)
                            .all(|(a, b)| *a == b.as_str())
                }
                None => false,
            }
        } else {
            resolve_strictly(&unified).is_some()
        }
    }

    /// Canonical repository-relative form of `path`. Idempotent.
    pub fn to_canonical(&self, path: &str) -> CanonicalPath {
        let unified = unify(strip_query(path));
        let mut segments = resolve_lexically(&unified);

        if unified.starts_with('/') && self.has_root_prefix(&segments) {
            segments.drain(..self.root_segments.len());
        }

        CanonicalPath(segments.join("/"))
    }

    /// Filter with [`is_in_project`](Self::is_in_project), canonicalize the
    /// survivors and drop duplicates and empty results.
    pub fn prepare<I, S>(&self, paths: I) -> BTreeSet<CanonicalPath>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        paths
            .into_iter()
            .filter(|p| !p.as_ref().trim().is_empty())
            .filter(|p| self.is_in_project(p.as_ref()))
            .map(|p| self.to_canonical(p.as_ref()))
            .filter(|c| !c.is_empty())
            .collect()
    }

    fn has_root_prefix(&self, segments: &[&str]) -> bool {
        !self.root_segments.is_empty()
            && segments.len() > self.root_segments.len()
            && segments
                .iter()
                .zip(&self.root_segments)
                .all(|(a, b)| *a == b.as_str())
    }
}

fn strip_query(path: &str) -> &str {
    path.split('?').next().unwrap_or_default()
}

fn unify(path: &str) -> String {
    path.replace('\\', "/")
}

/// Resolve `.`/`..` segments; a `..` with nothing left to pop is dropped.
fn resolve_lexically(path: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Like [`resolve_lexically`] but `None` as soon as `..` climbs above the start.
fn resolve_strictly(path: &str) -> Option<Vec<&str>> {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop()?;
            }
            other => out.push(other),
        }
    }
    Some(out)
}
