//! In-memory source-file → tests graph built from an extracted artifact.
//!
//! ## Artifact layout
//!
//! The extracted directory holds any number of `*.json` files, possibly in
//! subdirectories. Each maps a source path to the tests that loaded it:
//!
//! ```json
//! { "src/a.ts": [ { "title": "renders", "file": "tests/a.test.ts" } ] }
//! ```
//!
//! Files are merged by union. Paths are canonicalized on load, so the
//! recorder may emit absolute or relative module paths.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ImpactError, Result};
use crate::normalize::{CanonicalPath, PathNormalizer};

/// File name used by [`RelationshipGraph::write_to_dir`].
pub const GRAPH_FILE_NAME: &str = "relationships.json";

/// One recorded test.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TestRef {
    /// Title, possibly hierarchical ("suite > nested > title")
    pub title: String,
    /// Test file containing it
    pub file: CanonicalPath,
}

impl TestRef {
    pub fn new(title: impl Into<String>, file: CanonicalPath) -> Self {
        TestRef {
            title: title.into(),
            file,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordedTest {
    title: String,
    file: String,
}

type RecordedRelationships = BTreeMap<String, Vec<RecordedTest>>;

/// Tests impacted by a set of changed files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImpactResult {
    pub impacted_test_files: BTreeSet<CanonicalPath>,
    pub impacted_test_names: BTreeSet<String>,
}

impl ImpactResult {
    pub fn is_empty(&self) -> bool {
        self.impacted_test_files.is_empty() && self.impacted_test_names.is_empty()
    }
}

/// Source file → tests mapping. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipGraph {
    edges: BTreeMap<CanonicalPath, BTreeSet<TestRef>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `test` depends on `source`.
    pub fn insert(&mut self, source: CanonicalPath, test: TestRef) {
        self.edges.entry(source).or_default().insert(test);
    }

    /// Tests recorded for one source file.
    pub fn tests_for(&self, source: &str) -> Option<&BTreeSet<TestRef>> {
        self.edges.get(source)
    }

    /// Number of source files with recorded tests.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Union of the tests recorded for every path in `changed`.
    pub fn impacted_by<'a, I>(&self, changed: I) -> ImpactResult
    where
        I: IntoIterator<Item = &'a CanonicalPath>,
    {
        let mut result = ImpactResult::default();
        for path in changed {
            if let Some(tests) = self.edges.get(path) {
                for test in tests {
                    result.impacted_test_files.insert(test.file.clone());
                    result.impacted_test_names.insert(test.title.clone());
                }
            }
        }
        result
    }

    /// Parse one relationship document.
    pub fn merge_json(&mut self, json: &str, normalizer: &PathNormalizer) -> Result<()> {
        let recorded: RecordedRelationships = serde_json::from_str(json)?;
        for (source, tests) in recorded {
            let source = normalizer.to_canonical(&source);
            if source.is_empty() {
                continue;
            }
            for test in tests {
                let file = normalizer.to_canonical(&test.file);
                self.insert(source.clone(), TestRef::new(test.title, file));
            }
        }
        Ok(())
    }

    /// Load every `*.json` file under `dir`.
    ///
    /// Any unreadable file fails the whole load; a partially loaded graph
    /// would silently drop impacted tests.
    pub fn load_dir(dir: &Path, normalizer: &PathNormalizer) -> Result<Self> {
        let files = json_files(dir)?;
        if files.is_empty() {
            warn!("No relationship files found in {:?}", dir);
        }

        let mut graph = RelationshipGraph::new();
        for file in files {
            let content = std::fs::read_to_string(&file)?;
            graph
                .merge_json(&content, normalizer)
                .map_err(|e| ImpactError::Artifact {
                    path: file.clone(),
                    reason: e.to_string(),
                })?;
            debug!("Loaded relationships from {:?}", file);
        }
        Ok(graph)
    }

    /// Write the graph as a single relationship document inside `dir`.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let document: BTreeMap<&str, Vec<&TestRef>> = self
            .edges
            .iter()
            .map(|(source, tests)| (source.as_str(), tests.iter().collect()))
            .collect();

        let path = dir.join(GRAPH_FILE_NAME);
        std::fs::write(&path, serde_json::to_string_pretty(&document)?)?;
        Ok(path)
    }
}

/// Recursively collect `*.json` files, sorted for a stable load order.
/// Symlinks are skipped so an extracted archive cannot point outside itself.
fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_symlink() {
            debug!("Skipping symlink {:?}", path);
        } else if file_type.is_dir() {
            files.extend(json_files(&path)?);
        } else if file_type.is_file() && path.extension().is_some_and(|e| e == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
