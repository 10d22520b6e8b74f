//! Relationship engine: changed files in, impacted tests out.
//!
//! The engine is a two-state machine. `init*` moves it from
//! `Uninitialized` to `Ready` and never fails; a missing or unreadable
//! artifact leaves an empty graph. Querying before `init` is a sequencing
//! bug and is reported as [`ImpactError::NotInitialized`].

use std::collections::BTreeSet;
use std::path::Path;

use testscope_transport::{Connector, ConnectorOptions, RelationshipKind};
use tracing::{debug, info};

use crate::error::{ImpactError, Result};
use crate::graph::{ImpactResult, RelationshipGraph};
use crate::normalize::{CanonicalPath, PathNormalizer};
use crate::obs;

#[derive(Debug, Default)]
enum EngineState {
    #[default]
    Uninitialized,
    Ready {
        changed: BTreeSet<CanonicalPath>,
        graph: RelationshipGraph,
    },
}

/// Maps changed source files to the tests that depend on them.
#[derive(Debug)]
pub struct RelationshipManager {
    normalizer: PathNormalizer,
    kind: RelationshipKind,
    state: EngineState,
}

impl RelationshipManager {
    pub fn new(normalizer: PathNormalizer, kind: RelationshipKind) -> Self {
        RelationshipManager {
            normalizer,
            kind,
            state: EngineState::Uninitialized,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, EngineState::Ready { .. })
    }

    /// Canonical changed files, once initialized.
    pub fn changed_files(&self) -> Option<&BTreeSet<CanonicalPath>> {
        match &self.state {
            EngineState::Ready { changed, .. } => Some(changed),
            EngineState::Uninitialized => None,
        }
    }

    /// Initialize against the backend described by `options`.
    pub async fn init<S: AsRef<str>>(&mut self, changed_files: &[S], options: &ConnectorOptions) {
        let changed = self.prepare(changed_files);
        if changed.is_empty() {
            self.ready_without_artifact(changed);
            return;
        }

        match options.clone().into_connector() {
            Ok(connector) => self.load_from(changed, connector.as_ref()).await,
            Err(e) => {
                obs::emit_artifact_unavailable(self.kind.as_str(), &e);
                self.state = EngineState::Ready {
                    changed,
                    graph: RelationshipGraph::new(),
                };
            }
        }
    }

    /// Initialize with an explicit connector.
    pub async fn init_with_connector<S: AsRef<str>>(
        &mut self,
        changed_files: &[S],
        connector: &dyn Connector,
    ) {
        let changed = self.prepare(changed_files);
        if changed.is_empty() {
            self.ready_without_artifact(changed);
            return;
        }
        self.load_from(changed, connector).await;
    }

    /// Initialize from a graph that is already in memory.
    pub fn init_with_graph<S: AsRef<str>>(&mut self, changed_files: &[S], graph: RelationshipGraph) {
        let changed = self.prepare(changed_files);
        info!(sources = graph.len(), "Relationship graph supplied directly");
        self.state = EngineState::Ready { changed, graph };
    }

    /// Initialize from an artifact directory on local disk.
    pub fn init_from_dir<S: AsRef<str>>(&mut self, changed_files: &[S], dir: &Path) {
        let changed = self.prepare(changed_files);
        let graph = self.load_graph(dir);
        self.state = EngineState::Ready { changed, graph };
    }

    /// Tests impacted by the changed files given at init.
    pub fn extract_relationships(&self) -> Result<ImpactResult> {
        match &self.state {
            EngineState::Uninitialized => Err(ImpactError::NotInitialized),
            EngineState::Ready { changed, graph } => {
                let impact = graph.impacted_by(changed);
                obs::emit_impact_resolved(
                    impact.impacted_test_files.len(),
                    impact.impacted_test_names.len(),
                );
                Ok(impact)
            }
        }
    }

    fn prepare<S: AsRef<str>>(&self, changed_files: &[S]) -> BTreeSet<CanonicalPath> {
        let changed = self.normalizer.prepare(changed_files);
        obs::emit_changes_collected(changed_files.len(), changed.len());
        changed
    }

    fn ready_without_artifact(&mut self, changed: BTreeSet<CanonicalPath>) {
        debug!("No changed files in project; artifact not fetched");
        self.state = EngineState::Ready {
            changed,
            graph: RelationshipGraph::new(),
        };
    }

    async fn load_from(&mut self, changed: BTreeSet<CanonicalPath>, connector: &dyn Connector) {
        let graph = match connector.download(&self.kind).await {
            Some(dir) => self.load_graph(&dir),
            None => {
                obs::emit_artifact_unavailable(self.kind.as_str(), &"download failed");
                RelationshipGraph::new()
            }
        };
        self.state = EngineState::Ready { changed, graph };
    }

    fn load_graph(&self, dir: &Path) -> RelationshipGraph {
        match RelationshipGraph::load_dir(dir, &self.normalizer) {
            Ok(graph) => {
                obs::emit_artifact_fetched(self.kind.as_str(), graph.len());
                graph
            }
            Err(e) => {
                obs::emit_artifact_unavailable(self.kind.as_str(), &e);
                RelationshipGraph::new()
            }
        }
    }
}
