//! End-to-end selection: changed files → impact → title pattern.
//!
//! These are the entry points a test runner integration calls. When nothing
//! is impacted the caller gets a [`NoImpactPolicy`] back and decides what to
//! do with the process; nothing here exits.

use std::fmt;

use serde::Serialize;
use testscope_transport::{Connector, ConnectorOptions};

use crate::config::ImpactConfig;
use crate::engine::RelationshipManager;
use crate::error::Result;
use crate::graph::ImpactResult;
use crate::obs;
use crate::pattern::TitlePattern;

/// What the host should do when no test is impacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoImpactPolicy {
    /// Run nothing
    Skip,
    /// Fall back to the runner's default test set
    RunDefault,
}

impl NoImpactPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoImpactPolicy::Skip => "skip",
            NoImpactPolicy::RunDefault => "run_default",
        }
    }
}

impl fmt::Display for NoImpactPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a selection.
#[derive(Debug, Clone)]
pub enum Selection {
    /// Run the tests whose identifiers match `pattern`
    Tests {
        pattern: TitlePattern,
        impact: ImpactResult,
    },
    /// Nothing impacted
    NoImpact { policy: NoImpactPolicy },
}

impl Selection {
    pub fn pattern(&self) -> Option<&TitlePattern> {
        match self {
            Selection::Tests { pattern, .. } => Some(pattern),
            Selection::NoImpact { .. } => None,
        }
    }
}

/// Tests impacted by `changed_files`, fetching the artifact through `options`.
pub async fn find_related_tests<S: AsRef<str>>(
    changed_files: &[S],
    options: &ConnectorOptions,
    config: &ImpactConfig,
) -> Result<ImpactResult> {
    let mut engine = RelationshipManager::new(config.normalizer(), config.kind.clone());
    engine.init(changed_files, options).await;
    engine.extract_relationships()
}

/// Like [`find_related_tests`] with an explicit connector.
pub async fn find_related_tests_with<S: AsRef<str>>(
    changed_files: &[S],
    connector: &dyn Connector,
    config: &ImpactConfig,
) -> Result<ImpactResult> {
    let mut engine = RelationshipManager::new(config.normalizer(), config.kind.clone());
    engine.init_with_connector(changed_files, connector).await;
    engine.extract_relationships()
}

/// Title filter for the impacted tests, `None` when nothing is impacted.
pub async fn impacted_tests_pattern<S: AsRef<str>>(
    changed_files: &[S],
    options: &ConnectorOptions,
    config: &ImpactConfig,
) -> Result<Option<TitlePattern>> {
    let impact = find_related_tests(changed_files, options, config).await?;
    TitlePattern::compile(&impact.impacted_test_names)
}

/// Full selection including the no-impact policy.
pub async fn select_tests<S: AsRef<str>>(
    changed_files: &[S],
    options: &ConnectorOptions,
    config: &ImpactConfig,
) -> Result<Selection> {
    let impact = find_related_tests(changed_files, options, config).await?;
    selection_from(impact, config)
}

/// Like [`select_tests`] with an explicit connector.
pub async fn select_tests_with<S: AsRef<str>>(
    changed_files: &[S],
    connector: &dyn Connector,
    config: &ImpactConfig,
) -> Result<Selection> {
    let impact = find_related_tests_with(changed_files, connector, config).await?;
    selection_from(impact, config)
}

/// Turn a resolved impact into a selection.
pub fn selection_from(impact: ImpactResult, config: &ImpactConfig) -> Result<Selection> {
    match TitlePattern::compile(&impact.impacted_test_names)? {
        Some(pattern) => {
            obs::emit_pattern_compiled(pattern.as_str());
            Ok(Selection::Tests { pattern, impact })
        }
        None => {
            let policy = config.no_impact_policy();
            obs::emit_impact_none(policy.as_str());
            Ok(Selection::NoImpact { policy })
        }
    }
}
