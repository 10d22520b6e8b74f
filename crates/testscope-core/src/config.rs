//! Impact analysis configuration.
//!
//! Resolution order: built-in defaults, then a JSON file (`testscope.json`
//! in the working directory, or an explicit path), then `TESTSCOPE_*`
//! environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use testscope_transport::RelationshipKind;
use tracing::debug;

use crate::error::{ImpactError, Result};
use crate::normalize::PathNormalizer;
use crate::select::NoImpactPolicy;

/// Config file picked up from the working directory when present.
pub const CONFIG_FILE_NAME: &str = "testscope.json";

/// Impact analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactConfig {
    /// Root that changed files and recorded paths are relative to
    pub project_root: PathBuf,
    /// Extra substrings that exclude a path (added to the built-in ones)
    pub ignore_patterns: Vec<String>,
    /// Skip the run when nothing is impacted (otherwise run the default set)
    pub exit_on_no_impact: bool,
    /// Baseline for `git diff --name-only`
    pub base_ref: String,
    /// Relationship artifact to fetch
    pub kind: RelationshipKind,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        ImpactConfig {
            project_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            ignore_patterns: Vec::new(),
            exit_on_no_impact: true,
            base_ref: "HEAD".to_string(),
            kind: RelationshipKind::default(),
        }
    }
}

impl ImpactConfig {
    /// Load configuration.
    ///
    /// An explicit `path` must exist; the implicit `testscope.json` is
    /// optional. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let implicit = PathBuf::from(CONFIG_FILE_NAME);
                if implicit.is_file() {
                    Self::from_file(&implicit)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Read a JSON config file. A relative `project_root` is resolved
    /// against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ImpactError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config: ImpactConfig = serde_json::from_str(&content)
            .map_err(|e| ImpactError::Config(format!("invalid {}: {e}", path.display())))?;

        if config.project_root.is_relative() {
            let base = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            let base = std::fs::canonicalize(&base).unwrap_or(base);
            config.project_root = base.join(&config.project_root);
        }

        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Apply `TESTSCOPE_*` overrides read through `lookup`.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(root) = lookup("TESTSCOPE_PROJECT_ROOT") {
            let root = PathBuf::from(root);
            self.project_root = if root.is_relative() {
                std::env::current_dir()?.join(root)
            } else {
                root
            };
        }
        if let Some(patterns) = lookup("TESTSCOPE_IGNORE") {
            self.ignore_patterns.extend(
                patterns
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
            );
        }
        if let Some(flag) = lookup("TESTSCOPE_EXIT_ON_NO_IMPACT") {
            self.exit_on_no_impact = parse_flag("TESTSCOPE_EXIT_ON_NO_IMPACT", &flag)?;
        }
        if let Some(base_ref) = lookup("TESTSCOPE_BASE_REF") {
            self.base_ref = base_ref;
        }
        if let Some(kind) = lookup("TESTSCOPE_KIND") {
            self.kind = kind
                .parse()
                .map_err(|e| ImpactError::Config(format!("TESTSCOPE_KIND: {e}")))?;
        }
        Ok(self)
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_base_ref(mut self, base_ref: &str) -> Self {
        self.base_ref = base_ref.to_string();
        self
    }

    pub fn with_kind(mut self, kind: RelationshipKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_exit_on_no_impact(mut self, exit: bool) -> Self {
        self.exit_on_no_impact = exit;
        self
    }

    /// Normalizer for the configured root and ignore patterns.
    pub fn normalizer(&self) -> PathNormalizer {
        PathNormalizer::new(&self.project_root).with_ignore_patterns(&self.ignore_patterns)
    }

    /// What the host should do when nothing is impacted.
    pub fn no_impact_policy(&self) -> NoImpactPolicy {
        if self.exit_on_no_impact {
            NoImpactPolicy::Skip
        } else {
            NoImpactPolicy::RunDefault
        }
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ImpactError::Config(format!(
            "{name}: expected a boolean, got {other:?}"
        ))),
    }
}
