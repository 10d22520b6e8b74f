//! Structured lifecycle events for one selection invocation.
//!
//! Every event carries an `event` field so log pipelines can filter on it.

use tracing::{info, warn};

/// RAII guard that enters an invocation-scoped span.
///
/// ```ignore
/// let span = InvocationSpan::enter();
/// // every event below is tagged with span.invocation_id()
/// ```
pub struct InvocationSpan {
    invocation_id: String,
    _span: tracing::span::EnteredSpan,
}

impl InvocationSpan {
    /// Enter a span tagged with a fresh invocation id.
    pub fn enter() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(invocation_id: impl Into<String>) -> Self {
        let invocation_id = invocation_id.into();
        let span = tracing::info_span!("testscope.select", invocation_id = %invocation_id);
        Self {
            invocation_id,
            _span: span.entered(),
        }
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }
}

/// Changed files collected and filtered.
pub fn emit_changes_collected(reported: usize, in_project: usize) {
    info!(
        event = "changes.collected",
        reported = reported,
        in_project = in_project,
    );
}

/// Relationship artifact fetched and loaded.
pub fn emit_artifact_fetched(kind: &str, sources: usize) {
    info!(event = "artifact.fetched", kind = %kind, sources = sources);
}

/// Relationship artifact missing or unreadable; impact will be empty.
pub fn emit_artifact_unavailable(kind: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "artifact.unavailable", kind = %kind, reason = %reason);
}

pub fn emit_impact_resolved(test_files: usize, test_names: usize) {
    info!(
        event = "impact.resolved",
        test_files = test_files,
        test_names = test_names,
    );
}

pub fn emit_pattern_compiled(pattern: &str) {
    info!(event = "pattern.compiled", pattern = %pattern);
}

/// Nothing impacted; the host applies `policy`.
pub fn emit_impact_none(policy: &str) {
    info!(event = "impact.none", policy = %policy);
}
