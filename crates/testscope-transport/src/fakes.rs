//! In-memory fakes for the connector trait (testing only)
//!
//! `StaticConnector` hands out a preset artifact directory (or nothing) and
//! records every call, so callers can assert on how the transport was used.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::connector::{Connector, UploadStatus};
use crate::kind::RelationshipKind;

/// Connector that serves a fixed directory instead of talking to a remote.
#[derive(Debug, Default)]
pub struct StaticConnector {
    artifact_dir: Option<PathBuf>,
    downloads: AtomicUsize,
    uploads: Mutex<Vec<(RelationshipKind, PathBuf)>>,
}

impl StaticConnector {
    /// Downloads return `dir`.
    pub fn serving(dir: impl Into<PathBuf>) -> Self {
        StaticConnector {
            artifact_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Downloads return `None`, as if the remote were unreachable.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Number of `download` calls so far.
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Every `upload` call so far.
    pub fn uploads(&self) -> Vec<(RelationshipKind, PathBuf)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for StaticConnector {
    async fn upload(&self, kind: &RelationshipKind, source_dir: &Path) -> UploadStatus {
        self.uploads
            .lock()
            .unwrap()
            .push((kind.clone(), source_dir.to_path_buf()));
        UploadStatus::Uploaded { bytes: 0 }
    }

    async fn download(&self, _kind: &RelationshipKind) -> Option<PathBuf> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.artifact_dir.clone()
    }
}
