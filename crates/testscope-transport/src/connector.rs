//! Connector trait and the plumbing shared by every backend.
//!
//! A connector binds its connection options at construction time. Callers
//! only see the two-method contract:
//!
//! - `upload` is best-effort: failures are logged and reported as
//!   [`UploadStatus::Failed`], never propagated.
//! - `download` returns the extracted artifact directory, or `None` when the
//!   artifact could not be obtained for any reason.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::{Response, Url};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::archive::ArchiveCodec;
use crate::endpoint::{EndpointConnector, EndpointOptions};
use crate::error::TransportError;
use crate::kind::RelationshipKind;
use crate::object_store::{ObjectStoreConnector, ObjectStoreOptions};
use crate::Result;

/// Outcome of a best-effort upload. Safe to ignore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    /// Archive accepted by the remote
    Uploaded { bytes: u64 },
    /// Upload failed; the reason has already been logged
    Failed(String),
}

impl UploadStatus {
    pub fn is_uploaded(&self) -> bool {
        matches!(self, UploadStatus::Uploaded { .. })
    }
}

/// Upload/download capability over a relationship artifact.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Compress `source_dir` into `<kind>.tar.gz` and publish it.
    async fn upload(&self, kind: &RelationshipKind, source_dir: &Path) -> UploadStatus;

    /// Fetch `<kind>.tar.gz` and extract it into a fresh temporary directory.
    async fn download(&self, kind: &RelationshipKind) -> Option<PathBuf>;
}

/// Connection options for one of the two backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ConnectorOptions {
    Endpoint(EndpointOptions),
    ObjectStore(ObjectStoreOptions),
}

impl ConnectorOptions {
    /// Build the connector these options describe.
    pub fn into_connector(self) -> Result<Box<dyn Connector>> {
        match self {
            ConnectorOptions::Endpoint(options) => Ok(Box::new(EndpointConnector::new(options)?)),
            ConnectorOptions::ObjectStore(options) => {
                Ok(Box::new(ObjectStoreConnector::new(options)?))
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            ConnectorOptions::Endpoint(_) => "endpoint",
            ConnectorOptions::ObjectStore(_) => "object_store",
        }
    }
}

/// A bare string names an object-storage bucket.
impl From<&str> for ConnectorOptions {
    fn from(bucket: &str) -> Self {
        ConnectorOptions::ObjectStore(ObjectStoreOptions::from_env(bucket))
    }
}

impl From<EndpointOptions> for ConnectorOptions {
    fn from(options: EndpointOptions) -> Self {
        ConnectorOptions::Endpoint(options)
    }
}

impl From<ObjectStoreOptions> for ConnectorOptions {
    fn from(options: ObjectStoreOptions) -> Self {
        ConnectorOptions::ObjectStore(options)
    }
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

/// Fresh per-invocation scratch location under the system temp dir.
pub(crate) fn scratch_path(purpose: &str) -> PathBuf {
    std::env::temp_dir().join(format!("testscope-{purpose}-{}", uuid::Uuid::new_v4()))
}

/// Compress `source_dir` and read the archive back into memory.
pub(crate) async fn pack(
    codec: &dyn ArchiveCodec,
    kind: &RelationshipKind,
    source_dir: &Path,
) -> Result<Vec<u8>> {
    let archive = scratch_path("upload").join(kind.archive_name());
    let archive = codec.compress(source_dir, &archive)?;
    Ok(tokio::fs::read(&archive).await?)
}

/// Reject non-success statuses and redirects that left the requested origin.
pub(crate) fn verify_response(requested: &Url, response: &Response) -> Result<()> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }

    if response.url().origin() != requested.origin() {
        return Err(TransportError::CrossOriginRedirect {
            from: requested.to_string(),
            to: response.url().to_string(),
        });
    }

    Ok(())
}

/// Stream a verified response to a scratch file and extract it.
pub(crate) async fn unpack(
    codec: &dyn ArchiveCodec,
    kind: &RelationshipKind,
    mut response: Response,
) -> Result<PathBuf> {
    let download_dir = scratch_path("download");
    tokio::fs::create_dir_all(&download_dir).await?;
    let archive = download_dir.join(kind.archive_name());

    let mut file = tokio::fs::File::create(&archive).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    debug!(bytes = written, "Artifact written to {:?}", archive);

    let extract_dir = scratch_path("extracted");
    tokio::fs::create_dir_all(&extract_dir).await?;
    codec.extract(&archive, &extract_dir)
}

/// Log and collapse a download result into the connector contract.
pub(crate) fn settle_download(
    backend: &str,
    kind: &RelationshipKind,
    result: Result<PathBuf>,
) -> Option<PathBuf> {
    match result {
        Ok(dir) => {
            info!(backend, kind = %kind, "Artifact extracted to {:?}", dir);
            Some(dir)
        }
        Err(e) => {
            error!(backend, kind = %kind, "Artifact could not be fetched: {e}");
            None
        }
    }
}

/// Log and collapse an upload result into the connector contract.
pub(crate) fn settle_upload(
    backend: &str,
    kind: &RelationshipKind,
    result: Result<u64>,
) -> UploadStatus {
    match result {
        Ok(bytes) => {
            info!(backend, kind = %kind, bytes, "Artifact uploaded");
            UploadStatus::Uploaded { bytes }
        }
        Err(e) => {
            error!(backend, kind = %kind, "Artifact could not be uploaded: {e}");
            UploadStatus::Failed(e.to_string())
        }
    }
}
