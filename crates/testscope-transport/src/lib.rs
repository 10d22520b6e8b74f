//! testscope-transport: Relationship Artifact Transport
//!
//! Moves the compressed relationship artifact between the local machine and
//! a remote store. Two interchangeable backends sit behind the [`Connector`]
//! trait:
//!
//! - [`EndpointConnector`]: a generic HTTP endpoint (`GET`/`PUT`/`POST`)
//! - [`ObjectStoreConnector`]: S3-compatible object storage (SigV4 signed)
//!
//! Downloads degrade to `None` on any failure and uploads are best-effort,
//! so a broken artifact pipeline never blocks a test run.

pub mod archive;
pub mod connector;
pub mod endpoint;
mod error;
pub mod fakes;
mod kind;
pub mod object_store;
mod sigv4;

pub use archive::{ArchiveCodec, TarGzCodec};
pub use connector::{Connector, ConnectorOptions, UploadStatus};
pub use endpoint::{EndpointConnector, EndpointOptions, UploadMethod};
pub use error::TransportError;
pub use kind::RelationshipKind;
pub use object_store::{Credentials, ObjectStoreConnector, ObjectStoreOptions};

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// User agent sent with every artifact request
pub const USER_AGENT: &str = concat!("testscope/", env!("CARGO_PKG_VERSION"));
