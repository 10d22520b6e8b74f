//! S3-compatible object storage connector
//!
//! The artifact is stored under the object key `[<prefix>/]<kind>.tar.gz`.
//! Requests are signed with AWS Signature Version 4. Without an explicit
//! endpoint the AWS virtual-hosted URL is used; with one (MinIO, R2, ...)
//! path-style addressing is used.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archive::{ArchiveCodec, TarGzCodec};
use crate::connector::{self, Connector, UploadStatus};
use crate::error::TransportError;
use crate::kind::RelationshipKind;
use crate::sigv4;
use crate::Result;

const BACKEND: &str = "object_store";
const DEFAULT_REGION: &str = "us-east-1";

/// Access credentials for the object store
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    #[serde(skip_serializing)]
    pub secret_access_key: String,
    #[serde(default, skip_serializing)]
    pub session_token: Option<String>,
}

impl Credentials {
    /// Read `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`
    pub fn from_env() -> Option<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        Some(Credentials {
            access_key_id,
            secret_access_key,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Object storage connection options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreOptions {
    /// Bucket holding the artifacts
    pub bucket: String,
    /// Signing region
    #[serde(default = "default_region")]
    pub region: String,
    /// S3-compatible server URL; enables path-style addressing
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Key prefix ("folder") inside the bucket
    #[serde(default)]
    pub prefix: Option<String>,
    /// Required for both directions
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl ObjectStoreOptions {
    pub fn new(bucket: &str) -> Self {
        ObjectStoreOptions {
            bucket: bucket.to_string(),
            region: default_region(),
            endpoint: None,
            prefix: None,
            credentials: None,
        }
    }

    /// Options for `bucket` with region, endpoint and credentials taken from
    /// the standard AWS environment variables
    pub fn from_env(bucket: &str) -> Self {
        let region = std::env::var("AWS_REGION")
            .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
            .unwrap_or_else(|_| default_region());
        ObjectStoreOptions {
            bucket: bucket.to_string(),
            region,
            endpoint: std::env::var("AWS_ENDPOINT_URL_S3").ok(),
            prefix: None,
            credentials: Credentials::from_env(),
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub fn with_credentials(mut self, access_key_id: &str, secret_access_key: &str) -> Self {
        self.credentials = Some(Credentials {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: None,
        });
        self
    }

    /// Object key for an artifact kind
    pub fn object_key(&self, kind: &RelationshipKind) -> String {
        match self.prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/{}", kind.archive_name()),
            _ => kind.archive_name(),
        }
    }
}

/// Connector for S3-compatible object storage
pub struct ObjectStoreConnector {
    options: ObjectStoreOptions,
    http_client: reqwest::Client,
    codec: Arc<dyn ArchiveCodec>,
}

impl ObjectStoreConnector {
    /// Create a connector using the `tar` codec
    pub fn new(options: ObjectStoreOptions) -> Result<Self> {
        Self::with_codec(options, Arc::new(TarGzCodec::new()))
    }

    pub fn with_codec(options: ObjectStoreOptions, codec: Arc<dyn ArchiveCodec>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .build()?;

        Ok(ObjectStoreConnector {
            options,
            http_client,
            codec,
        })
    }

    fn credentials(&self) -> Result<&Credentials> {
        if self.options.bucket.trim().is_empty() {
            return Err(TransportError::MissingOption("bucket"));
        }
        self.options
            .credentials
            .as_ref()
            .ok_or(TransportError::MissingOption("credentials"))
    }

    /// Full URL of the object holding `kind`
    pub fn object_url(&self, kind: &RelationshipKind) -> Result<Url> {
        let key = self
            .options
            .object_key(kind)
            .split('/')
            .map(sigv4::uri_encode)
            .collect::<Vec<_>>()
            .join("/");

        let raw = match &self.options.endpoint {
            Some(endpoint) => format!(
                "{}/{}/{key}",
                endpoint.trim_end_matches('/'),
                sigv4::uri_encode(&self.options.bucket)
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{key}",
                self.options.bucket, self.options.region
            ),
        };
        Url::parse(&raw).map_err(|e| TransportError::InvalidUrl(format!("{raw}: {e}")))
    }

    fn signed_request(
        &self,
        method: Method,
        url: &Url,
        credentials: &Credentials,
        payload_sha256: &str,
    ) -> Result<reqwest::RequestBuilder> {
        let headers = sigv4::sign(
            method.as_str(),
            url,
            &self.options.region,
            credentials,
            payload_sha256,
            Utc::now(),
        )?;

        let mut request = self.http_client.request(method, url.clone());
        for (name, value) in headers {
            request = request.header(name, value);
        }
        Ok(request)
    }

    async fn try_upload(&self, kind: &RelationshipKind, source_dir: &Path) -> Result<u64> {
        let credentials = self.credentials()?;
        let url = self.object_url(kind)?;
        let body = connector::pack(self.codec.as_ref(), kind, source_dir).await?;
        let bytes = body.len() as u64;

        debug!(%url, bytes, "Putting artifact object");
        let payload_sha256 = sigv4::sha256_hex(&body);
        let response = self
            .signed_request(Method::PUT, &url, credentials, &payload_sha256)?
            .body(body)
            .send()
            .await?;
        connector::verify_response(&url, &response)?;
        Ok(bytes)
    }

    async fn try_download(&self, kind: &RelationshipKind) -> Result<PathBuf> {
        let credentials = self.credentials()?;
        let url = self.object_url(kind)?;

        debug!(%url, "Getting artifact object");
        let response = self
            .signed_request(Method::GET, &url, credentials, &sigv4::sha256_hex(b""))?
            .send()
            .await?;
        connector::verify_response(&url, &response)?;
        connector::unpack(self.codec.as_ref(), kind, response).await
    }
}

#[async_trait]
impl Connector for ObjectStoreConnector {
    async fn upload(&self, kind: &RelationshipKind, source_dir: &Path) -> UploadStatus {
        connector::settle_upload(BACKEND, kind, self.try_upload(kind, source_dir).await)
    }

    async fn download(&self, kind: &RelationshipKind) -> Option<PathBuf> {
        connector::settle_download(BACKEND, kind, self.try_download(kind).await)
    }
}
