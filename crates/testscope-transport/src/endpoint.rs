//! Generic HTTP endpoint connector
//!
//! Downloads with `GET {url}/<kind>.tar.gz` and uploads the archive bytes
//! with `PUT` (or `POST`) to `{url}`. Caller-supplied headers, usually
//! authentication, are sent with every request.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::archive::{ArchiveCodec, TarGzCodec};
use crate::connector::{self, Connector, UploadStatus};
use crate::error::TransportError;
use crate::kind::RelationshipKind;
use crate::Result;

const BACKEND: &str = "endpoint";

/// HTTP verb used to publish an artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMethod {
    #[default]
    Put,
    Post,
}

impl UploadMethod {
    fn as_method(self) -> Method {
        match self {
            UploadMethod::Put => Method::PUT,
            UploadMethod::Post => Method::POST,
        }
    }
}

/// Endpoint connection options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointOptions {
    /// Base URL; artifacts live at `{url}/<kind>.tar.gz`
    pub url: Option<String>,
    /// Headers sent with every request. Required for downloads (may be empty).
    pub headers: Option<BTreeMap<String, String>>,
    /// Verb used for uploads
    #[serde(default)]
    pub upload_method: UploadMethod,
}

impl EndpointOptions {
    pub fn new(url: &str) -> Self {
        EndpointOptions {
            url: Some(url.to_string()),
            headers: None,
            upload_method: UploadMethod::default(),
        }
    }

    /// Add a request header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Send no extra headers, but satisfy the download precondition
    pub fn with_empty_headers(mut self) -> Self {
        self.headers.get_or_insert_with(BTreeMap::new);
        self
    }

    pub fn with_upload_method(mut self, method: UploadMethod) -> Self {
        self.upload_method = method;
        self
    }
}

/// Connector for a plain HTTP artifact endpoint
pub struct EndpointConnector {
    options: EndpointOptions,
    http_client: reqwest::Client,
    codec: Arc<dyn ArchiveCodec>,
}

impl EndpointConnector {
    /// Create a connector using the `tar` codec
    pub fn new(options: EndpointOptions) -> Result<Self> {
        Self::with_codec(options, Arc::new(TarGzCodec::new()))
    }

    pub fn with_codec(options: EndpointOptions, codec: Arc<dyn ArchiveCodec>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .build()?;

        Ok(EndpointConnector {
            options,
            http_client,
            codec,
        })
    }

    fn base_url(&self) -> Result<&str> {
        self.options
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(TransportError::MissingOption("url"))
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let mut request = self.http_client.request(method, url);
        if let Some(headers) = &self.options.headers {
            for (name, value) in headers {
                request = request.header(name.as_str(), value.as_str());
            }
        }
        request
    }

    async fn try_upload(&self, kind: &RelationshipKind, source_dir: &Path) -> Result<u64> {
        let url = parse_url(self.base_url()?)?;
        let body = connector::pack(self.codec.as_ref(), kind, source_dir).await?;
        let bytes = body.len() as u64;

        let method = self.options.upload_method.as_method();
        debug!(%method, %url, bytes, "Uploading artifact");
        let response = self.request(method, url.clone()).body(body).send().await?;
        connector::verify_response(&url, &response)?;
        Ok(bytes)
    }

    async fn try_download(&self, kind: &RelationshipKind) -> Result<PathBuf> {
        let base = self.base_url()?;
        if self.options.headers.is_none() {
            return Err(TransportError::MissingOption("headers"));
        }

        let url = parse_url(&format!(
            "{}/{}",
            base.trim_end_matches('/'),
            kind.archive_name()
        ))?;
        debug!(%url, "Downloading artifact");
        let response = self.request(Method::GET, url.clone()).send().await?;
        connector::verify_response(&url, &response)?;
        connector::unpack(self.codec.as_ref(), kind, response).await
    }
}

#[async_trait]
impl Connector for EndpointConnector {
    async fn upload(&self, kind: &RelationshipKind, source_dir: &Path) -> UploadStatus {
        connector::settle_upload(BACKEND, kind, self.try_upload(kind, source_dir).await)
    }

    async fn download(&self, kind: &RelationshipKind) -> Option<PathBuf> {
        connector::settle_download(BACKEND, kind, self.try_download(kind).await)
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| TransportError::InvalidUrl(format!("{raw}: {e}")))
}
