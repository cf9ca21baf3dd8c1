//! # Segment source
//!
//! Fetches the list of network segments that a scan pass should cover.
//! A failure here only abandons the current pass; the caller decides when to
//! try again.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use thiserror::Error;
use tracing::debug;

use ipalloc_common::config::SourceConfig;
use ipalloc_common::network::segment::Segment;
use ipalloc_protocols::xcat::{self, DecodeError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The segment inventory could not be obtained.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("segment source unavailable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("segment source answered {status}")]
    Status { status: reqwest::StatusCode },
    #[error("segment source sent an unusable document: {0}")]
    Decode(#[from] DecodeError),
    #[error("segment source misconfigured: {0}")]
    Config(String),
}

#[async_trait]
pub trait SegmentSource: Send + Sync {
    async fn list_segments(&self) -> Result<Vec<Segment>, SourceError>;
}

/// Reads the `networks` resource of an xCAT REST API.
pub struct XcatSource {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl XcatSource {
    pub fn new(cfg: &SourceConfig) -> Result<Self, SourceError> {
        let url: reqwest::Url = networks_url(&cfg.api_server)?;

        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(&cfg.token)
            .map_err(|_| SourceError::Config("token is not a valid header value".into()))?;
        token.set_sensitive(true);
        headers.insert(xcat::AUTH_HEADER, token);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(cfg.insecure)
            .build()?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl SegmentSource for XcatSource {
    async fn list_segments(&self) -> Result<Vec<Segment>, SourceError> {
        let response = self.client.get(self.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status { status });
        }

        let body = response.bytes().await?;
        let segments = xcat::decode_networks(&body)?;
        debug!(count = segments.len(), url = %self.url, "fetched network segments");
        Ok(segments)
    }
}

/// Accepts a bare host (`xcat.example`) as well as a full base URL.
fn networks_url(api_server: &str) -> Result<reqwest::Url, SourceError> {
    let base: String = if api_server.contains("://") {
        api_server.to_string()
    } else {
        format!("https://{api_server}")
    };
    let base: String = format!("{}/", base.trim_end_matches('/'));

    reqwest::Url::parse(&base)
        .and_then(|url| url.join(xcat::NETWORKS_PATH))
        .map_err(|e| SourceError::Config(format!("bad api server {api_server:?}: {e}")))
}

/// Fixed list of segments, for embedders that already know their networks.
pub struct StaticSource {
    segments: Vec<Segment>,
}

impl StaticSource {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }
}

#[async_trait]
impl SegmentSource for StaticSource {
    async fn list_segments(&self) -> Result<Vec<Segment>, SourceError> {
        Ok(self.segments.clone())
    }
}
