//! Page snapshot providers.
//!
//! A provider turns a URL into the final HTML and the URL the page ended up
//! at. Browser-driven providers can plug in behind [`SnapshotProvider`]; the
//! bundled [`HttpSnapshotProvider`] fetches the document over HTTP without
//! running scripts.

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::config::ClonerConfig;
use crate::downloader::build_http_client;
use crate::error::{FetchError, RenderError};

/// Result of rendering a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub final_html: String,
    pub final_url: String,
    /// Network activity observed while rendering, one line per request/response
    pub network_log: Vec<String>,
}

impl Snapshot {
    pub fn new(final_html: impl Into<String>, final_url: impl Into<String>) -> Self {
        Self {
            final_html: final_html.into(),
            final_url: final_url.into(),
            network_log: Vec::new(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn snapshot(&self, url: &Url) -> Result<Snapshot, RenderError>;
}

/// Fetches the page HTML directly, following redirects.
#[derive(Clone)]
pub struct HttpSnapshotProvider {
    client: Client,
}

impl HttpSnapshotProvider {
    pub fn new(config: &ClonerConfig) -> Result<Self, FetchError> {
        let client = build_http_client(&config.user_agent, config.render_timeout())?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SnapshotProvider for HttpSnapshotProvider {
    async fn snapshot(&self, url: &Url) -> Result<Snapshot, RenderError> {
        let mut network_log = vec![format!(">> GET document {}", url)];

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        let status = response.status();
        let final_url = response.url().to_string();
        network_log.push(format!("<< {} {}", status.as_u16(), final_url));

        if !status.is_success() {
            return Err(RenderError::Status(status.as_u16()));
        }

        let final_html = response
            .text()
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        Ok(Snapshot {
            final_html,
            final_url,
            network_log,
        })
    }
}
