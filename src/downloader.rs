use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, ClientBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::ClonerConfig;
use crate::error::FetchError;
use crate::events::{truncate_url, Event, EventSink};
use crate::file_manager::{AssetMap, AssetRecord, AssetStore};

/// Transport used to retrieve asset bytes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// `reqwest`-backed asset transport.
#[derive(Clone)]
pub struct HttpAssetSource {
    client: Client,
}

impl HttpAssetSource {
    pub fn new(config: &ClonerConfig) -> Result<Self, FetchError> {
        let client = build_http_client(&config.user_agent, config.asset_timeout())?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, FetchError> {
    let client = ClientBuilder::new()
        .use_rustls_tls()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?;

    Ok(client)
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content = response.bytes().await?;
        Ok(content.to_vec())
    }
}

/// Downloads assets into an [`AssetStore`], skipping anything that fails.
///
/// At most `max_concurrent` transport calls run at once across every
/// `fetch_all` on the same fetcher; each job gets its own fetcher.
#[derive(Clone)]
pub struct AssetFetcher {
    source: Arc<dyn AssetSource>,
    timeout: Duration,
    max_concurrent: usize,
    permits: Arc<Semaphore>,
}

impl AssetFetcher {
    pub fn new(source: Arc<dyn AssetSource>, timeout: Duration, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            source,
            timeout,
            max_concurrent,
            permits: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Download every URL, at most `max_concurrent` at a time, and return
    /// the records of those that succeeded.
    pub async fn fetch_all<I>(&self, urls: I, store: &AssetStore, sink: &dyn EventSink) -> AssetMap
    where
        I: IntoIterator<Item = String>,
    {
        stream::iter(urls)
            .map(|url| async move { self.fetch_one(&url, store, sink).await })
            .buffer_unordered(self.max_concurrent)
            .filter_map(|record| async move { record })
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect()
    }

    /// Download a single URL unless it is already stored. Failures are
    /// reported as warnings and yield `None`.
    pub async fn fetch_one(
        &self,
        url: &str,
        store: &AssetStore,
        sink: &dyn EventSink,
    ) -> Option<AssetRecord> {
        store
            .get_or_download(url, || self.download(url, store, sink))
            .await
    }

    async fn download(&self, url: &str, store: &AssetStore, sink: &dyn EventSink) -> Option<AssetRecord> {
        let Ok(_permit) = self.permits.acquire().await else {
            return None;
        };
        debug!("Fetching asset {}", url);

        let content = match tokio::time::timeout(self.timeout, self.source.fetch(url)).await {
            Ok(Ok(content)) => content,
            Ok(Err(FetchError::Status(status))) => {
                sink.emit(Event::warning(format!(
                    "Failed to download ({}): {}",
                    status,
                    truncate_url(url, 80)
                )));
                return None;
            }
            Ok(Err(e)) => {
                sink.emit(Event::warning(format!(
                    "Error downloading asset: {} - {}",
                    e,
                    truncate_url(url, 80)
                )));
                return None;
            }
            Err(_) => {
                sink.emit(Event::warning(format!(
                    "Error downloading asset: {} - {}",
                    FetchError::Timeout(self.timeout),
                    truncate_url(url, 80)
                )));
                return None;
            }
        };

        match store.save(url, &content).await {
            Ok(record) => {
                let filename = record
                    .local_path
                    .rsplit('/')
                    .next()
                    .unwrap_or(&record.local_path);
                sink.emit(Event::pipeline(format!(
                    "Downloaded: {} ({} bytes)",
                    filename,
                    content.len()
                )));
                Some(record)
            }
            Err(e) => {
                sink.emit(Event::warning(format!(
                    "Failed to save asset {}: {}",
                    truncate_url(url, 80),
                    e
                )));
                None
            }
        }
    }
}
