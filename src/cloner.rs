use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::ClonerConfig;
use crate::css_expander::CssExpander;
use crate::downloader::{AssetFetcher, AssetSource, HttpAssetSource};
use crate::error::{CloneError, FetchError, RenderError};
use crate::events::{CloneResult, Event, EventSink};
use crate::file_manager::{claim_folder, AssetStore};
use crate::html_parser::HtmlParser;
use crate::renderer::{HttpSnapshotProvider, SnapshotProvider};
use crate::rewriter::rewrite_html;
use crate::url_resolver::{normalize, output_folder_name};

/// Runs the clone pipeline for one URL at a time; shared between jobs.
pub struct WebsiteCloner {
    output_dir: PathBuf,
    render_timeout: Duration,
    asset_timeout: Duration,
    max_concurrent: usize,
    renderer: Arc<dyn SnapshotProvider>,
    source: Arc<dyn AssetSource>,
}

impl WebsiteCloner {
    pub fn new(
        config: &ClonerConfig,
        renderer: Arc<dyn SnapshotProvider>,
        source: Arc<dyn AssetSource>,
    ) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            render_timeout: config.render_timeout(),
            asset_timeout: config.asset_timeout(),
            max_concurrent: config.max_concurrent,
            renderer,
            source,
        }
    }

    /// Cloner wired to the bundled HTTP snapshot provider and asset source.
    pub fn with_http(config: &ClonerConfig) -> Result<Self, FetchError> {
        let renderer = Arc::new(HttpSnapshotProvider::new(config)?);
        let source = Arc::new(HttpAssetSource::new(config)?);
        Ok(Self::new(config, renderer, source))
    }

    /// Clone `input`, reporting progress to `sink`. Never panics on bad
    /// input or fatal errors; those come back as a failed result.
    pub async fn clone_url(&self, input: &str, sink: &dyn EventSink) -> CloneResult {
        let url = match normalize(input) {
            Ok(url) => url,
            Err(e) => {
                emit(sink, Event::error(e.to_string()));
                return CloneResult::failed(e.to_string());
            }
        };

        match self.run(&url, sink).await {
            Ok(result) => result,
            Err(e) => {
                emit(sink, Event::error(format!("Clone failed: {}", e)));
                CloneResult::failed(e.to_string())
            }
        }
    }

    async fn run(&self, url: &Url, sink: &dyn EventSink) -> Result<CloneResult, CloneError> {
        emit(sink, Event::pipeline(format!("Starting clone of: {}", url)));

        let (folder_name, output_path) =
            claim_folder(&self.output_dir, &output_folder_name(url, Utc::now())).await?;
        let store = AssetStore::new(&output_path).await?;
        // Download limit is per job
        let fetcher = AssetFetcher::new(
            Arc::clone(&self.source),
            self.asset_timeout,
            self.max_concurrent,
        );

        emit(sink, Event::pipeline("Rendering page..."));
        let snapshot = tokio::time::timeout(self.render_timeout, self.renderer.snapshot(url))
            .await
            .map_err(|_| RenderError::Timeout(self.render_timeout))??;
        for line in &snapshot.network_log {
            emit(sink, Event::network(line.clone()));
        }

        // Redirects move the base that relative references resolve against
        let final_url = Url::parse(&snapshot.final_url).unwrap_or_else(|_| url.clone());

        emit(sink, Event::pipeline("Parsing HTML and collecting assets..."));
        let assets = HtmlParser::new(final_url.clone()).extract_assets(&snapshot.final_html);
        emit(sink, Event::pipeline(format!("Found {} assets to download", assets.len())));

        emit(sink, Event::pipeline("Downloading assets..."));
        let downloaded = fetcher.fetch_all(assets, &store, &Logged(sink)).await;
        emit(
            sink,
            Event::pipeline(format!("Downloaded {} assets", downloaded.len())),
        );

        emit(sink, Event::pipeline("Processing CSS files for font references..."));
        CssExpander::new(&fetcher, &store)
            .expand_all(&Logged(sink))
            .await;

        emit(sink, Event::pipeline("Rewriting HTML references..."));
        let rewritten = rewrite_html(&snapshot.final_html, &final_url, &store.asset_map());

        emit(sink, Event::pipeline("Saving output..."));
        let index_path = output_path.join("index.html");
        tokio::fs::write(&index_path, rewritten)
            .await
            .map_err(|e| CloneError::write(&index_path, e))?;

        let open_url = format!("/clone/{}/index.html", folder_name);
        let output_path = output_path.to_string_lossy().into_owned();
        emit(sink, Event::pipeline(format!("Clone complete! Output: {}", output_path)));
        emit(sink, Event::pipeline(format!("Open URL: {}", open_url)));

        Ok(CloneResult::succeeded(output_path, open_url, folder_name))
    }
}

fn emit(sink: &dyn EventSink, event: Event) {
    event.log();
    sink.emit(event);
}

/// Wraps a sink so events raised inside pipeline stages are logged too.
struct Logged<'a>(&'a dyn EventSink);

impl EventSink for Logged<'_> {
    fn emit(&self, event: Event) {
        emit(self.0, event);
    }
}
