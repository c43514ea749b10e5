use futures::stream::{self, StreamExt};
use regex::Captures;
use std::path::Path;
use url::Url;

use crate::downloader::AssetFetcher;
use crate::events::{Event, EventSink};
use crate::file_manager::{AssetRecord, AssetStore};
use crate::html_parser::{HtmlParser, CSS_URL_PATTERN};
use crate::url_resolver::{is_data_uri, resolve, AssetCategory};

/// Pulls in fonts and images referenced from downloaded stylesheets and
/// points the stylesheets at the local copies.
///
/// Only stylesheets already in the store when [`CssExpander::expand_all`]
/// starts are processed; stylesheets fetched along the way are stored but
/// not expanded themselves.
pub struct CssExpander<'a> {
    fetcher: &'a AssetFetcher,
    store: &'a AssetStore,
}

impl<'a> CssExpander<'a> {
    pub fn new(fetcher: &'a AssetFetcher, store: &'a AssetStore) -> Self {
        Self { fetcher, store }
    }

    /// Expand every stored stylesheet. Returns the number of stylesheets
    /// that were rewritten.
    pub async fn expand_all(&self, sink: &dyn EventSink) -> usize {
        let stylesheets: Vec<AssetRecord> = self
            .store
            .asset_map()
            .iter()
            .filter(|record| record.category == AssetCategory::Css)
            .cloned()
            .collect();

        let results = stream::iter(stylesheets)
            .map(|stylesheet| async move {
                let outcome = self.expand_stylesheet(&stylesheet, sink).await;
                (stylesheet, outcome)
            })
            .buffer_unordered(self.fetcher.max_concurrent())
            .collect::<Vec<_>>()
            .await;

        let mut rewritten = 0;
        for (stylesheet, outcome) in results {
            match outcome {
                Ok(0) => {}
                Ok(count) => {
                    rewritten += 1;
                    sink.emit(Event::pipeline(format!(
                        "Rewrote {} references in {}",
                        count, stylesheet.local_path
                    )));
                }
                Err(e) => {
                    sink.emit(Event::warning(format!(
                        "Error processing CSS file {}: {}",
                        stylesheet.local_path, e
                    )));
                }
            }
        }
        rewritten
    }

    /// Fetch the stylesheet's `url(...)` references and rewrite them in
    /// place. Returns the number of rewritten occurrences.
    pub async fn expand_stylesheet(
        &self,
        stylesheet: &AssetRecord,
        sink: &dyn EventSink,
    ) -> std::io::Result<usize> {
        let file_path = self.store.absolute_path(&stylesheet.local_path);
        let bytes = tokio::fs::read(&file_path).await?;
        // Writing back a lossy decode would corrupt the file, so leave it as served
        let css = String::from_utf8(bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        // References are relative to where the stylesheet was served from
        let Ok(stylesheet_url) = Url::parse(&stylesheet.source_url) else {
            return Ok(0);
        };

        let referenced = HtmlParser::new(stylesheet_url.clone()).extract_css_assets(&css);
        if referenced.is_empty() {
            return Ok(0);
        }
        self.fetcher.fetch_all(referenced, self.store, sink).await;

        let (updated, count) = rewrite_css_urls(&css, &stylesheet_url, |url| {
            self.store
                .get(url)
                .map(|record| relative_asset_path(stylesheet, &record))
        });

        if count > 0 {
            tokio::fs::write(&file_path, updated).await?;
        }
        Ok(count)
    }
}

/// Replace every `url(...)` whose resolved URL has a local path with
/// `url('<local path>')`. Returns the new text and the replacement count.
pub fn rewrite_css_urls<F>(css: &str, stylesheet_url: &Url, local_path: F) -> (String, usize)
where
    F: Fn(&str) -> Option<String>,
{
    let mut count = 0;
    let updated = CSS_URL_PATTERN.replace_all(css, |caps: &Captures| {
        let raw = &caps[1];
        if is_data_uri(raw) {
            return caps[0].to_string();
        }
        match resolve(raw, stylesheet_url).and_then(|url| local_path(&url)) {
            Some(path) => {
                count += 1;
                format!("url('{}')", path)
            }
            None => caps[0].to_string(),
        }
    });
    (updated.into_owned(), count)
}

/// Path to `target` as seen from the directory holding `from`.
pub fn relative_asset_path(from: &AssetRecord, target: &AssetRecord) -> String {
    let from_dir = Path::new(&from.local_path)
        .parent()
        .unwrap_or_else(|| Path::new(""));

    match pathdiff::diff_paths(Path::new(&target.local_path), from_dir) {
        Some(relative) => relative.to_string_lossy().replace('\\', "/"),
        None => target.local_path.clone(),
    }
}
