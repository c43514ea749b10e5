pub mod cli;
pub mod cloner;
pub mod config;
pub mod css_expander;
pub mod downloader;
pub mod error;
pub mod events;
pub mod file_manager;
pub mod html_parser;
pub mod jobs;
pub mod renderer;
pub mod rewriter;
pub mod server;
pub mod url_resolver;

// Re-export main types for convenience
pub use cloner::WebsiteCloner;
pub use config::ClonerConfig;
pub use downloader::{AssetFetcher, AssetSource, HttpAssetSource};
pub use error::{CloneError, FetchError, RenderError};
pub use events::{CloneResult, Event, EventKind, EventSink};
pub use file_manager::{AssetMap, AssetRecord, AssetStore};
pub use html_parser::HtmlParser;
pub use jobs::{Job, JobManager, JobStatus, Subscription};
pub use renderer::{HttpSnapshotProvider, Snapshot, SnapshotProvider};
pub use rewriter::rewrite_html;
pub use url_resolver::AssetCategory;
