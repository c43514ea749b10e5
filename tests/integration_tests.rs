use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use url::Url;
use website_cloner::{
    AssetSource, AssetStore, CloneResult, ClonerConfig, Event, EventKind, FetchError, RenderError,
    Snapshot, SnapshotProvider, WebsiteCloner,
};

/// Serves a fixed page.
struct StubPage {
    html: String,
    final_url: String,
}

#[async_trait]
impl SnapshotProvider for StubPage {
    async fn snapshot(&self, _url: &Url) -> Result<Snapshot, RenderError> {
        Ok(Snapshot::new(self.html.clone(), self.final_url.clone()))
    }
}

/// Serves bytes from a table and counts requests per URL; anything else is a 404.
#[derive(Default)]
struct StubAssets {
    files: HashMap<String, Vec<u8>>,
    requests: Mutex<HashMap<String, usize>>,
}

impl StubAssets {
    fn with(mut self, url: &str, content: &[u8]) -> Self {
        self.files.insert(url.to_string(), content.to_vec());
        self
    }

    fn requests(&self, url: &str) -> usize {
        self.requests.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl AssetSource for StubAssets {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        *self.requests.lock().unwrap().entry(url.to_string()).or_default() += 1;
        self.files.get(url).cloned().ok_or(FetchError::Status(404))
    }
}

fn page(html: &str) -> Arc<StubPage> {
    Arc::new(StubPage {
        html: html.to_string(),
        final_url: "https://x.test/".to_string(),
    })
}

async fn run_clone(
    output_dir: &Path,
    page: Arc<StubPage>,
    assets: Arc<StubAssets>,
) -> (CloneResult, Vec<Event>) {
    let config = ClonerConfig {
        output_dir: output_dir.to_path_buf(),
        ..ClonerConfig::default()
    };
    let cloner = WebsiteCloner::new(&config, page, assets);
    let events = Mutex::new(Vec::new());
    let result = cloner
        .clone_url("https://x.test/", &|event: Event| events.lock().unwrap().push(event))
        .await;
    (result, events.into_inner().unwrap())
}

fn local_path(url: &str) -> String {
    AssetStore::local_path_for(url).1
}

fn read_index(result: &CloneResult) -> String {
    let output_path = result.output_path.as_ref().unwrap();
    fs::read_to_string(Path::new(output_path).join("index.html")).unwrap()
}

#[tokio::test]
async fn test_image_is_downloaded_and_rewritten() {
    let temp_dir = tempdir().unwrap();
    let assets = Arc::new(StubAssets::default().with("https://x.test/a.png", b"PNGDATA"));

    let (result, events) = run_clone(
        temp_dir.path(),
        page(r#"<html><body><img src="/a.png"></body></html>"#),
        assets.clone(),
    )
    .await;

    assert!(result.success, "{:?}", result.error);
    let image = local_path("https://x.test/a.png");
    assert!(image.starts_with("assets/images/"));
    assert!(image.ends_with(".png"));
    assert_eq!(
        read_index(&result),
        format!(r#"<html><body><img src="{}"></body></html>"#, image)
    );

    let output_path = Path::new(result.output_path.as_ref().unwrap());
    assert_eq!(fs::read(output_path.join(&image)).unwrap(), b"PNGDATA");
    assert_eq!(assets.requests("https://x.test/a.png"), 1);

    let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
    assert!(messages.contains(&"Found 1 assets to download"));
    assert!(messages.iter().any(|m| m.starts_with("Open URL: /clone/x_test_")));
}

#[tokio::test]
async fn test_stylesheet_fonts_are_expanded() {
    let temp_dir = tempdir().unwrap();
    let css_url = "https://x.test/css/s.css";
    let font_url = "https://x.test/fonts/f.woff2";
    let assets = Arc::new(
        StubAssets::default()
            .with(css_url, b"@font-face{font-family:F;src:url(../fonts/f.woff2)}")
            .with(font_url, b"wOF2"),
    );

    let (result, _) = run_clone(
        temp_dir.path(),
        page(r#"<link rel="stylesheet" href="/css/s.css"><p>hi</p>"#),
        assets.clone(),
    )
    .await;

    assert!(result.success, "{:?}", result.error);
    let output_path = Path::new(result.output_path.as_ref().unwrap());

    let font = local_path(font_url);
    let font_file = font.rsplit('/').next().unwrap();
    assert!(output_path.join(&font).exists());

    let css = fs::read_to_string(output_path.join(local_path(css_url))).unwrap();
    assert_eq!(
        css,
        format!("@font-face{{font-family:F;src:url('../fonts/{}')}}", font_file)
    );

    assert!(read_index(&result).contains(&format!(r#"href="{}""#, local_path(css_url))));
    assert_eq!(assets.requests(font_url), 1);
}

#[tokio::test]
async fn test_failed_asset_keeps_remote_url() {
    let temp_dir = tempdir().unwrap();
    let assets = Arc::new(StubAssets::default().with("https://x.test/ok.js", b"void 0"));
    let html = r#"<script src="/ok.js"></script><img src="https://cdn.test/missing.png">"#;

    let (result, events) = run_clone(temp_dir.path(), page(html), assets.clone()).await;

    assert!(result.success);
    let index = read_index(&result);
    assert!(index.contains(r#"<img src="https://cdn.test/missing.png">"#));
    assert!(index.contains(&format!(r#"src="{}""#, local_path("https://x.test/ok.js"))));

    let warnings: Vec<&Event> = events
        .iter()
        .filter(|e| e.kind == EventKind::Warning)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("404"));
}

#[tokio::test]
async fn test_data_uri_is_preserved_and_never_fetched() {
    let temp_dir = tempdir().unwrap();
    let assets = Arc::new(StubAssets::default());
    let html = r#"<img src="data:image/gif;base64,R0lGODlhAQABAAAAACw="><div style="background:url(data:image/png;base64,AAAA)"></div>"#;

    let (result, _) = run_clone(temp_dir.path(), page(html), assets.clone()).await;

    assert!(result.success);
    assert_eq!(read_index(&result), html);
    assert_eq!(assets.total_requests(), 0);
}

#[tokio::test]
async fn test_shared_asset_is_fetched_once() {
    let temp_dir = tempdir().unwrap();
    let css_url = "https://x.test/site.css";
    let bg_url = "https://x.test/bg.png";
    let assets = Arc::new(
        StubAssets::default()
            .with(css_url, b"body{background:url('bg.png')}")
            .with(bg_url, b"PNG"),
    );
    let html = r#"<link rel="stylesheet" href="site.css"><img src="bg.png"><img srcset="bg.png 1x, bg.png 2x">"#;

    let (result, _) = run_clone(temp_dir.path(), page(html), assets.clone()).await;

    assert!(result.success);
    assert_eq!(assets.requests(bg_url), 1);
    assert_eq!(assets.requests(css_url), 1);

    let output_path = Path::new(result.output_path.as_ref().unwrap());
    let css = fs::read_to_string(output_path.join(local_path(css_url))).unwrap();
    assert!(css.contains("url('../images/"));

    let bg = local_path(bg_url);
    assert!(read_index(&result).contains(&format!(r#"srcset="{} 1x, {} 2x""#, bg, bg)));
}

#[tokio::test]
async fn test_invalid_url_is_reported_without_network() {
    let temp_dir = tempdir().unwrap();
    let assets = Arc::new(StubAssets::default());
    let config = ClonerConfig {
        output_dir: temp_dir.path().to_path_buf(),
        ..ClonerConfig::default()
    };
    let cloner = WebsiteCloner::new(&config, page("<p>unused</p>"), assets.clone());

    let events = Mutex::new(Vec::new());
    let result = cloner
        .clone_url("ftp://x.test/file", &|event: Event| events.lock().unwrap().push(event))
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("Invalid URL"));
    assert_eq!(assets.total_requests(), 0);
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    assert_eq!(events.lock().unwrap()[0].kind, EventKind::Error);
}
