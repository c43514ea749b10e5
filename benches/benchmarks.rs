use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use url::Url;
use website_cloner::url_resolver::{classify, local_filename};
use website_cloner::{rewrite_html, AssetMap, AssetRecord, AssetStore, HtmlParser};

const PAGE: &str = r#"
    <html>
        <head>
            <link rel="stylesheet" href="/style.css">
            <link rel="stylesheet" href="/theme.css?v=3">
            <link rel="icon" href="/favicon.ico">
            <script src="/script.js"></script>
            <script src="https://cdn.example.com/lib.min.js"></script>
        </head>
        <body>
            <img src="/logo.png" alt="Logo">
            <img src="/banner.jpg" srcset="/banner-480.jpg 480w, /banner-960.jpg 960w">
            <div style="background: url('/hero.webp')"></div>
            <video src="/intro.mp4"><source src="/intro.webm"></video>
            <a href="/about">About</a>
        </body>
    </html>
"#;

fn base() -> Url {
    Url::parse("https://example.com/").unwrap()
}

fn bench_asset_discovery(c: &mut Criterion) {
    let parser = HtmlParser::new(base());

    c.bench_function("extract_assets", |b| {
        b.iter(|| {
            let _assets = parser.extract_assets(black_box(PAGE));
        });
    });
}

fn bench_local_filename(c: &mut Criterion) {
    let urls = vec![
        "https://example.com/style.css",
        "https://example.com/theme.css?v=3",
        "https://cdn.example.com/fonts/inter-var.woff2",
        "https://example.com/images/very/deep/path/banner-960.jpg?auto=format&w=960",
        "https://example.com/api/data",
    ];

    c.bench_function("local_filename", |b| {
        b.iter(|| {
            for url in &urls {
                let _name = local_filename(black_box(url));
                let _category = classify(black_box(url));
            }
        });
    });
}

fn bench_rewrite_html(c: &mut Criterion) {
    let assets: AssetMap = HtmlParser::new(base())
        .extract_assets(PAGE)
        .into_iter()
        .map(|url| {
            let (category, local_path) = AssetStore::local_path_for(&url);
            AssetRecord {
                source_url: url,
                local_path,
                category,
            }
        })
        .collect();
    let base = base();

    c.bench_function("rewrite_html", |b| {
        b.iter(|| {
            let _rewritten = rewrite_html(black_box(PAGE), &base, &assets);
        });
    });
}

criterion_group!(
    benches,
    bench_asset_discovery,
    bench_local_filename,
    bench_rewrite_html
);
criterion_main!(benches);
