use regex::Regex;
use select::document::Document;
use select::predicate::{Attr, Name, Predicate};
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;
use url::Url;

use crate::url_resolver::{is_data_uri, resolve};

/// `url(...)` in CSS, quoted or not. Group 1 is the reference.
pub static CSS_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).expect("CSS url() pattern is valid")
});

/// A reference as written in the document, paired with its absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetReference {
    pub raw: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct HtmlParser {
    base_url: Url,
}

impl HtmlParser {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Deduplicated absolute asset URLs referenced by an HTML document.
    pub fn extract_assets(&self, html_content: &str) -> HashSet<String> {
        self.extract_references(html_content)
            .into_iter()
            .map(|reference| reference.url)
            .collect()
    }

    /// Every asset reference in an HTML document, deduplicated on (raw, url).
    pub fn extract_references(&self, html_content: &str) -> Vec<AssetReference> {
        let document = Document::from(html_content);
        let mut references = BTreeSet::new();

        // Images
        for img in document.find(Name("img")) {
            if let Some(src) = img.attr("src") {
                self.push_reference(src, &mut references);
            }
        }

        // Responsive images on any element (img, source)
        for element in document.find(Attr("srcset", ())) {
            if let Some(srcset) = element.attr("srcset") {
                for candidate in srcset_urls(srcset) {
                    self.push_reference(candidate, &mut references);
                }
            }
        }

        // Stylesheets, preloads and icons
        for link in document.find(Name("link")) {
            let (Some(href), rel) = (link.attr("href"), link.attr("rel").unwrap_or_default()) else {
                continue;
            };
            let is_stylesheet = rel
                .split_ascii_whitespace()
                .any(|r| r.eq_ignore_ascii_case("stylesheet"));
            if is_stylesheet || rel.contains("preload") || rel.contains("icon") {
                self.push_reference(href, &mut references);
            }
        }

        // Scripts
        for script in document.find(Name("script")) {
            if let Some(src) = script.attr("src") {
                self.push_reference(src, &mut references);
            }
        }

        // Video and audio, including their <source> children
        for media in ["video", "audio"] {
            for element in document.find(Name(media)) {
                if let Some(src) = element.attr("src") {
                    self.push_reference(src, &mut references);
                }
            }
            for source in document.find(Name(media).descendant(Name("source"))) {
                if let Some(src) = source.attr("src") {
                    self.push_reference(src, &mut references);
                }
            }
        }

        // Background images from inline styles
        for element in document.find(Attr("style", ())) {
            if let Some(style) = element.attr("style") {
                for raw in css_url_references(style) {
                    self.push_reference(raw, &mut references);
                }
            }
        }

        references.into_iter().collect()
    }

    /// Every `url(...)` reference in stylesheet text.
    pub fn extract_css_references(&self, css_content: &str) -> Vec<AssetReference> {
        let mut references = BTreeSet::new();
        for raw in css_url_references(css_content) {
            self.push_reference(raw, &mut references);
        }
        references.into_iter().collect()
    }

    pub fn extract_css_assets(&self, css_content: &str) -> HashSet<String> {
        self.extract_css_references(css_content)
            .into_iter()
            .map(|reference| reference.url)
            .collect()
    }

    fn push_reference(&self, raw: &str, references: &mut BTreeSet<AssetReference>) {
        let raw = raw.trim();
        if is_data_uri(raw) {
            return;
        }
        if let Some(url) = resolve(raw, &self.base_url) {
            references.insert(AssetReference {
                raw: raw.to_string(),
                url,
            });
        }
    }
}

/// URL part of each `srcset` candidate; descriptors are dropped.
pub fn srcset_urls(srcset: &str) -> impl Iterator<Item = &str> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
}

/// Raw `url(...)` references in CSS text, `data:` URIs excluded.
pub fn css_url_references(css: &str) -> impl Iterator<Item = &str> {
    CSS_URL_PATTERN
        .captures_iter(css)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str())
        .filter(|raw| !is_data_uri(raw))
}
