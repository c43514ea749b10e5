//! URL normalization, resolution and classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::CloneError;

/// Extensions kept on local filenames. Anything else is stored without one.
const KEPT_EXTENSIONS: &[&str] = &[
    "html", "htm", "css", "js", "json", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "woff",
    "woff2", "ttf", "eot", "otf", "mp4", "webm", "mp3", "wav",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Css,
    Js,
    Image,
    Font,
    Video,
    Audio,
    Other,
}

impl AssetCategory {
    /// Subdirectory of `assets/` holding this category.
    pub fn dir_name(&self) -> &'static str {
        match self {
            AssetCategory::Css => "css",
            AssetCategory::Js => "js",
            AssetCategory::Image => "images",
            AssetCategory::Font => "fonts",
            AssetCategory::Video => "video",
            AssetCategory::Audio => "audio",
            AssetCategory::Other => "other",
        }
    }

    fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "css" => AssetCategory::Css,
            "js" => AssetCategory::Js,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "ico" => AssetCategory::Image,
            "woff" | "woff2" | "ttf" | "eot" | "otf" => AssetCategory::Font,
            "mp4" | "webm" => AssetCategory::Video,
            "mp3" | "wav" => AssetCategory::Audio,
            _ => AssetCategory::Other,
        }
    }
}

/// Validate user input and turn it into an absolute http(s) URL.
pub fn normalize(input: &str) -> Result<Url, CloneError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CloneError::InvalidUrl("URL is empty".to_string()));
    }

    let lower = trimmed.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else if has_foreign_scheme(trimmed) {
        return Err(CloneError::InvalidUrl(
            "Only HTTP/HTTPS URLs are supported".to_string(),
        ));
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| CloneError::InvalidUrl(format!("Invalid URL format: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(CloneError::InvalidUrl(
            "Only HTTP/HTTPS URLs are supported".to_string(),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(CloneError::InvalidUrl("URL has no host".to_string()));
    }

    Ok(url)
}

// `scheme://` with something other than http(s), e.g. ftp://host
fn has_foreign_scheme(input: &str) -> bool {
    match input.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Resolve a reference found in a document against the document's URL.
///
/// Returns `None` for `data:` URIs, malformed references and anything that
/// does not end up as http(s).
pub fn resolve(reference: &str, base_url: &Url) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() || is_data_uri(reference) {
        return None;
    }

    let resolved = if reference.starts_with("//") {
        // Protocol-relative URL
        Url::parse(&format!("{}:{}", base_url.scheme(), reference)).ok()?
    } else {
        base_url.join(reference).ok()?
    };

    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

pub fn is_data_uri(reference: &str) -> bool {
    reference
        .get(..5)
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case("data:"))
}

/// Asset category from the URL path extension, ignoring query and fragment.
pub fn classify(url: &str) -> AssetCategory {
    path_extension(url)
        .map(|ext| AssetCategory::from_extension(&ext))
        .unwrap_or(AssetCategory::Other)
}

/// Deterministic local filename for an asset URL: a hash of the full URL
/// string plus the original extension when it is a known web extension.
pub fn local_filename(url: &str) -> String {
    let hash = format!("{:016x}", xxh3_64(url.as_bytes()));
    match path_extension(url) {
        Some(ext) if KEPT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
            format!("{}.{}", hash, ext)
        }
        _ => hash,
    }
}

fn path_extension(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let file_name = path.rsplit('/').next()?;
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_string())
}

/// Hostname reduced to `[A-Za-z0-9-]`, every other character becoming `_`.
pub fn safe_host(url: &Url) -> String {
    match url.host_str() {
        Some(host) if !host.is_empty() => host
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect(),
        _ => "unknown".to_string(),
    }
}

/// Name of the per-clone output folder: `<safe_host>_<YYYY-MM-DDTHH-MM-SS>`.
pub fn output_folder_name(url: &Url, now: DateTime<Utc>) -> String {
    format!("{}_{}", safe_host(url), now.format("%Y-%m-%dT%H-%M-%S"))
}
