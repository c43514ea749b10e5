use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::warn;
use url::Url;

use crate::file_manager::AssetMap;
use crate::html_parser::HtmlParser;
use crate::url_resolver::resolve;

static SRCSET_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"srcset=(?:"([^"]*)"|'([^']*)')"#).expect("srcset pattern is valid")
});

/// One textual substitution. `literal` entries are also replaced wherever
/// they occur as plain text, not only inside attributes and `url(...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Replacement {
    from: String,
    to: String,
    literal: bool,
}

/// Point every reference to a downloaded asset at its local copy.
///
/// Absolute URLs are replaced everywhere they appear. References written
/// relative to the page are replaced only in `src`/`href`/`srcset`
/// attributes and `url(...)`, where their boundaries are unambiguous.
/// Replacements run longest source first so a URL that is a prefix of
/// another can never clobber the longer one.
pub fn rewrite_html(html: &str, base_url: &Url, assets: &AssetMap) -> String {
    if assets.is_empty() {
        return html.to_string();
    }

    let replacements = collect_replacements(html, base_url, assets);
    let mut rewritten = rewrite_srcsets(html, base_url, assets, &replacements);

    for replacement in &replacements {
        rewritten = replace_reference(&rewritten, &replacement.from, &replacement.to);
        if replacement.literal {
            rewritten = rewritten.replace(&replacement.from, &replacement.to);
        }
    }

    rewritten
}

fn collect_replacements(html: &str, base_url: &Url, assets: &AssetMap) -> Vec<Replacement> {
    let mut by_source: BTreeMap<String, Replacement> = BTreeMap::new();

    for record in assets.iter() {
        by_source.insert(
            record.source_url.clone(),
            Replacement {
                from: record.source_url.clone(),
                to: record.local_path.clone(),
                literal: true,
            },
        );
    }

    // Spellings used in the page itself, e.g. "/a.png" or "img/a.png?w=1&amp;h=2"
    for reference in HtmlParser::new(base_url.clone()).extract_references(html) {
        let Some(record) = assets.get(&reference.url) else {
            continue;
        };
        let mut spellings = vec![reference.raw.clone()];
        if reference.raw.contains('&') {
            spellings.push(reference.raw.replace('&', "&amp;"));
        }
        for raw in spellings {
            by_source.entry(raw.clone()).or_insert(Replacement {
                from: raw,
                to: record.local_path.clone(),
                literal: false,
            });
        }
    }

    let mut replacements: Vec<Replacement> = by_source.into_values().collect();
    replacements.sort_by(|a, b| b.from.len().cmp(&a.from.len()).then_with(|| a.from.cmp(&b.from)));
    replacements
}

/// Rewrite `srcset` candidates one by one, keeping descriptors and spacing.
fn rewrite_srcsets(
    html: &str,
    base_url: &Url,
    assets: &AssetMap,
    replacements: &[Replacement],
) -> String {
    let lookup = |token: &str| -> Option<String> {
        if let Some(r) = replacements.iter().find(|r| r.from == token) {
            return Some(r.to.clone());
        }
        let decoded = token.replace("&amp;", "&");
        resolve(&decoded, base_url)
            .and_then(|url| assets.get(&url))
            .map(|record| record.local_path.clone())
    };

    SRCSET_ATTR
        .replace_all(html, |caps: &Captures| {
            let (value, quote) = match (caps.get(1), caps.get(2)) {
                (Some(value), _) => (value.as_str(), '"'),
                (None, Some(value)) => (value.as_str(), '\''),
                (None, None) => return caps[0].to_string(),
            };
            format!("srcset={quote}{}{quote}", rewrite_srcset_value(value, &lookup))
        })
        .into_owned()
}

fn rewrite_srcset_value<F>(value: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    value
        .split(',')
        .map(|candidate| {
            let trimmed = candidate.trim_start();
            let leading = &candidate[..candidate.len() - trimmed.len()];
            let url_end = trimmed
                .find(char::is_whitespace)
                .unwrap_or(trimmed.len());
            let (url, rest) = trimmed.split_at(url_end);
            match lookup(url) {
                Some(local) if !url.is_empty() => format!("{}{}{}", leading, local, rest),
                _ => candidate.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Attribute (quoted and unquoted) and `url(...)` forms of one reference.
fn replace_reference(text: &str, from: &str, to: &str) -> String {
    replace_reference_with(text, from, to, compile_pattern)
}

/// Falls back to a literal replacement of `from` when any of the forms
/// could not be compiled.
fn replace_reference_with<C>(text: &str, from: &str, to: &str, compile: C) -> String
where
    C: Fn(&str) -> Option<Regex>,
{
    let escaped = regex::escape(from);
    let quoted = compile(&format!(r#"(src|href|srcset)=["']{}["']"#, escaped));
    let unquoted = compile(&format!(r"(src|href|srcset)={}([\s>])", escaped));
    let css_url = compile(&format!(r#"url\(['"]?{}['"]?\)"#, escaped));

    let (Some(quoted), Some(unquoted), Some(css_url)) = (quoted, unquoted, css_url) else {
        return text.replace(from, to);
    };

    let result = quoted.replace_all(text, |caps: &Captures| format!("{}=\"{}\"", &caps[1], to));
    let result = unquoted.replace_all(&result, |caps: &Captures| {
        format!("{}=\"{}\"{}", &caps[1], to, &caps[2])
    });
    css_url
        .replace_all(&result, |_: &Captures| format!("url('{}')", to))
        .into_owned()
}

fn compile_pattern(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Skipping rewrite pattern, falling back to literal replacement: {}", e);
            None
        }
    }
}
