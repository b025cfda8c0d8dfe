//! Ranked-fallback extraction from HTML documents.
//!
//! News pages rarely agree on where the summary, author or publication date
//! lives, and the same outlet moves things around between redesigns. Every
//! field is therefore described by an ordered list of [`Locator`]s and read
//! with [`extract`], which returns the first acceptable value and never
//! looks at later locators once one has matched.
//!
//! The underlying combinator, [`first_match`], is independent of HTML: it
//! takes an ordered list of strategies and returns the first `Some`. Listing
//! pages use the same rule through [`first_matching_nodes`].
//!
//! Extraction never fails an item. When every locator misses, a field falls
//! back to a heuristic and finally to a sentinel (see [`ArticleDetails`]).

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::utils::collapse_whitespace;

/// Separator between paragraphs of a stored summary (U+241E SYMBOL FOR
/// RECORD SEPARATOR). It does not occur in ordinary prose, so
/// [`split_paragraphs`] recovers the original paragraphs exactly.
pub const PARAGRAPH_DELIMITER: &str = "\u{241E}";

/// Summary stored when no locator or heuristic produced usable text.
pub const NO_CONTENT: &str = "Click to read full story.";

/// Meta descriptions shorter than this are teaser fragments, not summaries.
pub const MIN_SUMMARY_LEN: usize = 50;

/// Paragraphs taken by the last-resort summary heuristic.
const LEAD_PARAGRAPHS: usize = 3;

/// Paragraphs shorter than this are captions, bylines or buttons.
const MIN_PARAGRAPH_LEN: usize = 40;

static BOILERPLATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(subscribe|sign up|newsletter|cookies?\b|advertisement|enable javascript|all rights reserved|continue reading)",
    )
    .unwrap()
});

/// A declarative rule for where a value lives in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// Collapsed visible text of the first element matching the selector.
    Text(&'static str),
    /// Named attribute of the first element matching the selector.
    Attr(&'static str, &'static str),
}

impl Locator {
    /// Apply the locator to `doc`, returning a trimmed, non-empty value.
    pub fn apply(&self, doc: &Html) -> Option<String> {
        let css = match self {
            Locator::Text(css) | Locator::Attr(css, _) => *css,
        };
        let selector = match Selector::parse(css) {
            Ok(s) => s,
            Err(e) => {
                warn!(selector = css, error = %e, "Invalid locator selector; skipping");
                return None;
            }
        };
        let element = doc.select(&selector).next()?;
        let value = match self {
            Locator::Text(_) => element_text(element),
            Locator::Attr(_, attr) => collapse_whitespace(element.value().attr(attr)?),
        };
        (!value.is_empty()).then_some(value)
    }
}

pub const SUMMARY_META: &[Locator] = &[
    Locator::Attr("meta[name=\"description\"]", "content"),
    Locator::Attr("meta[property=\"og:description\"]", "content"),
];

pub const SUMMARY_BODY: &[Locator] = &[
    Locator::Text("article p"),
    Locator::Text(".article-body p"),
    Locator::Text("main p"),
];

pub const AUTHOR: &[Locator] = &[
    Locator::Attr("meta[name=\"author\"]", "content"),
    Locator::Attr("meta[property=\"article:author\"]", "content"),
    Locator::Text(".author-name"),
    Locator::Text("a[rel=\"author\"]"),
];

pub const PUBLISHED: &[Locator] = &[
    Locator::Attr("meta[property=\"article:published_time\"]", "content"),
    Locator::Attr("time[datetime]", "datetime"),
];

pub const IMAGE: &[Locator] = &[
    Locator::Attr("meta[property=\"og:image\"]", "content"),
    Locator::Attr("meta[name=\"twitter:image\"]", "content"),
    Locator::Attr("article img[src]", "src"),
];

pub const CANONICAL: &[Locator] = &[
    Locator::Attr("link[rel=\"canonical\"]", "href"),
    Locator::Attr("meta[property=\"og:url\"]", "content"),
];

/// One ranked extraction strategy.
pub type Strategy<'a, T> = Box<dyn Fn() -> Option<T> + 'a>;

/// Run `strategies` in order and return the first `Some`.
///
/// Later strategies are not evaluated once one succeeds.
pub fn first_match<T>(strategies: &[Strategy<'_, T>]) -> Option<T> {
    strategies.iter().find_map(|strategy| strategy())
}

/// First value any locator yields, in locator order.
pub fn extract(doc: &Html, locators: &[Locator]) -> Option<String> {
    extract_with(doc, locators, |_| true)
}

/// Like [`extract`], but a value is only taken if `accept` approves it;
/// a rejected value falls through to the next locator.
pub fn extract_with<F>(doc: &Html, locators: &[Locator], accept: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    let accept = &accept;
    let strategies: Vec<Strategy<'_, String>> = locators
        .iter()
        .map(|loc| {
            Box::new(move || loc.apply(doc).filter(|v| accept(v))) as Strategy<'_, String>
        })
        .collect();
    first_match(&strategies)
}

/// Nodes matched by the first selector that matches anything at all.
///
/// This is a fallback chain, not a union: if the second selector matches,
/// the third is never consulted even if it would match more nodes.
pub fn first_matching_nodes<'a>(doc: &'a Html, selectors: &[&str]) -> Vec<ElementRef<'a>> {
    for css in selectors {
        let Ok(selector) = Selector::parse(css) else {
            warn!(selector = css, "Invalid listing selector; skipping");
            continue;
        };
        let nodes: Vec<ElementRef<'a>> = doc.select(&selector).collect();
        if !nodes.is_empty() {
            debug!(selector = css, count = nodes.len(), "Listing selector matched");
            return nodes;
        }
    }
    Vec::new()
}

/// Collapsed visible text of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// True for promotional and consent interstitial text.
pub fn is_boilerplate(text: &str) -> bool {
    BOILERPLATE.is_match(text)
}

/// Join summary paragraphs with [`PARAGRAPH_DELIMITER`].
pub fn join_paragraphs<S: AsRef<str>>(paragraphs: &[S]) -> String {
    paragraphs
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(PARAGRAPH_DELIMITER)
}

/// Inverse of [`join_paragraphs`].
pub fn split_paragraphs(summary: &str) -> Vec<&str> {
    summary.split(PARAGRAPH_DELIMITER).collect()
}

/// Last-resort summary: the first few substantial paragraphs under the first
/// generic container that has any.
pub fn lead_paragraphs(doc: &Html, max: usize) -> Option<String> {
    for container in ["article", "main", "body"] {
        let Ok(selector) = Selector::parse(&format!("{container} p")) else {
            continue;
        };
        let paragraphs: Vec<String> = doc
            .select(&selector)
            .map(element_text)
            .filter(|p| p.chars().count() >= MIN_PARAGRAPH_LEN && !is_boilerplate(p))
            .take(max)
            .collect();
        if !paragraphs.is_empty() {
            return Some(join_paragraphs(&paragraphs));
        }
    }
    None
}

/// Parse the timestamp formats seen in article metadata.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value.get(..10)?, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Resolve `raw` against `base`, keeping only http(s) results.
pub fn resolve_link(base: &Url, raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    let url = base.join(raw).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Everything extracted from an article's detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleDetails {
    /// Paragraphs joined with [`PARAGRAPH_DELIMITER`], or [`NO_CONTENT`].
    pub summary: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub image_url: Option<String>,
    pub canonical_url: Option<String>,
}

impl ArticleDetails {
    /// Sentinel details, used when the detail page could not be fetched.
    pub fn fallback(source_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            summary: NO_CONTENT.to_string(),
            author: source_name.to_string(),
            published_at: now,
            image_url: None,
            canonical_url: None,
        }
    }

    /// Extract details from a detail page's HTML.
    ///
    /// # Arguments
    ///
    /// * `html` - Raw detail page body
    /// * `page_url` - URL the page was fetched from, for resolving relative links
    /// * `source_name` - Author of last resort
    /// * `now` - Publication time of last resort
    pub fn from_html(html: &str, page_url: &Url, source_name: &str, now: DateTime<Utc>) -> Self {
        let doc = Html::parse_document(html);

        let summary_strategies: Vec<Strategy<'_, String>> = vec![
            Box::new(|| {
                extract_with(&doc, SUMMARY_META, |v| {
                    v.chars().count() >= MIN_SUMMARY_LEN && !is_boilerplate(v)
                })
            }),
            Box::new(|| extract_with(&doc, SUMMARY_BODY, |v| !is_boilerplate(v))),
            Box::new(|| lead_paragraphs(&doc, LEAD_PARAGRAPHS)),
        ];
        let summary = first_match(&summary_strategies).unwrap_or_else(|| NO_CONTENT.to_string());

        let author = extract_with(&doc, AUTHOR, |v| !v.starts_with("http"))
            .unwrap_or_else(|| source_name.to_string());

        let published_at = extract_with(&doc, PUBLISHED, |v| parse_timestamp(v).is_some())
            .and_then(|v| parse_timestamp(&v))
            .unwrap_or(now);

        let image_url = extract_with(&doc, IMAGE, |v| resolve_link(page_url, v).is_some())
            .and_then(|v| resolve_link(page_url, &v))
            .map(String::from);

        let canonical_url = extract(&doc, CANONICAL)
            .and_then(|v| resolve_link(page_url, &v))
            .map(String::from);

        Self {
            summary,
            author,
            published_at,
            image_url,
            canonical_url,
        }
    }
}
