//! Stateless HTTP adapter for news listing and detail pages.
//!
//! Pages are fetched either directly, with a desktop browser User-Agent, or
//! through the metered scraping proxy when the source is metered and a proxy
//! key is configured. The proxy is slower, so it gets longer timeouts.
//!
//! | Route | Listing timeout | Detail timeout |
//! |-------|-----------------|----------------|
//! | Direct | 15 s | 15 s |
//! | Proxy | 40 s | 30 s |
//!
//! Listing pages are read with the source's headline locators as a fallback
//! chain (see [`crate::extract::first_matching_nodes`]); headlines without a
//! resolvable link, shorter than [`MIN_TITLE_LEN`], or without any of the
//! source's keywords never become candidates.

use chrono::{DateTime, Utc};
use itertools::Itertools;
use reqwest::header::USER_AGENT;
use scraper::{ElementRef, Html};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{IngestError, Result};
use crate::extract::{ArticleDetails, element_text, first_matching_nodes, resolve_link};
use crate::models::{CandidateItem, Payload, RecordKey};
use crate::sources::WebSource;

pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0.0.0 Safari/537.36";

pub const PROXY_ENDPOINT: &str = "http://api.scraperapi.com";

/// Headlines shorter than this are section labels or buttons.
pub const MIN_TITLE_LEN: usize = 15;

const DIRECT_TIMEOUT: Duration = Duration::from_secs(15);
const PROXY_LISTING_TIMEOUT: Duration = Duration::from_secs(40);
const PROXY_DETAIL_TIMEOUT: Duration = Duration::from_secs(30);

/// Which kind of page is being requested; only affects proxy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Listing,
    Detail,
}

/// Minimal HTTP GET capability used by the scraper.
pub trait HttpFetch {
    /// GET `url` and return the body text.
    ///
    /// `metered` requests go through the proxy when one is configured.
    async fn get(&self, url: &str, metered: bool, kind: PageKind) -> Result<String>;
}

/// [`HttpFetch`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    proxy_key: Option<String>,
}

impl ReqwestFetcher {
    pub fn new(proxy_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| IngestError::Config(format!("building http client: {e}")))?;
        Ok(Self {
            client,
            proxy_key: proxy_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn proxy_url(key: &str, url: &str, kind: PageKind) -> String {
        let mut target = format!(
            "{}?api_key={}&url={}",
            PROXY_ENDPOINT,
            urlencoding::encode(key),
            urlencoding::encode(url)
        );
        if kind == PageKind::Detail {
            target.push_str("&render=false");
        }
        target
    }

    /// Decide where a request goes, how long it may take and how it identifies
    /// itself. Only metered sources use the proxy, and only when a key is set.
    fn plan(&self, url: &str, metered: bool, kind: PageKind) -> RequestPlan {
        match (self.proxy_key.as_deref(), metered) {
            (Some(key), true) => RequestPlan {
                target: Self::proxy_url(key, url, kind),
                timeout: match kind {
                    PageKind::Listing => PROXY_LISTING_TIMEOUT,
                    PageKind::Detail => PROXY_DETAIL_TIMEOUT,
                },
                user_agent: None,
                proxied: true,
            },
            _ => RequestPlan {
                target: url.to_string(),
                timeout: DIRECT_TIMEOUT,
                user_agent: Some(BROWSER_USER_AGENT),
                proxied: false,
            },
        }
    }
}

/// How a single GET is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestPlan {
    target: String,
    timeout: Duration,
    user_agent: Option<&'static str>,
    proxied: bool,
}

impl HttpFetch for ReqwestFetcher {
    #[instrument(level = "debug", skip(self), fields(proxied))]
    async fn get(&self, url: &str, metered: bool, kind: PageKind) -> Result<String> {
        let plan = self.plan(url, metered, kind);
        tracing::Span::current().record("proxied", plan.proxied);

        let mut request = self.client.get(&plan.target).timeout(plan.timeout);
        if let Some(agent) = plan.user_agent {
            request = request.header(USER_AGENT, agent);
        }

        let body = request.send().await?.error_for_status()?.text().await?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

/// Result of reading one listing page.
#[derive(Debug, Default)]
pub struct Listing {
    /// Relevant candidates, in page order, one per link.
    pub candidates: Vec<CandidateItem>,
    /// Nodes matched by the winning locator.
    pub matched: usize,
    /// Well-formed headlines dropped for containing none of the keywords.
    pub irrelevant: usize,
}

/// The node's own `href`, or that of its nearest enclosing anchor.
fn node_link<'a>(el: ElementRef<'a>) -> Option<&'a str> {
    if let Some(href) = el.value().attr("href") {
        return Some(href);
    }
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
}

fn is_relevant(title: &str, keywords: &[&str]) -> bool {
    let title = title.to_lowercase();
    keywords.iter().any(|k| title.contains(&k.to_lowercase()))
}

/// Read headline candidates out of a listing page.
pub fn parse_listing(html: &str, source: &WebSource) -> Result<Listing> {
    let base = Url::parse(source.base)
        .or_else(|_| Url::parse(source.url))
        .map_err(|e| IngestError::Config(format!("{}: bad base url: {e}", source.name)))?;

    let doc = Html::parse_document(html);
    let nodes = first_matching_nodes(&doc, source.selectors);
    let matched = nodes.len();

    let mut irrelevant = 0usize;
    let candidates = nodes
        .into_iter()
        .filter_map(|el| {
            let title = element_text(el);
            let link = resolve_link(&base, node_link(el)?)?;
            (title.chars().count() >= MIN_TITLE_LEN).then_some((title, link))
        })
        .filter(|(title, _)| {
            let keep = is_relevant(title, source.keywords);
            if !keep {
                irrelevant += 1;
            }
            keep
        })
        .unique_by(|(_, link)| link.to_string())
        .map(|(title, link)| CandidateItem {
            key: RecordKey::web(link.as_str()),
            origin: source.origin(),
            payload: Payload::Link {
                title,
                url: link.to_string(),
            },
        })
        .collect();

    Ok(Listing {
        candidates,
        matched,
        irrelevant,
    })
}

/// Fetch and parse a source's listing page.
///
/// # Errors
///
/// Returns [`IngestError::Transport`] on network failure, timeout or a
/// non-success status.
#[instrument(level = "info", skip_all, fields(source = source.name))]
pub async fn list_candidates<H: HttpFetch>(http: &H, source: &WebSource) -> Result<Listing> {
    let html = http.get(source.url, source.metered, PageKind::Listing).await?;
    let listing = parse_listing(&html, source)?;
    if listing.matched == 0 {
        warn!(url = source.url, "No items found; check the listing selectors");
    }
    info!(
        matched = listing.matched,
        relevant = listing.candidates.len(),
        irrelevant = listing.irrelevant,
        "Indexed listing"
    );
    Ok(listing)
}

/// Fetch an article's detail page and extract its fields.
///
/// Never fails: a page that cannot be fetched yields sentinel details.
#[instrument(level = "info", skip_all, fields(%link))]
pub async fn fetch_details<H: HttpFetch>(
    http: &H,
    source: &WebSource,
    link: &str,
    now: DateTime<Utc>,
) -> ArticleDetails {
    let page_url = match Url::parse(link) {
        Ok(u) => u,
        Err(e) => {
            warn!(error = %e, "Unparsable article link; using fallback details");
            return ArticleDetails::fallback(source.name, now);
        }
    };
    match http.get(link, source.metered, PageKind::Detail).await {
        Ok(html) => ArticleDetails::from_html(&html, &page_url, source.name, now),
        Err(e) => {
            warn!(error = %e, "Detail fetch failed; using fallback details");
            ArticleDetails::fallback(source.name, now)
        }
    }
}
