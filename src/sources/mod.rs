//! Static source configuration.
//!
//! Sources are compiled into the binary rather than loaded at runtime, so a
//! given build always scrapes the same, reviewed set of pages. Two tables
//! live here:
//!
//! - [`news`]: the categorized registry of web listing pages ([`WebSource`])
//! - [`folders`]: the (provider family, label) → mailbox name table
//!
//! Mail accounts themselves are rows in the store, not configuration; see
//! [`crate::store::AccountStore`].

pub mod folders;
pub mod news;

/// Number of new articles taken from one web source per run unless the
/// source says otherwise.
pub const DEFAULT_ITEM_CAP: usize = 3;

/// Item cap for high-importance sources.
pub const HIGH_IMPORTANCE_ITEM_CAP: usize = 10;

/// One web listing page and how to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct WebSource {
    pub name: &'static str,
    pub category: &'static str,
    /// Listing page fetched on every run.
    pub url: &'static str,
    /// Origin that relative links on the listing resolve against.
    pub base: &'static str,
    /// Headline locators, tried in order; the first one matching anything wins.
    pub selectors: &'static [&'static str],
    /// Relevance allow-list; a headline must contain at least one of these.
    pub keywords: &'static [&'static str],
    /// Routed through the paid scraping proxy and gated by the cooldown.
    pub metered: bool,
    pub item_cap: usize,
}

impl WebSource {
    /// Stable identifier used for checkpoints: source name plus listing URL.
    pub fn id(&self) -> String {
        format!("{}|{}", self.name, self.url)
    }

    /// Origin marker stored on every record from this source.
    pub fn origin(&self) -> String {
        format!("{}/{}", self.name, self.category)
    }
}

/// A named group of web sources with an optional cap on new items per run.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: &'static str,
    pub max_new: Option<usize>,
    pub sources: Vec<WebSource>,
}
