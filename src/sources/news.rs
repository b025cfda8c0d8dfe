//! The news source registry.
//!
//! Each [`Category`] groups listing pages that feed the same section. Page
//! markup changes often, so every source carries several headline locators:
//! current markup first, older markup after.
//!
//! | Category | Sources |
//! |----------|---------|
//! | Mixed | AllSides, The Guardian |
//! | Wars | BBC World, Reuters, Al Jazeera, CNN |
//! | AI | TechCrunch, The Verge |
//! | Tech | Ars Technica, Wired |
//!
//! The Guardian and BBC World are high-importance sources and may contribute
//! up to [`HIGH_IMPORTANCE_ITEM_CAP`] new items per run; the rest take
//! [`DEFAULT_ITEM_CAP`].

use super::{Category, DEFAULT_ITEM_CAP, HIGH_IMPORTANCE_ITEM_CAP, WebSource};

/// Build the full registry, in processing order.
pub fn registry() -> Vec<Category> {
    vec![
        Category {
            name: "Mixed",
            max_new: None,
            sources: vec![
                WebSource {
                    name: "AllSides",
                    category: "Mixed",
                    url: "https://www.allsides.com/headline-roundups",
                    base: "https://www.allsides.com",
                    selectors: &[".news-title a", "h2 a"],
                    keywords: &["politics", "news", "world", "election"],
                    metered: true,
                    item_cap: DEFAULT_ITEM_CAP,
                },
                WebSource {
                    name: "The Guardian",
                    category: "Mixed",
                    url: "https://www.theguardian.com/world",
                    base: "https://www.theguardian.com",
                    selectors: &[".fc-item__title a", "h3 a", "[data-link-name=\"article\"]"],
                    keywords: &["politics", "crisis", "un", "treaty", "world"],
                    metered: false,
                    item_cap: HIGH_IMPORTANCE_ITEM_CAP,
                },
            ],
        },
        Category {
            name: "Wars",
            max_new: Some(8),
            sources: vec![
                WebSource {
                    name: "BBC World",
                    category: "Wars",
                    url: "https://www.bbc.com/news/world",
                    base: "https://www.bbc.com",
                    selectors: &[
                        "[data-testid=\"card-headline\"]",
                        "h2[data-testid=\"card-headline\"]",
                    ],
                    keywords: &["war", "conflict", "missile", "attack", "gaza", "ukraine", "russia"],
                    metered: false,
                    item_cap: HIGH_IMPORTANCE_ITEM_CAP,
                },
                WebSource {
                    name: "Reuters",
                    category: "Wars",
                    url: "https://www.reuters.com/world/",
                    base: "https://www.reuters.com",
                    selectors: &["[data-testid=\"Heading\"] a", ".story-card a", "h3 a"],
                    keywords: &["war", "military", "strike", "army", "truce"],
                    metered: true,
                    item_cap: DEFAULT_ITEM_CAP,
                },
                WebSource {
                    name: "Al Jazeera",
                    category: "Wars",
                    url: "https://www.aljazeera.com/where/middle-east/",
                    base: "https://www.aljazeera.com",
                    selectors: &["h3.gc__title a", ".article-card__title a"],
                    keywords: &["war", "bomb", "killed", "strike"],
                    metered: true,
                    item_cap: DEFAULT_ITEM_CAP,
                },
                WebSource {
                    name: "CNN",
                    category: "Wars",
                    url: "https://edition.cnn.com/world",
                    base: "https://edition.cnn.com",
                    selectors: &[".container__headline-text", ".cd__headline-text"],
                    keywords: &["war", "conflict"],
                    metered: false,
                    item_cap: DEFAULT_ITEM_CAP,
                },
            ],
        },
        Category {
            name: "AI",
            max_new: None,
            sources: vec![
                WebSource {
                    name: "TechCrunch",
                    category: "AI",
                    url: "https://techcrunch.com/category/artificial-intelligence/",
                    base: "https://techcrunch.com",
                    selectors: &["h2.post-block__title a", ".loop-card__title a"],
                    keywords: &["ai", "gpt", "openai", "llm", "model"],
                    metered: false,
                    item_cap: DEFAULT_ITEM_CAP,
                },
                WebSource {
                    name: "The Verge",
                    category: "AI",
                    url: "https://www.theverge.com/ai-artificial-intelligence",
                    base: "https://www.theverge.com",
                    selectors: &["h2 a", ".duet--content-cards--content-card_headline"],
                    keywords: &["ai", "chatgpt", "google", "gemini"],
                    metered: false,
                    item_cap: DEFAULT_ITEM_CAP,
                },
            ],
        },
        Category {
            name: "Tech",
            max_new: None,
            sources: vec![
                WebSource {
                    name: "Ars Technica",
                    category: "Tech",
                    url: "https://arstechnica.com/gadgets/",
                    base: "https://arstechnica.com",
                    selectors: &["h2 a", ".article-overlay a"],
                    keywords: &["review", "apple", "chip", "android"],
                    metered: false,
                    item_cap: DEFAULT_ITEM_CAP,
                },
                WebSource {
                    name: "Wired",
                    category: "Tech",
                    url: "https://www.wired.com/category/gear/",
                    base: "https://www.wired.com",
                    selectors: &[
                        ".SummaryItemHedLink-civMjp",
                        "h3.SummaryItemHedBase-hiCrND",
                        "a.SummaryItemHedLink-civMjp",
                    ],
                    keywords: &["gear", "phone", "laptop"],
                    metered: true,
                    item_cap: DEFAULT_ITEM_CAP,
                },
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Selector;
    use std::collections::HashSet;

    #[test]
    fn test_every_selector_parses() {
        for category in registry() {
            for source in &category.sources {
                for sel in source.selectors {
                    assert!(Selector::parse(sel).is_ok(), "{}: {}", source.name, sel);
                }
            }
        }
    }

    #[test]
    fn test_source_ids_are_unique() {
        let mut seen = HashSet::new();
        for category in registry() {
            for source in &category.sources {
                assert!(seen.insert(source.id()), "duplicate id {}", source.id());
            }
        }
    }

    #[test]
    fn test_sources_match_their_category() {
        for category in registry() {
            for source in &category.sources {
                assert_eq!(source.category, category.name);
                assert!(!source.keywords.is_empty());
                assert!(url::Url::parse(source.base).is_ok());
            }
        }
    }

    #[test]
    fn test_high_importance_sources_take_more_items() {
        let sources: Vec<WebSource> = registry().into_iter().flat_map(|c| c.sources).collect();
        let high: Vec<&str> = sources
            .iter()
            .filter(|s| s.item_cap == HIGH_IMPORTANCE_ITEM_CAP)
            .map(|s| s.name)
            .collect();
        assert_eq!(high, vec!["The Guardian", "BBC World"]);
        assert!(
            sources
                .iter()
                .all(|s| s.item_cap == DEFAULT_ITEM_CAP || s.item_cap == HIGH_IMPORTANCE_ITEM_CAP)
        );
    }
}
