//! Mapping candidates and extracted fields onto [`IngestedRecord`]s.
//!
//! The normalizer is where every stored field gets its cap and its default:
//!
//! | Field | Cap | Default |
//! |-------|-----|---------|
//! | title / subject | [`TITLE_CAP`] chars | [`NO_SUBJECT`] for mail |
//! | preview | [`PREVIEW_CAP`] chars | empty |
//! | mail sender | [`SENDER_CAP`] chars | [`UNKNOWN_SENDER`] |
//! | timestamp | - | the run's `now` |
//!
//! Caps are hard character cuts, never word-aware. Web candidates with an
//! empty headline or link are rejected outright rather than defaulted.

use chrono::{DateTime, TimeZone, Utc};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use scraper::Html;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::extract::{ArticleDetails, split_paragraphs};
use crate::models::{CandidateItem, IngestedRecord, Payload};
use crate::sources::WebSource;
use crate::utils::{collapse_whitespace, truncate_chars};

pub const TITLE_CAP: usize = 200;
pub const PREVIEW_CAP: usize = 150;
pub const SENDER_CAP: usize = 100;

pub const UNKNOWN_SENDER: &str = "Unknown";
pub const NO_SUBJECT: &str = "(No Subject)";

/// Fields extracted from a raw RFC 822 message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageFields {
    pub from: Option<String>,
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl MessageFields {
    /// Parse headers and the first inline text and HTML parts of a message.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let mail = mailparse::parse_mail(raw)
            .map_err(|e| IngestError::Transport(format!("unparsable message: {e}")))?;

        let header = |name: &str| {
            mail.headers
                .get_first_value(name)
                .map(|v| collapse_whitespace(&v))
                .filter(|v| !v.is_empty())
        };

        let date = header("Date")
            .and_then(|d| mailparse::dateparse(&d).ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        let mut fields = MessageFields {
            from: header("From"),
            subject: header("Subject"),
            date,
            ..Default::default()
        };
        collect_bodies(&mail, &mut fields);
        Ok(fields)
    }
}

fn collect_bodies(part: &ParsedMail<'_>, fields: &mut MessageFields) {
    if part.get_content_disposition().disposition == DispositionType::Attachment {
        return;
    }
    if part.subparts.is_empty() {
        let slot = match part.ctype.mimetype.as_str() {
            "text/plain" => &mut fields.text,
            "text/html" => &mut fields.html,
            _ => return,
        };
        if slot.is_none() {
            *slot = part.get_body().ok().filter(|b| !b.trim().is_empty());
        }
        return;
    }
    for sub in &part.subparts {
        collect_bodies(sub, fields);
    }
}

/// Visible text of an HTML body, for previews of HTML-only messages.
fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    collapse_whitespace(&fragment.root_element().text().collect::<Vec<_>>().join(" "))
}

/// Build the record for a message candidate.
///
/// Messages are never rejected: every missing field has a default.
pub fn normalize_message(
    candidate: &CandidateItem,
    fields: &MessageFields,
    label: &str,
    now: DateTime<Utc>,
) -> IngestedRecord {
    let subject = fields.subject.as_deref().unwrap_or(NO_SUBJECT);
    let sender = fields.from.as_deref().unwrap_or(UNKNOWN_SENDER);

    let preview_source = match (&fields.text, &fields.html) {
        (Some(text), _) => collapse_whitespace(text),
        (None, Some(html)) => html_to_text(html),
        (None, None) => String::new(),
    };

    let content = fields
        .html
        .clone()
        .or_else(|| fields.text.clone())
        .unwrap_or_default();

    IngestedRecord {
        key: candidate.key.clone(),
        origin: candidate.origin.clone(),
        title: truncate_chars(subject, TITLE_CAP),
        preview: truncate_chars(&preview_source, PREVIEW_CAP),
        content,
        author: truncate_chars(sender, SENDER_CAP),
        link: None,
        image_url: None,
        category: Some(label.to_string()),
        published_at: fields.date.unwrap_or(now),
        automated: false,
    }
}

/// Build the record for an article candidate, or `None` when the candidate
/// has no headline or no link.
pub fn normalize_article(
    candidate: &CandidateItem,
    source: &WebSource,
    details: &ArticleDetails,
) -> Option<IngestedRecord> {
    let Payload::Link { title, url } = &candidate.payload else {
        debug!(key = %candidate.key, "Not a link candidate; rejecting");
        return None;
    };
    let title = collapse_whitespace(title);
    if title.is_empty() || url.trim().is_empty() {
        debug!(key = %candidate.key, "Empty title or link; rejecting");
        return None;
    }

    let lead = split_paragraphs(&details.summary)
        .into_iter()
        .next()
        .unwrap_or_default();

    Some(IngestedRecord {
        key: candidate.key.clone(),
        origin: candidate.origin.clone(),
        title: truncate_chars(&title, TITLE_CAP),
        preview: truncate_chars(lead, PREVIEW_CAP),
        content: details.summary.clone(),
        author: details.author.clone(),
        link: Some(
            details
                .canonical_url
                .clone()
                .unwrap_or_else(|| url.clone()),
        ),
        image_url: details.image_url.clone(),
        category: Some(source.category.to_string()),
        published_at: details.published_at,
        automated: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{NO_CONTENT, PARAGRAPH_DELIMITER};
    use crate::models::RecordKey;
    use crate::sources::folders::MailLabel;
    use crate::sources::news::registry;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-10-19T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn mail_candidate() -> CandidateItem {
        CandidateItem {
            key: RecordKey::mailbox(1, MailLabel::Inbox, 77),
            origin: "me@example.com/INBOX".into(),
            payload: Payload::Message { uid: 77, raw: Vec::new() },
        }
    }

    fn link_candidate(title: &str, url: &str) -> CandidateItem {
        CandidateItem {
            key: RecordKey::web(url),
            origin: "Reuters/Wars".into(),
            payload: Payload::Link {
                title: title.into(),
                url: url.into(),
            },
        }
    }

    fn reuters() -> WebSource {
        registry()
            .into_iter()
            .flat_map(|c| c.sources)
            .find(|s| s.name == "Reuters")
            .unwrap()
    }

    #[test]
    fn test_parse_multipart_message() {
        let raw = concat!(
            "From: \"Ana Lima\" <ana@example.com>\r\n",
            "Subject: Quarterly numbers\r\n",
            "Date: Sun, 18 Oct 2026 08:30:00 +0000\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/alternative; boundary=\"b1\"\r\n",
            "\r\n",
            "--b1\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "Numbers attached.\r\n",
            "--b1\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<p>Numbers <b>attached</b>.</p>\r\n",
            "--b1--\r\n",
        );
        let fields = MessageFields::parse(raw.as_bytes()).unwrap();
        assert_eq!(fields.subject.as_deref(), Some("Quarterly numbers"));
        assert!(fields.from.unwrap().contains("ana@example.com"));
        assert!(fields.text.unwrap().contains("Numbers attached."));
        assert!(fields.html.unwrap().contains("<b>attached</b>"));
        assert_eq!(fields.date.unwrap().to_rfc3339(), "2026-10-18T08:30:00+00:00");
    }

    #[test]
    fn test_message_defaults() {
        let record = normalize_message(&mail_candidate(), &MessageFields::default(), "INBOX", now());
        assert_eq!(record.title, NO_SUBJECT);
        assert_eq!(record.author, UNKNOWN_SENDER);
        assert_eq!(record.published_at, now());
        assert_eq!(record.content, "");
        assert_eq!(record.category.as_deref(), Some("INBOX"));
        assert!(!record.automated);
    }

    #[test]
    fn test_message_caps() {
        let fields = MessageFields {
            from: Some("x".repeat(180)),
            subject: Some("s".repeat(250)),
            text: Some("p".repeat(400)),
            ..Default::default()
        };
        let record = normalize_message(&mail_candidate(), &fields, "INBOX", now());
        assert_eq!(record.title, "s".repeat(200));
        assert_eq!(record.preview.chars().count(), PREVIEW_CAP);
        assert_eq!(record.author.chars().count(), SENDER_CAP);
        assert_eq!(record.content, "p".repeat(400));
    }

    #[test]
    fn test_html_only_message_previews_visible_text() {
        let fields = MessageFields {
            html: Some("<div><h1>Hello</h1>\n<p>there   friend</p></div>".into()),
            ..Default::default()
        };
        let record = normalize_message(&mail_candidate(), &fields, "INBOX", now());
        assert_eq!(record.preview, "Hello there friend");
        assert!(record.content.starts_with("<div>"));
    }

    #[test]
    fn test_article_title_is_hard_cut() {
        let title = format!("War {}", "x".repeat(246));
        assert_eq!(title.chars().count(), 250);
        let candidate = link_candidate(&title, "https://www.reuters.com/world/a");
        let record = normalize_article(
            &candidate,
            &reuters(),
            &ArticleDetails::fallback("Reuters", now()),
        )
        .unwrap();
        assert_eq!(record.title, title.chars().take(200).collect::<String>());
        assert_eq!(record.content, NO_CONTENT);
        assert_eq!(record.author, "Reuters");
        assert_eq!(record.category.as_deref(), Some("Wars"));
        assert!(record.automated);
    }

    #[test]
    fn test_article_preview_is_first_paragraph() {
        let details = ArticleDetails {
            summary: format!("First paragraph.{PARAGRAPH_DELIMITER}Second paragraph."),
            ..ArticleDetails::fallback("Reuters", now())
        };
        let candidate = link_candidate("Army announces truce", "https://www.reuters.com/world/b");
        let record = normalize_article(&candidate, &reuters(), &details).unwrap();
        assert_eq!(record.preview, "First paragraph.");
        assert_eq!(record.link.as_deref(), Some("https://www.reuters.com/world/b"));
    }

    #[test]
    fn test_article_prefers_canonical_link() {
        let details = ArticleDetails {
            canonical_url: Some("https://www.reuters.com/world/b-canonical".into()),
            ..ArticleDetails::fallback("Reuters", now())
        };
        let candidate = link_candidate("Army announces truce", "https://www.reuters.com/world/b?ref=x");
        let record = normalize_article(&candidate, &reuters(), &details).unwrap();
        assert_eq!(record.link.as_deref(), Some("https://www.reuters.com/world/b-canonical"));
        assert_eq!(record.key, RecordKey::web("https://www.reuters.com/world/b?ref=x"));
    }

    #[test]
    fn test_article_rejects_empty_title_or_link() {
        let details = ArticleDetails::fallback("Reuters", now());
        assert!(normalize_article(&link_candidate("   ", "https://x.test/a"), &reuters(), &details).is_none());
        assert!(normalize_article(&link_candidate("A real headline here", ""), &reuters(), &details).is_none());
        assert!(normalize_article(&mail_candidate(), &reuters(), &details).is_none());
    }
}
