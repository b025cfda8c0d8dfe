//! Data models shared by every stage of the ingestion pipeline.
//!
//! - [`RecordKey`]: the source-scoped identity of an item, used for novelty
//! - [`CandidateItem`]: an item observed while listing a source
//! - [`IngestedRecord`]: the normalized row written to the record store
//! - [`MailAccount`]: a mailbox account row, including its encrypted password
//!
//! Keys are built only through the constructors on [`RecordKey`] so that the
//! same underlying item always maps to the same key, run after run.

use chrono::{DateTime, Utc};

use crate::sources::folders::MailLabel;

/// Scope used for every web article. Links are unique across all news
/// sources, so a story linked from two listings is stored once.
pub const WEB_SCOPE: &str = "web";

/// The source-scoped unique key of an item.
///
/// `scope` names the addressing scheme the `item_key` is unique within:
/// IMAP UIDs are only unique inside one mailbox, so mail scopes carry the
/// account id and the logical label; web links are absolute URLs and share
/// the single [`WEB_SCOPE`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub scope: String,
    pub item_key: String,
}

impl RecordKey {
    /// Key for a message identified by `uid` inside `label` of an account.
    pub fn mailbox(account_id: i64, label: MailLabel, uid: u32) -> Self {
        Self {
            scope: format!("mail:{}:{}", account_id, label.as_str()),
            item_key: uid.to_string(),
        }
    }

    /// Key for a web article identified by its resolved absolute link.
    pub fn web(link: &str) -> Self {
        Self {
            scope: WEB_SCOPE.to_string(),
            item_key: link.to_string(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.scope, self.item_key)
    }
}

/// Raw content carried by a candidate, depending on the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Full RFC 822 bytes of a message, as fetched over IMAP.
    Message { uid: u32, raw: Vec<u8> },
    /// A headline found on a listing page and the absolute link it points to.
    Link { title: String, url: String },
}

/// One unit fetched from a source before novelty filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateItem {
    pub key: RecordKey,
    /// Origin marker, e.g. `alice@example.com/SENT` or `Reuters/Wars`.
    pub origin: String,
    pub payload: Payload,
}

/// The normalized, persisted unit.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedRecord {
    pub key: RecordKey,
    pub origin: String,
    /// Subject or headline, capped at [`crate::normalize::TITLE_CAP`] chars.
    pub title: String,
    /// Short plain-text preview, capped at [`crate::normalize::PREVIEW_CAP`] chars.
    pub preview: String,
    /// Full body: message HTML/text, or the delimited article summary.
    pub content: String,
    pub author: String,
    pub link: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub published_at: DateTime<Utc>,
    /// Set for items produced by the scraper rather than a human's mailbox.
    pub automated: bool,
}

/// A mailbox account as stored in the `mail_accounts` table.
#[derive(Debug, Clone, PartialEq)]
pub struct MailAccount {
    pub id: i64,
    pub email: String,
    pub host: String,
    pub port: u16,
    /// Hex-encoded AES-256-CBC ciphertext of the account password.
    pub encrypted_password: String,
    /// Hex-encoded initialization vector for `encrypted_password`.
    pub iv: String,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_keys_are_scoped_by_label() {
        let inbox = RecordKey::mailbox(7, MailLabel::Inbox, 42);
        let sent = RecordKey::mailbox(7, MailLabel::Sent, 42);
        assert_ne!(inbox, sent);
        assert_eq!(inbox.scope, "mail:7:INBOX");
        assert_eq!(inbox.item_key, "42");
    }

    #[test]
    fn test_mailbox_keys_are_stable() {
        assert_eq!(
            RecordKey::mailbox(1, MailLabel::Trash, 9),
            RecordKey::mailbox(1, MailLabel::Trash, 9)
        );
    }

    #[test]
    fn test_web_keys_share_scope() {
        let key = RecordKey::web("https://www.bbc.com/news/articles/abc");
        assert_eq!(key.scope, WEB_SCOPE);
        assert_eq!(key.to_string(), "web#https://www.bbc.com/news/articles/abc");
    }
}
