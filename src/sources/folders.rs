//! Provider-family mailbox naming.
//!
//! IMAP servers disagree on what the sent, drafts and trash folders are
//! called. The engine only ever talks about logical [`MailLabel`]s; this
//! table turns a `(ProviderFamily, MailLabel)` pair into an ordered list of
//! concrete container names. The first name is tried first; later names are
//! fallbacks used only when the server reports the earlier one missing.
//!
//! | Family | SENT | DRAFTS | TRASH |
//! |--------|------|--------|-------|
//! | Gmail | `[Gmail]/Sent Mail` | `[Gmail]/Drafts` | `[Gmail]/Trash`, `[Gmail]/Bin` |
//! | Outlook | `Sent Items` | `Drafts` | `Deleted Items`, `Trash` |
//! | Generic | `Sent` | `Drafts` | `Trash`, `Bin` |
//!
//! Adding a provider is a matter of adding rows, never branches.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Logical mailbox label, independent of any provider's naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailLabel {
    Inbox,
    Sent,
    Drafts,
    Trash,
}

impl MailLabel {
    /// Every label, in the order an account is synced.
    pub const ALL: [MailLabel; 4] = [
        MailLabel::Inbox,
        MailLabel::Sent,
        MailLabel::Drafts,
        MailLabel::Trash,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MailLabel::Inbox => "INBOX",
            MailLabel::Sent => "SENT",
            MailLabel::Drafts => "DRAFTS",
            MailLabel::Trash => "TRASH",
        }
    }

    /// Maximum number of most-recent messages examined per run.
    pub fn item_cap(self) -> usize {
        match self {
            MailLabel::Inbox | MailLabel::Sent => 10,
            MailLabel::Drafts | MailLabel::Trash => 5,
        }
    }
}

/// Family of IMAP providers sharing a folder naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderFamily {
    Gmail,
    Outlook,
    Generic,
}

impl ProviderFamily {
    /// Guess the provider family from the IMAP host name.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// assert_eq!(ProviderFamily::detect("imap.gmail.com"), ProviderFamily::Gmail);
    /// assert_eq!(ProviderFamily::detect("mail.example.org"), ProviderFamily::Generic);
    /// ```
    pub fn detect(host: &str) -> Self {
        let host = host.to_ascii_lowercase();
        if host.contains("gmail") || host.contains("googlemail") {
            ProviderFamily::Gmail
        } else if ["outlook", "office365", "hotmail", "live.com"]
            .iter()
            .any(|h| host.contains(h))
        {
            ProviderFamily::Outlook
        } else {
            ProviderFamily::Generic
        }
    }
}

type FolderTable = HashMap<(ProviderFamily, MailLabel), &'static [&'static str]>;

static FOLDERS: Lazy<FolderTable> = Lazy::new(|| {
    use MailLabel::*;
    use ProviderFamily::*;

    let rows: [((ProviderFamily, MailLabel), &'static [&'static str]); 12] = [
        ((Gmail, Inbox), &["INBOX"]),
        ((Gmail, Sent), &["[Gmail]/Sent Mail"]),
        ((Gmail, Drafts), &["[Gmail]/Drafts"]),
        ((Gmail, Trash), &["[Gmail]/Trash", "[Gmail]/Bin"]),
        ((Outlook, Inbox), &["INBOX"]),
        ((Outlook, Sent), &["Sent Items"]),
        ((Outlook, Drafts), &["Drafts"]),
        ((Outlook, Trash), &["Deleted Items", "Trash"]),
        ((Generic, Inbox), &["INBOX"]),
        ((Generic, Sent), &["Sent"]),
        ((Generic, Drafts), &["Drafts"]),
        ((Generic, Trash), &["Trash", "Bin"]),
    ];
    rows.into_iter().collect()
});

/// Concrete container names for a logical label, primary name first.
///
/// Returns an empty slice for a pair missing from the table, which the
/// session adapter treats the same as "every name missing".
pub fn containers_for(family: ProviderFamily, label: MailLabel) -> &'static [&'static str] {
    FOLDERS.get(&(family, label)).copied().unwrap_or(&[])
}
