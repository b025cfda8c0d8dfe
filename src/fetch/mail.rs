//! Mailbox session adapter.
//!
//! [`MailTransport`] opens an authenticated [`MailSession`]; the functions in
//! this module drive that session for one logical label at a time:
//!
//! 1. open the first container for the label that exists ([`open_label`])
//! 2. search UIDs received within the recency window
//! 3. keep the most recent `label.item_cap()` UIDs (highest first)
//! 4. fetch those messages and wrap them as candidates
//!
//! UIDs are only compared within one container, so ordering by UID is
//! ordering by arrival.

use chrono::{Days, NaiveDate};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

use crate::error::{IngestError, Result};
use crate::models::{CandidateItem, MailAccount, Payload, RecordKey};
use crate::sources::folders::{MailLabel, ProviderFamily, containers_for};

/// Messages received within this many days are considered.
pub const DEFAULT_WINDOW_DAYS: u64 = 5;

/// Opens authenticated sessions against an account's server.
pub trait MailTransport {
    type Session: MailSession;

    async fn connect(&self, account: &MailAccount, password: &str) -> Result<Self::Session>;
}

/// One authenticated mailbox session.
pub trait MailSession {
    /// Select `container` for reading.
    ///
    /// Fails with [`IngestError::ContainerNotFound`] when the server has no
    /// such container, so callers can try the next name.
    async fn open(&mut self, container: &str) -> Result<()>;

    /// UIDs of messages in the open container received on or after `since`.
    async fn search_since(&mut self, since: NaiveDate) -> Result<Vec<u32>>;

    /// Raw RFC 822 bytes for each UID the server returns.
    async fn fetch(&mut self, uids: &[u32]) -> Result<Vec<(u32, Vec<u8>)>>;

    async fn close(self) -> Result<()>;
}

/// Messages found for one label.
#[derive(Debug)]
pub struct MailboxListing {
    /// The concrete container that was opened.
    pub container: &'static str,
    /// Most recent first.
    pub candidates: Vec<CandidateItem>,
}

/// Open the first container for `label` the server knows about.
///
/// # Returns
///
/// The container name that was opened.
///
/// # Errors
///
/// [`IngestError::ContainerNotFound`] when every name is missing; any other
/// error stops the fallback immediately.
pub async fn open_label<S: MailSession>(
    session: &mut S,
    family: ProviderFamily,
    label: MailLabel,
) -> Result<&'static str> {
    for &name in containers_for(family, label) {
        match session.open(name).await {
            Ok(()) => return Ok(name),
            Err(IngestError::ContainerNotFound(reason)) => {
                debug!(container = name, %reason, "Container missing; trying next name");
            }
            Err(e) => return Err(e),
        }
    }
    Err(IngestError::ContainerNotFound(format!(
        "no container for {} ({family:?})",
        label.as_str()
    )))
}

/// List candidate messages for one label of an account.
#[instrument(level = "info", skip_all, fields(account = %account.email, label = label.as_str()))]
pub async fn list_candidates<S: MailSession>(
    session: &mut S,
    account: &MailAccount,
    family: ProviderFamily,
    label: MailLabel,
    window_days: u64,
    today: NaiveDate,
) -> Result<MailboxListing> {
    let container = open_label(session, family, label).await?;

    let since = today.checked_sub_days(Days::new(window_days)).unwrap_or(today);
    let mut uids = session.search_since(since).await?;
    let found = uids.len();
    uids.sort_unstable_by(|a, b| b.cmp(a));
    uids.dedup();
    uids.truncate(label.item_cap());

    let mut raw: HashMap<u32, Vec<u8>> = if uids.is_empty() {
        HashMap::new()
    } else {
        session.fetch(&uids).await?.into_iter().collect()
    };

    let origin = format!("{}/{}", account.email, label.as_str());
    let candidates: Vec<CandidateItem> = uids
        .iter()
        .filter_map(|&uid| {
            let Some(body) = raw.remove(&uid) else {
                warn!(uid, "Server returned no body for UID");
                return None;
            };
            Some(CandidateItem {
                key: RecordKey::mailbox(account.id, label, uid),
                origin: origin.clone(),
                payload: Payload::Message { uid, raw: body },
            })
        })
        .collect();

    info!(
        container,
        %since,
        found,
        listed = candidates.len(),
        "Listed mailbox"
    );
    Ok(MailboxListing {
        container,
        candidates,
    })
}

/// Scripted [`MailTransport`] and [`MailSession`] for tests.
#[cfg(test)]
pub mod fake {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashSet};
    use std::rc::Rc;

    /// Shared view of what a fake session did.
    #[derive(Debug, Default)]
    pub struct Journal {
        pub opened: Vec<String>,
        pub searched_since: Vec<NaiveDate>,
        pub fetched: Vec<Vec<u32>>,
        pub closed: bool,
    }

    /// One fake server: containers with `uid -> raw message`.
    #[derive(Debug, Clone, Default)]
    pub struct FakeServer {
        pub containers: BTreeMap<String, BTreeMap<u32, Vec<u8>>>,
        /// Containers whose search fails with a transport error.
        pub broken: HashSet<String>,
        /// Refuse to connect at all.
        pub unreachable: bool,
        pub journal: Rc<RefCell<Journal>>,
    }

    impl FakeServer {
        pub fn with_container(mut self, name: &str, uids: impl IntoIterator<Item = u32>) -> Self {
            let messages = uids
                .into_iter()
                .map(|uid| (uid, message(&format!("Message {uid}"))))
                .collect();
            self.containers.insert(name.to_string(), messages);
            self
        }
    }

    pub fn message(subject: &str) -> Vec<u8> {
        format!(
            "From: Sender <sender@example.com>\r\nSubject: {subject}\r\nContent-Type: text/plain\r\n\r\nBody of {subject}\r\n"
        )
        .into_bytes()
    }

    #[derive(Debug)]
    pub struct FakeSession {
        server: FakeServer,
        open: Option<String>,
    }

    impl MailSession for FakeSession {
        async fn open(&mut self, container: &str) -> Result<()> {
            self.server.journal.borrow_mut().opened.push(container.to_string());
            if self.server.containers.contains_key(container) {
                self.open = Some(container.to_string());
                Ok(())
            } else {
                Err(IngestError::ContainerNotFound(container.to_string()))
            }
        }

        async fn search_since(&mut self, since: NaiveDate) -> Result<Vec<u32>> {
            self.server.journal.borrow_mut().searched_since.push(since);
            let name = self.open.clone().unwrap_or_default();
            if self.server.broken.contains(&name) {
                return Err(IngestError::Transport(format!("search failed in {name}")));
            }
            Ok(self.server.containers[&name].keys().copied().collect())
        }

        async fn fetch(&mut self, uids: &[u32]) -> Result<Vec<(u32, Vec<u8>)>> {
            self.server.journal.borrow_mut().fetched.push(uids.to_vec());
            let name = self.open.clone().unwrap_or_default();
            let container = &self.server.containers[&name];
            Ok(uids
                .iter()
                .filter_map(|uid| container.get(uid).map(|raw| (*uid, raw.clone())))
                .collect())
        }

        async fn close(self) -> Result<()> {
            self.server.journal.borrow_mut().closed = true;
            Ok(())
        }
    }

    /// Transport serving one [`FakeServer`] per account id.
    #[derive(Debug, Default)]
    pub struct FakeTransport {
        pub servers: HashMap<i64, FakeServer>,
    }

    impl MailTransport for FakeTransport {
        type Session = FakeSession;

        async fn connect(&self, account: &MailAccount, _password: &str) -> Result<FakeSession> {
            match self.servers.get(&account.id) {
                Some(server) if !server.unreachable => Ok(FakeSession {
                    server: server.clone(),
                    open: None,
                }),
                _ => Err(IngestError::Transport(format!("cannot reach {}", account.host))),
            }
        }
    }
}
