//! Durable record and account storage.
//!
//! Two logical tables back the engine:
//!
//! - `records`: one row per ingested item, unique on `(scope, item_key)`
//! - `mail_accounts`: IMAP accounts with encrypted credentials and the
//!   last-synced marker
//!
//! The engine only sees the [`RecordStore`] and [`AccountStore`] traits.
//! [`SqliteStore`] implements both on a local SQLite file.
//!
//! # Duplicate safety
//!
//! Novelty is checked with [`RecordStore::contains`] before the expensive
//! detail fetch, but that lookup is only an optimization. The write itself is
//! [`RecordStore::insert_if_absent`], an `INSERT OR IGNORE` guarded by the
//! table's uniqueness constraint, so two overlapping runs can never both
//! store the same key.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::error::{IngestError, Result};
use crate::models::{IngestedRecord, MailAccount, RecordKey};

/// IMAP-over-TLS port used when an account row leaves it empty.
pub const DEFAULT_IMAP_PORT: u16 = 993;

pub trait RecordStore {
    /// True when a record with this key has already been stored.
    fn contains(&self, key: &RecordKey) -> Result<bool>;

    /// Store `record` unless its key is already present.
    ///
    /// Returns `true` if a row was written, `false` if the key already existed.
    fn insert_if_absent(&self, record: &IngestedRecord) -> Result<bool>;
}

pub trait AccountStore {
    /// Every stored account, in id order.
    ///
    /// The outer error means the table could not be read at all; an inner
    /// error is one row that could not be mapped and leaves the others usable.
    fn list_accounts(&self) -> Result<Vec<Result<MailAccount>>>;
    fn mark_synced(&self, account_id: i64, at: DateTime<Utc>) -> Result<()>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    scope         TEXT NOT NULL,
    item_key      TEXT NOT NULL,
    origin        TEXT NOT NULL,
    title         TEXT NOT NULL,
    preview       TEXT NOT NULL,
    content       TEXT NOT NULL,
    author        TEXT NOT NULL,
    link          TEXT,
    image_url     TEXT,
    category      TEXT,
    published_at  TEXT NOT NULL,
    automated     INTEGER NOT NULL DEFAULT 0,
    ingested_at   TEXT NOT NULL,
    UNIQUE (scope, item_key)
);

CREATE TABLE IF NOT EXISTS mail_accounts (
    id                  INTEGER PRIMARY KEY,
    email               TEXT NOT NULL,
    host                TEXT NOT NULL,
    port                INTEGER,
    encrypted_password  TEXT NOT NULL,
    iv                  TEXT NOT NULL,
    last_synced_at      TEXT
);
";

/// SQLite-backed [`RecordStore`] and [`AccountStore`].
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        let store = Self::with_connection(conn)?;
        info!("Opened record store");
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn insert_account(&self, account: &MailAccount) -> Result<()> {
        self.conn.execute(
            "INSERT INTO mail_accounts (id, email, host, port, encrypted_password, iv, last_synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                account.id,
                account.email,
                account.host,
                account.port,
                account.encrypted_password,
                account.iv,
                account.last_synced_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Run raw SQL against the store, for seeding malformed rows.
    #[cfg(test)]
    pub fn execute_sql(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Accounts that mapped cleanly.
    #[cfg(test)]
    pub fn valid_accounts(&self) -> Vec<MailAccount> {
        self.list_accounts()
            .map(|rows| rows.into_iter().flatten().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn count_records(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?)
    }
}

/// Parse a stored timestamp, accepting RFC 3339 and SQLite's
/// `CURRENT_TIMESTAMP` format.
fn parse_stored_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

impl RecordStore for SqliteStore {
    fn contains(&self, key: &RecordKey) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM records WHERE scope = ?1 AND item_key = ?2",
                params![key.scope, key.item_key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_if_absent(&self, record: &IngestedRecord) -> Result<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO records (
                scope, item_key, origin, title, preview, content, author,
                link, image_url, category, published_at, automated, ingested_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                record.key.scope,
                record.key.item_key,
                record.origin,
                record.title,
                record.preview,
                record.content,
                record.author,
                record.link,
                record.image_url,
                record.category,
                record.published_at.to_rfc3339(),
                record.automated,
                Utc::now().to_rfc3339(),
            ],
        )?;
        debug!(key = %record.key, inserted = changed > 0, "Record insert");
        Ok(changed > 0)
    }
}

impl AccountStore for SqliteStore {
    fn list_accounts(&self) -> Result<Vec<Result<MailAccount>>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, host, port, encrypted_password, iv, last_synced_at
             FROM mail_accounts ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            let port: Option<i64> = row.get(3)?;
            let last: Option<String> = row.get(6)?;
            Ok(MailAccount {
                id: row.get(0)?,
                email: row.get(1)?,
                host: row.get(2)?,
                port: port
                    .and_then(|p| u16::try_from(p).ok())
                    .filter(|p| *p != 0)
                    .unwrap_or(DEFAULT_IMAP_PORT),
                encrypted_password: row.get(4)?,
                iv: row.get(5)?,
                last_synced_at: last.as_deref().and_then(parse_stored_time),
            })
        })?;
        Ok(rows.map(|row| row.map_err(IngestError::from)).collect())
    }

    fn mark_synced(&self, account_id: i64, at: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "UPDATE mail_accounts SET last_synced_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), account_id],
        )?;
        Ok(())
    }
}

/// In-memory [`RecordStore`] for tests, with optional injected failures.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryRecords {
    pub records: std::cell::RefCell<Vec<IngestedRecord>>,
    /// Item keys whose insert fails with a persistence error.
    pub fail_on: std::collections::HashSet<String>,
    pub lookups: std::cell::Cell<usize>,
}

#[cfg(test)]
impl MemoryRecords {
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn titles(&self) -> Vec<String> {
        self.records.borrow().iter().map(|r| r.title.clone()).collect()
    }
}

#[cfg(test)]
impl RecordStore for MemoryRecords {
    fn contains(&self, key: &RecordKey) -> Result<bool> {
        self.lookups.set(self.lookups.get() + 1);
        Ok(self.records.borrow().iter().any(|r| &r.key == key))
    }

    fn insert_if_absent(&self, record: &IngestedRecord) -> Result<bool> {
        if self.fail_on.contains(&record.key.item_key) {
            return Err(crate::error::IngestError::Persistence(format!(
                "injected failure for {}",
                record.key
            )));
        }
        if self.records.borrow().iter().any(|r| r.key == record.key) {
            return Ok(false);
        }
        self.records.borrow_mut().push(record.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::folders::MailLabel;

    fn record(key: RecordKey, title: &str) -> IngestedRecord {
        IngestedRecord {
            key,
            origin: "test".into(),
            title: title.into(),
            preview: String::new(),
            content: String::new(),
            author: "Unknown".into(),
            link: None,
            image_url: None,
            category: None,
            published_at: Utc::now(),
            automated: false,
        }
    }

    fn account(id: i64) -> MailAccount {
        MailAccount {
            id,
            email: format!("user{id}@example.com"),
            host: "imap.example.com".into(),
            port: 993,
            encrypted_password: "00".into(),
            iv: "00".into(),
            last_synced_at: None,
        }
    }

    #[test]
    fn test_insert_if_absent_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let key = RecordKey::web("https://example.com/a");
        assert!(!store.contains(&key).unwrap());
        assert!(store.insert_if_absent(&record(key.clone(), "first")).unwrap());
        assert!(store.contains(&key).unwrap());
        assert!(!store.insert_if_absent(&record(key, "second")).unwrap());
        assert_eq!(store.count_records().unwrap(), 1);
    }

    #[test]
    fn test_same_uid_in_different_labels_is_distinct() {
        let store = SqliteStore::open_in_memory().unwrap();
        let inbox = RecordKey::mailbox(1, MailLabel::Inbox, 5);
        let sent = RecordKey::mailbox(1, MailLabel::Sent, 5);
        assert!(store.insert_if_absent(&record(inbox, "a")).unwrap());
        assert!(store.insert_if_absent(&record(sent, "b")).unwrap());
        assert_eq!(store.count_records().unwrap(), 2);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ingest.db");
        let key = RecordKey::web("https://example.com/b");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_if_absent(&record(key.clone(), "b")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.contains(&key).unwrap());
    }

    #[test]
    fn test_accounts_round_trip_and_mark_synced() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_account(&account(2)).unwrap();
        store.insert_account(&account(1)).unwrap();

        let accounts = store.valid_accounts();
        assert_eq!(accounts.iter().map(|a| a.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(accounts[0].last_synced_at.is_none());

        let at = DateTime::parse_from_rfc3339("2026-10-19T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        store.mark_synced(1, at).unwrap();
        let accounts = store.valid_accounts();
        assert_eq!(accounts[0].last_synced_at, Some(at));
    }

    #[test]
    fn test_missing_port_defaults_to_imaps() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO mail_accounts (id, email, host, port, encrypted_password, iv, last_synced_at)
                 VALUES (9, 'a@b.c', 'imap.b.c', NULL, 'x', 'y', '2026-10-18 07:00:00')",
                [],
            )
            .unwrap();
        let accounts = store.valid_accounts();
        assert_eq!(accounts[0].port, DEFAULT_IMAP_PORT);
        assert_eq!(
            accounts[0].last_synced_at.unwrap().to_rfc3339(),
            "2026-10-18T07:00:00+00:00"
        );
    }

    #[test]
    fn test_bad_account_row_does_not_hide_others() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_account(&account(1)).unwrap();
        store
            .conn
            .execute(
                "INSERT INTO mail_accounts (id, email, host, port, encrypted_password, iv)
                 VALUES (2, 'b@example.com', 'imap.example.com', 'imaps', 'x', 'y')",
                [],
            )
            .unwrap();
        store.insert_account(&account(3)).unwrap();

        let rows = store.list_accounts().unwrap();
        assert_eq!(rows.len(), 3);
        assert!(matches!(rows[1], Err(IngestError::Persistence(_))));
        let ids: Vec<i64> = rows.iter().flatten().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
}
