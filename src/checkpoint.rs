//! Checkpoint and cooldown state.
//!
//! Checkpoints record when a source last completed successfully and when a
//! mail account was last synced. They serve two purposes:
//!
//! - **Display**: operators can see how stale each source is
//! - **Cooldown gating**: a metered source whose last success is younger
//!   than the cooldown window is skipped before any network call
//!
//! State is held behind the [`StateStore`] trait so the engine never touches
//! process-wide globals. [`JsonFileState`] persists to a small JSON file; a
//! missing or corrupt file is read as "no prior state", which makes every
//! metered source eligible again rather than failing the run.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};

/// Default cooldown for metered sources.
pub const DEFAULT_COOLDOWN_HOURS: i64 = 24;

/// Key/value persistence for checkpoint timestamps.
pub trait StateStore {
    fn get(&self, key: &str) -> Option<DateTime<Utc>>;
    async fn set(&mut self, key: &str, at: DateTime<Utc>) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    entries: BTreeMap<String, DateTime<Utc>>,
}

/// [`StateStore`] backed by a JSON file, rewritten on every update.
#[derive(Debug)]
pub struct JsonFileState {
    path: PathBuf,
    state: StateFile,
}

impl JsonFileState {
    /// Load state from `path`.
    ///
    /// A missing, unreadable or unparsable file yields empty state; the file
    /// is recreated on the first successful update.
    pub async fn load(path: &Path) -> Self {
        let state = match fs::read_to_string(path).await {
            Ok(body) => match serde_json::from_str::<StateFile>(&body) {
                Ok(state) => {
                    info!(path = %path.display(), entries = state.entries.len(), "Loaded checkpoint state");
                    state
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Checkpoint file unreadable; starting without prior state");
                    StateFile::default()
                }
            },
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No checkpoint file; starting without prior state");
                StateFile::default()
            }
        };
        Self {
            path: path.to_path_buf(),
            state,
        }
    }

    async fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| IngestError::Persistence(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        let written = match fs::write(&tmp, json).await {
            Ok(()) => fs::rename(&tmp, &self.path).await,
            Err(e) => Err(e),
        };
        written.map_err(|e| IngestError::Persistence(format!("writing {}: {e}", self.path.display())))
    }
}

impl StateStore for JsonFileState {
    fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        self.state.entries.get(key).copied()
    }

    async fn set(&mut self, key: &str, at: DateTime<Utc>) -> Result<()> {
        self.state.entries.insert(key.to_string(), at);
        self.persist().await
    }
}

/// In-memory [`StateStore`] for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryState {
    pub entries: std::collections::HashMap<String, DateTime<Utc>>,
}

#[cfg(test)]
impl StateStore for MemoryState {
    fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).copied()
    }

    async fn set(&mut self, key: &str, at: DateTime<Utc>) -> Result<()> {
        self.entries.insert(key.to_string(), at);
        Ok(())
    }
}

/// Cooldown policy and checkpoint bookkeeping over a [`StateStore`].
#[derive(Debug)]
pub struct Checkpoints<S> {
    store: S,
    cooldown: Duration,
}

impl<S: StateStore> Checkpoints<S> {
    pub fn new(store: S, cooldown: Duration) -> Self {
        Self { store, cooldown }
    }

    fn source_key(source_id: &str) -> String {
        format!("source:{source_id}")
    }

    fn account_key(account_id: i64) -> String {
        format!("account:{account_id}")
    }

    pub fn last_success(&self, source_id: &str) -> Option<DateTime<Utc>> {
        self.store.get(&Self::source_key(source_id))
    }

    /// True when the source succeeded less than one cooldown window ago.
    ///
    /// Only metered sources are gated; callers do not consult this for
    /// unmetered ones. A source with no recorded success is never cooled down.
    pub fn is_cooled_down(&self, source_id: &str, now: DateTime<Utc>) -> bool {
        match self.last_success(source_id) {
            Some(last) => now.signed_duration_since(last) < self.cooldown,
            None => false,
        }
    }

    pub async fn record_success(&mut self, source_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.store.set(&Self::source_key(source_id), now).await
    }

    pub fn account_marker(&self, account_id: i64) -> Option<DateTime<Utc>> {
        self.store.get(&Self::account_key(account_id))
    }

    pub async fn advance_account_marker(
        &mut self,
        account_id: i64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.store.set(&Self::account_key(account_id), now).await
    }
}
