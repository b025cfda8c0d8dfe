//! The mail job: every stored account, every logical label.
//!
//! ```text
//! decrypt → connect → { INBOX, SENT, DRAFTS, TRASH } → close → advance marker
//! ```
//!
//! A password that cannot be decrypted, or a server that cannot be reached,
//! skips the account. Once connected, labels fail independently and the
//! account's sync marker is advanced even when some labels failed.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::checkpoint::{Checkpoints, StateStore};
use crate::credentials::Decryptor;
use crate::error::{IngestError, Result};
use crate::fetch::mail::{MailSession, MailTransport, list_candidates};
use crate::models::{MailAccount, Payload};
use crate::normalize::{MessageFields, normalize_message};
use crate::orchestrator::{Novelty, RunStats, check_novelty, persist};
use crate::sources::folders::{MailLabel, ProviderFamily};
use crate::store::{AccountStore, RecordStore};

pub struct MailJob<'a, T, A, R, D> {
    pub transport: &'a T,
    pub accounts: &'a A,
    pub records: &'a R,
    pub decryptor: &'a D,
    /// Recency window for the per-label search, in days.
    pub window_days: u64,
}

impl<T, A, R, D> MailJob<'_, T, A, R, D>
where
    T: MailTransport,
    A: AccountStore,
    R: RecordStore,
    D: Decryptor,
{
    #[instrument(level = "info", skip_all)]
    pub async fn run<S: StateStore>(
        &self,
        checkpoints: &mut Checkpoints<S>,
        now: DateTime<Utc>,
    ) -> RunStats {
        let mut stats = RunStats::default();
        let rows = match self.accounts.list_accounts() {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "Could not load mail accounts");
                stats.failed += 1;
                return stats;
            }
        };
        info!(count = rows.len(), "Loaded mail accounts");

        for (position, row) in rows.into_iter().enumerate() {
            match row {
                Ok(account) => {
                    self.sync_account(&account, checkpoints, now, &mut stats)
                        .await
                }
                Err(e) => {
                    error!(position, error = %e, "Unreadable account row; skipping");
                    stats.failed += 1;
                }
            }
        }
        stats
    }

    #[instrument(level = "info", skip_all, fields(account = %account.email))]
    async fn sync_account<S: StateStore>(
        &self,
        account: &MailAccount,
        checkpoints: &mut Checkpoints<S>,
        now: DateTime<Utc>,
        stats: &mut RunStats,
    ) {
        let previous = checkpoints
            .account_marker(account.id)
            .or(account.last_synced_at);
        info!(previous_sync = ?previous, "Syncing account");

        let password = match self
            .decryptor
            .decrypt(&account.encrypted_password, &account.iv)
        {
            Ok(password) => password,
            Err(e) => {
                error!(error = %e, "Could not decrypt password; skipping account");
                stats.failed += 1;
                return;
            }
        };

        let mut session = match self.transport.connect(account, &password).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Could not connect; skipping account");
                stats.failed += 1;
                return;
            }
        };

        let family = ProviderFamily::detect(&account.host);
        for label in MailLabel::ALL {
            match self
                .sync_label(&mut session, account, family, label, now, stats)
                .await
            {
                Ok(saved) => {
                    stats.processed += 1;
                    info!(label = label.as_str(), saved, "Label synced");
                }
                Err(IngestError::ContainerNotFound(reason)) => {
                    warn!(label = label.as_str(), %reason, "No container for label; skipping");
                }
                Err(e) => {
                    warn!(label = label.as_str(), error = %e, "Label sync failed; continuing with next label");
                    stats.failed += 1;
                }
            }
        }

        if let Err(e) = session.close().await {
            warn!(error = %e, "Logout failed");
        }

        if let Err(e) = checkpoints.advance_account_marker(account.id, now).await {
            warn!(error = %e, "Could not checkpoint account sync");
        }
        if let Err(e) = self.accounts.mark_synced(account.id, now) {
            error!(error = %e, "Could not record last sync time");
        }
    }

    async fn sync_label(
        &self,
        session: &mut T::Session,
        account: &MailAccount,
        family: ProviderFamily,
        label: MailLabel,
        now: DateTime<Utc>,
        stats: &mut RunStats,
    ) -> Result<usize> {
        let listing = list_candidates(
            session,
            account,
            family,
            label,
            self.window_days,
            now.date_naive(),
        )
        .await?;
        debug!(container = listing.container, count = listing.candidates.len(), "Checking novelty");

        let mut saved = 0usize;
        for candidate in &listing.candidates {
            if !matches!(check_novelty(self.records, &candidate.key, stats), Novelty::Novel) {
                continue;
            }
            let Payload::Message { uid, raw } = &candidate.payload else {
                continue;
            };
            let fields = match MessageFields::parse(raw) {
                Ok(fields) => fields,
                Err(e) => {
                    warn!(uid, error = %e, "Skipping unparsable message");
                    continue;
                }
            };
            let record = normalize_message(candidate, &fields, label.as_str(), now);
            if persist(self.records, &record, stats) {
                saved += 1;
            }
        }
        Ok(saved)
    }
}
