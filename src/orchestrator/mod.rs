//! Run orchestration.
//!
//! Each job walks its sources one at a time through the same lifecycle:
//!
//! ```text
//! PENDING → (COOLED_DOWN | FETCHING) → (FAILED | candidates)
//!         → per candidate { NOVEL → EXTRACT → PERSIST | DUPLICATE → skip }
//!         → DONE
//! ```
//!
//! Failures are contained at the narrowest scope that can absorb them: a
//! record that fails to persist never stops its source, a mailbox label that
//! fails never stops its account, and a source that fails never stops the
//! run. What happened is accumulated into [`RunStats`].

use tracing::{debug, error, info};

use crate::models::{IngestedRecord, RecordKey};
use crate::store::RecordStore;
use crate::utils::truncate_for_log;

pub mod mail;
pub mod news;

/// Counters accumulated over one run of a job.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Sources (web listings or mailbox labels) listed successfully.
    pub processed: usize,
    /// Sources or accounts that failed before yielding candidates.
    pub failed: usize,
    /// Metered sources skipped by the cooldown.
    pub cooled_down: usize,
    pub new_records: usize,
    /// Candidates already present in the store.
    pub duplicates: usize,
    /// Headlines dropped by the keyword filter.
    pub irrelevant: usize,
    pub persistence_failures: usize,
}

impl RunStats {
    pub fn merge(&mut self, other: RunStats) {
        self.processed += other.processed;
        self.failed += other.failed;
        self.cooled_down += other.cooled_down;
        self.new_records += other.new_records;
        self.duplicates += other.duplicates;
        self.irrelevant += other.irrelevant;
        self.persistence_failures += other.persistence_failures;
    }

    pub fn log(&self, job: &str) {
        info!(
            job,
            processed = self.processed,
            failed = self.failed,
            cooled_down = self.cooled_down,
            new_records = self.new_records,
            duplicates = self.duplicates,
            irrelevant = self.irrelevant,
            persistence_failures = self.persistence_failures,
            "Run summary"
        );
    }
}

/// Outcome of the novelty lookup for one candidate.
pub(crate) enum Novelty {
    Novel,
    Duplicate,
    Unknown,
}

/// Look `key` up before doing any expensive work for its candidate.
pub(crate) fn check_novelty<R: RecordStore>(
    store: &R,
    key: &RecordKey,
    stats: &mut RunStats,
) -> Novelty {
    match store.contains(key) {
        Ok(false) => Novelty::Novel,
        Ok(true) => {
            debug!(%key, "Already stored; skipping");
            stats.duplicates += 1;
            Novelty::Duplicate
        }
        Err(e) => {
            error!(%key, error = %e, "Novelty lookup failed; skipping candidate");
            stats.persistence_failures += 1;
            Novelty::Unknown
        }
    }
}

/// Write `record`, counting the outcome. Returns `true` only when a new row
/// was stored.
pub(crate) fn persist<R: RecordStore>(
    store: &R,
    record: &IngestedRecord,
    stats: &mut RunStats,
) -> bool {
    match store.insert_if_absent(record) {
        Ok(true) => {
            info!(
                key = %record.key,
                title = %truncate_for_log(&record.title, 80),
                "Saved record"
            );
            stats.new_records += 1;
            true
        }
        Ok(false) => {
            debug!(key = %record.key, "Stored concurrently by another run");
            stats.duplicates += 1;
            false
        }
        Err(e) => {
            error!(key = %record.key, error = %e, "Failed to persist record; continuing");
            stats.persistence_failures += 1;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_adds_counters() {
        let mut total = RunStats {
            processed: 2,
            new_records: 3,
            ..Default::default()
        };
        total.merge(RunStats {
            processed: 1,
            failed: 1,
            duplicates: 4,
            ..Default::default()
        });
        assert_eq!(total.processed, 3);
        assert_eq!(total.failed, 1);
        assert_eq!(total.new_records, 3);
        assert_eq!(total.duplicates, 4);
    }
}
