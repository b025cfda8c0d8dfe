//! The news job: categorized web sources through listing, novelty, detail
//! extraction and persistence.
//!
//! Per source the order is strict:
//!
//! 1. Metered sources inside their cooldown are skipped with no network call
//! 2. The listing is fetched; a failure marks only this source as failed
//! 3. Candidates are visited in page order until the source's item cap of
//!    *stored* records is reached
//! 4. Each novel candidate gets its detail page fetched, is normalized and
//!    conditionally inserted
//! 5. The source's success is checkpointed
//!
//! A category may also cap how many new records all of its sources store
//! together in one run.

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use crate::checkpoint::{Checkpoints, StateStore};
use crate::fetch::http::{HttpFetch, fetch_details, list_candidates};
use crate::models::Payload;
use crate::normalize::normalize_article;
use crate::orchestrator::{Novelty, RunStats, check_novelty, persist};
use crate::sources::{Category, WebSource};
use crate::store::RecordStore;

/// Everything the news job reads from; checkpoints are passed per run.
pub struct NewsJob<'a, H, R> {
    pub http: &'a H,
    pub records: &'a R,
    pub categories: &'a [Category],
}

impl<H: HttpFetch, R: RecordStore> NewsJob<'_, H, R> {
    #[instrument(level = "info", skip_all, fields(categories = self.categories.len()))]
    pub async fn run<S: StateStore>(
        &self,
        checkpoints: &mut Checkpoints<S>,
        now: DateTime<Utc>,
    ) -> RunStats {
        let mut stats = RunStats::default();
        for category in self.categories {
            let mut remaining = category.max_new;
            for source in &category.sources {
                if remaining == Some(0) {
                    info!(category = category.name, "Category cap reached; skipping remaining sources");
                    break;
                }
                let saved = self
                    .sync_source(source, remaining, checkpoints, now, &mut stats)
                    .await;
                if let Some(left) = remaining.as_mut() {
                    *left = left.saturating_sub(saved);
                }
            }
        }
        stats
    }

    /// Returns the number of new records stored for `source`.
    #[instrument(level = "info", skip_all, fields(source = source.name, category = source.category))]
    async fn sync_source<S: StateStore>(
        &self,
        source: &WebSource,
        remaining: Option<usize>,
        checkpoints: &mut Checkpoints<S>,
        now: DateTime<Utc>,
        stats: &mut RunStats,
    ) -> usize {
        let id = source.id();
        if source.metered && checkpoints.is_cooled_down(&id, now) {
            info!(
                last_success = ?checkpoints.last_success(&id),
                "Metered source is cooling down; skipping"
            );
            stats.cooled_down += 1;
            return 0;
        }

        let listing = match list_candidates(self.http, source).await {
            Ok(listing) => listing,
            Err(e) => {
                error!(error = %e, "Listing failed; source contributes nothing this run");
                stats.failed += 1;
                return 0;
            }
        };
        stats.processed += 1;
        stats.irrelevant += listing.irrelevant;

        let cap = remaining.map_or(source.item_cap, |left| left.min(source.item_cap));
        let mut saved = 0usize;
        for candidate in &listing.candidates {
            if saved >= cap {
                break;
            }
            if !matches!(check_novelty(self.records, &candidate.key, stats), Novelty::Novel) {
                continue;
            }
            let Payload::Link { url, .. } = &candidate.payload else {
                continue;
            };
            let details = fetch_details(self.http, source, url, now).await;
            let Some(record) = normalize_article(candidate, source, &details) else {
                continue;
            };
            if persist(self.records, &record, stats) {
                saved += 1;
            }
        }

        if let Err(e) = checkpoints.record_success(&id, now).await {
            warn!(error = %e, "Could not checkpoint source success");
        }
        info!(saved, cap, "Source done");
        saved
    }
}
