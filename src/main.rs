//! # Awful Ingest
//!
//! An incremental ingestion engine that periodically pulls new items from
//! IMAP mailboxes and news websites, normalizes them into a common record
//! shape and stores them in SQLite exactly once.
//!
//! ## Features
//!
//! - Syncs INBOX, SENT, DRAFTS and TRASH of every stored IMAP account, with
//!   provider-specific folder names resolved from a lookup table
//! - Scrapes a categorized registry of news listings with ranked selector
//!   fallbacks, keyword relevance filtering and per-source caps
//! - Extracts summaries, authors, dates, images and canonical links from
//!   article pages, degrading to sentinel values instead of failing
//! - Skips metered sources for a cooldown window after each success
//! - Never stores the same item twice, even across overlapping runs
//!
//! ## Usage
//!
//! ```sh
//! MAIL_SECRET_KEY=... awful_ingest --database ./data/ingest.db --job mail --job news
//! ```
//!
//! ## Architecture
//!
//! Each job runs its sources sequentially through the same pipeline:
//! 1. **Listing**: discover candidate items and their stable keys
//! 2. **Novelty**: drop candidates whose key is already stored
//! 3. **Extraction**: fetch details for novel candidates only
//! 4. **Persistence**: conditional insert, failures isolated per record

use chrono::Utc;
use std::time::Duration;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod checkpoint;
mod cli;
mod credentials;
mod error;
mod extract;
mod fetch;
mod models;
mod normalize;
mod orchestrator;
mod sources;
mod store;
mod utils;

use checkpoint::{Checkpoints, JsonFileState};
use cli::{Cli, Job};
use credentials::AesCbcDecryptor;
use fetch::http::ReqwestFetcher;
use fetch::imap::{DEFAULT_IMAP_TIMEOUT, ImapTransport};
use orchestrator::RunStats;
use orchestrator::mail::MailJob;
use orchestrator::news::NewsJob;
use store::SqliteStore;
use utils::ensure_parent_writable;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ingest starting up");

    let args = Cli::parse();
    let jobs = args.selected_jobs();
    debug!(?args.database, ?args.state_file, ?jobs, "Parsed CLI arguments");

    // Early check: both state files must be writable before any network work.
    for path in [&args.database, &args.state_file] {
        if let Err(e) = ensure_parent_writable(path).await {
            error!(path = %path.display(), error = %e, "State directory is not writable");
            return Err(e.into());
        }
    }

    let store = SqliteStore::open(&args.database)?;
    let mut checkpoints = Checkpoints::new(
        JsonFileState::load(&args.state_file).await,
        chrono::Duration::hours(args.cooldown_hours),
    );

    let mut total = RunStats::default();
    for job in jobs {
        let now = Utc::now();
        match job {
            Job::Mail => {
                let Some(secret) = args.secret_key.as_deref() else {
                    error!("MAIL_SECRET_KEY is not set; mail sync disabled");
                    continue;
                };
                let decryptor = match AesCbcDecryptor::from_secret(secret) {
                    Ok(d) => d,
                    Err(e) => {
                        error!(error = %e, "Invalid mail secret key; mail sync disabled");
                        continue;
                    }
                };
                let transport = ImapTransport::new(
                    DEFAULT_IMAP_TIMEOUT,
                    Duration::from_secs(args.mail_fetch_timeout_secs),
                )?;
                let stats = MailJob {
                    transport: &transport,
                    accounts: &store,
                    records: &store,
                    decryptor: &decryptor,
                    window_days: args.mail_window_days,
                }
                .run(&mut checkpoints, now)
                .await;
                stats.log("mail");
                total.merge(stats);
            }
            Job::News => {
                if args.proxy_key.is_none() {
                    info!("No proxy key configured; metered sources are fetched directly");
                }
                let http = ReqwestFetcher::new(args.proxy_key.clone())?;
                let categories = sources::news::registry();
                let stats = NewsJob {
                    http: &http,
                    records: &store,
                    categories: &categories,
                }
                .run(&mut checkpoints, now)
                .await;
                stats.log("news");
                total.merge(stats);
            }
        }
    }
    total.log("all");

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
