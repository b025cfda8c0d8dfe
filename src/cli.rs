//! Command-line interface definitions for Awful Ingest.
//!
//! All arguments can be provided via command-line flags or environment
//! variables, so the binary runs unchanged from a shell, a cron entry or a
//! container with only its environment configured.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::checkpoint::DEFAULT_COOLDOWN_HOURS;
use crate::fetch::imap::DEFAULT_BODY_FETCH_TIMEOUT;
use crate::fetch::mail::DEFAULT_WINDOW_DAYS;

/// A unit of work the binary can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Job {
    /// Sync every stored IMAP account
    Mail,
    /// Scrape the compiled news source registry
    News,
}

/// Command-line arguments for the Awful Ingest application.
///
/// # Examples
///
/// ```sh
/// # Run both jobs against the default database
/// awful_ingest
///
/// # Scrape news only, with the metered proxy enabled
/// awful_ingest --job news --proxy-key YOUR_KEY
///
/// # Sync mail with a wider recency window
/// awful_ingest --job mail --mail-window-days 10
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// SQLite database holding records and mail accounts
    #[arg(short, long, env = "INGEST_DATABASE_PATH", default_value = "./data/ingest.db")]
    pub database: PathBuf,

    /// JSON file holding source checkpoints
    #[arg(short, long, env = "INGEST_STATE_PATH", default_value = "./data/checkpoints.json")]
    pub state_file: PathBuf,

    /// 32-byte key that mailbox passwords are encrypted with
    #[arg(long, env = "MAIL_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Scraping proxy API key; metered sources are fetched directly without it
    #[arg(long, env = "SCRAPER_API_KEY", hide_env_values = true)]
    pub proxy_key: Option<String>,

    /// Jobs to run (repeatable); runs every job when omitted
    #[arg(short, long = "job", value_enum)]
    pub jobs: Vec<Job>,

    /// Only messages received within this many days are considered
    #[arg(long, env = "MAIL_WINDOW_DAYS", default_value_t = DEFAULT_WINDOW_DAYS)]
    pub mail_window_days: u64,

    /// Seconds allowed for downloading one label's message bodies
    #[arg(long, env = "MAIL_FETCH_TIMEOUT_SECS", default_value_t = DEFAULT_BODY_FETCH_TIMEOUT.as_secs())]
    pub mail_fetch_timeout_secs: u64,

    /// Metered sources are skipped until this many hours after their last success
    #[arg(long, env = "COOLDOWN_HOURS", default_value_t = DEFAULT_COOLDOWN_HOURS)]
    pub cooldown_hours: i64,
}

impl Cli {
    /// The jobs selected on the command line, or every job when none was.
    pub fn selected_jobs(&self) -> Vec<Job> {
        if self.jobs.is_empty() {
            vec![Job::Mail, Job::News]
        } else {
            self.jobs.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "awful_ingest",
            "--database",
            "/tmp/ingest.db",
            "--state-file",
            "/tmp/state.json",
            "--job",
            "news",
        ]);

        assert_eq!(cli.database, PathBuf::from("/tmp/ingest.db"));
        assert_eq!(cli.state_file, PathBuf::from("/tmp/state.json"));
        assert_eq!(cli.selected_jobs(), vec![Job::News]);
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["awful_ingest", "-d", "/tmp/a.db", "-s", "/tmp/a.json"]);

        assert_eq!(cli.mail_window_days, 5);
        assert_eq!(cli.cooldown_hours, 24);
        assert_eq!(cli.mail_fetch_timeout_secs, 120);
        assert_eq!(cli.selected_jobs(), vec![Job::Mail, Job::News]);
    }

    #[test]
    fn test_cli_repeated_jobs() {
        let cli = Cli::parse_from([
            "awful_ingest",
            "-d",
            "/tmp/a.db",
            "-s",
            "/tmp/a.json",
            "-j",
            "mail",
            "-j",
            "news",
            "--mail-window-days",
            "10",
        ]);

        assert_eq!(cli.selected_jobs(), vec![Job::Mail, Job::News]);
        assert_eq!(cli.mail_window_days, 10);
    }
}
