//! Fetch adapters: turning a source into a finite list of candidates.
//!
//! Each adapter follows the same two-phase pattern the pipeline relies on:
//!
//! 1. **Listing**: discover candidate items and their stable keys
//! 2. **Detail**: pull whatever extra content a novel candidate needs
//!
//! | Adapter | Transport | Candidate key |
//! |---------|-----------|---------------|
//! | [`http`] | stateless HTTP GET, optionally via the metered proxy | resolved absolute link |
//! | [`mail`] | IMAP session (trait), folder fallback, recency window | UID per (account, label) |
//! | [`imap`] | concrete IMAP-over-TLS session for [`mail`] | - |
//!
//! Adapters never swallow transport errors themselves; they return them so
//! the orchestrator can fail exactly one source and move on.

pub mod http;
pub mod imap;
pub mod mail;
