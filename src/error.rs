//! Error taxonomy for the ingestion engine.
//!
//! Every failure the engine can observe maps onto one [`IngestError`]
//! variant, and each variant has a fixed blast radius:
//!
//! | Variant | Caught at | Effect |
//! |---------|-----------|--------|
//! | [`IngestError::Credential`] | account | account skipped for this run |
//! | [`IngestError::Transport`] | source | source contributes zero candidates |
//! | [`IngestError::ContainerNotFound`] | mailbox label | next alternate name is tried |
//! | [`IngestError::Persistence`] | candidate | logged, next candidate proceeds |
//! | [`IngestError::Config`] | startup | job disabled or process refuses to start |
//!
//! A locator that matches nothing is not an error at all: extraction degrades
//! to sentinel values (see [`crate::extract`]).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("credential error: {0}")]
    Credential(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for IngestError {
    fn from(e: rusqlite::Error) -> Self {
        IngestError::Persistence(e.to_string())
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            IngestError::Transport(format!("timed out: {e}"))
        } else {
            IngestError::Transport(e.to_string())
        }
    }
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        IngestError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category() {
        let e = IngestError::ContainerNotFound("[Gmail]/Trash".into());
        assert_eq!(e.to_string(), "container not found: [Gmail]/Trash");
    }

    #[test]
    fn test_sqlite_errors_become_persistence() {
        let e: IngestError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(e, IngestError::Persistence(_)));
    }
}
