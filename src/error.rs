//! Error taxonomy for the indexing and retrieval core.
//!
//! The core returns [`Result`] so callers can tell the recoverable cases
//! (a source that failed to fetch, a document that fails validation) apart
//! from the fatal ones (a store that cannot be opened). Not-found and
//! per-file parse failures are not errors at all: they surface as `None`
//! and as skip counts respectively.
//!
//! The CLI and the tool layer wrap these in `anyhow` for context.

use std::path::PathBuf;

use crate::models::Source;

/// Errors produced by the store, the fetcher and the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The database file could not be opened or created.
    #[error("cannot open document store at {}: {source}", .path.display())]
    StoreOpen {
        path: PathBuf,
        source: sqlx::Error,
    },

    /// A read-only caller asked for a store that has never been built.
    #[error(
        "document store not found at {}; run `airflow-docs index` to build it",
        .path.display()
    )]
    StoreMissing { path: PathBuf },

    /// Any failure while talking to an open store.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// The on-disk schema was written by a different version of this crate.
    #[error(
        "store schema version {found} does not match expected version {expected}; \
         rebuild the index with `airflow-docs index --rebuild`"
    )]
    SchemaMismatch { found: i64, expected: i64 },

    /// A source identifier outside the closed set.
    #[error("unknown source: '{0}' (expected one of: {known})", known = Source::identifiers().join(", "))]
    UnknownSource(String),

    /// A document that violates the model invariants reached the store.
    #[error("invalid document {key}: {reason}")]
    InvalidDocument { key: String, reason: &'static str },

    /// Fetching a source's repository failed (network, auth, missing ref).
    #[error("fetch failed for {origin}: {message}")]
    Fetch { origin: Source, message: String },

    /// Filesystem error outside the store.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn fetch(origin: Source, message: impl Into<String>) -> Self {
        Self::Fetch {
            origin,
            message: message.into(),
        }
    }

    /// True for the error classes that must abort the whole operation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StoreOpen { .. }
                | Self::StoreMissing { .. }
                | Self::Store(_)
                | Self::SchemaMismatch { .. }
        )
    }
}
