//! Core data models used throughout the indexer.
//!
//! These types are the normalized records that flow from the parsers
//! through the orchestrator into the document store, and back out of it
//! as search results and statistics.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One of the fixed documentation origins.
///
/// The set is closed: adding a source means adding a variant here and a
/// row in [`crate::sources::registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "airflow-core", alias = "core")]
    Core,
    #[serde(rename = "airflow-python-client", alias = "client")]
    Client,
}

impl Source {
    /// Every source, in registry order.
    pub const ALL: [Source; 2] = [Source::Core, Source::Client];

    /// Canonical identifier stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Core => "airflow-core",
            Source::Client => "airflow-python-client",
        }
    }

    /// Human-readable label for reports.
    pub fn display_name(self) -> &'static str {
        match self {
            Source::Core => "Airflow Core",
            Source::Client => "Python Client",
        }
    }

    pub fn identifiers() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.as_str()).collect()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = Error;

    /// Accepts the canonical identifier or the short alias (`core`, `client`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "airflow-core" | "core" => Ok(Source::Core),
            "airflow-python-client" | "client" => Ok(Source::Client),
            other => Err(Error::UnknownSource(other.to_string())),
        }
    }
}

/// One indexed page of documentation.
///
/// `(source, path)` is the primary key. `url` is derived from the source's
/// URL template at indexing time and stored for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub source: Source,
    pub path: String,
    pub title: String,
    pub description: Option<String>,
    pub section: Option<String>,
    pub url: String,
    pub content: String,
}

impl Document {
    /// Check the invariants a persisted document must satisfy.
    pub fn validate(&self) -> Result<(), Error> {
        let reason = if self.path.trim().is_empty() {
            "path is empty"
        } else if self.title.trim().is_empty() {
            "title is empty"
        } else if self.content.trim().is_empty() {
            "content is empty"
        } else {
            return Ok(());
        };
        Err(Error::InvalidDocument {
            key: self.key(),
            reason,
        })
    }

    /// `source/path`, used in logs and error messages.
    pub fn key(&self) -> String {
        format!("{}/{}", self.source, self.path)
    }
}

/// A document matched by a full-text query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub source: Source,
    pub path: String,
    pub title: String,
    pub description: Option<String>,
    pub section: Option<String>,
    pub url: String,
    /// Content excerpt with matches wrapped in `<mark>` tags.
    pub snippet: String,
    /// Relevance; higher is better.
    pub score: f64,
}

/// Document counts per source plus the grand total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub per_source: BTreeMap<Source, i64>,
    pub total: i64,
}

impl Statistics {
    pub fn count(&self, source: Source) -> i64 {
        self.per_source.get(&source).copied().unwrap_or(0)
    }
}

/// Turn a path segment or file stem into a display label:
/// `core-concepts` becomes `Core Concepts`.
pub fn humanize(raw: &str) -> String {
    raw.replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Section label for a repository-relative path: the humanized first
/// directory segment, or `None` for a file at the subtree root.
pub fn section_for_path(path: &str) -> Option<String> {
    let mut parts = path.split('/').filter(|p| !p.is_empty());
    let first = parts.next()?;
    parts.next()?;
    let label = humanize(first);
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
