//! Source registry and health listing.
//!
//! [`registry`] resolves the static table of documentation sources, with
//! any `[sources.<id>]` overrides from the config applied. Everything the
//! orchestrator needs to know about a source lives in its [`SourceSpec`]:
//! where to fetch it from, which subtree to keep, which files to read,
//! which parser to run and how to build public URLs.
//!
//! | Source | Repository subtree | Files | Parser |
//! |--------|--------------------|-------|--------|
//! | `airflow-core` | `apache/airflow:docs/apache-airflow` | `.rst`, `.rest` | structured markup |
//! | `airflow-python-client` | `apache/airflow-client-python:docs` | `.md`, `.markdown` | frontmatter |

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use crate::config::Config;
use crate::models::Source;
use crate::parser::ParserKind;

/// Static description of one source before config overrides.
struct SourceRow {
    repo_url: &'static str,
    subtree: &'static str,
    parser: ParserKind,
    base_url: &'static str,
}

const PUBLISHED_EXTENSION: &str = "html";

fn row(source: Source) -> SourceRow {
    match source {
        Source::Core => SourceRow {
            repo_url: "https://github.com/apache/airflow.git",
            subtree: "docs/apache-airflow",
            parser: ParserKind::StructuredMarkup,
            base_url: "https://airflow.apache.org/docs/apache-airflow/stable",
        },
        Source::Client => SourceRow {
            repo_url: "https://github.com/apache/airflow-client-python.git",
            subtree: "docs",
            parser: ParserKind::Frontmatter,
            base_url: "https://airflow.apache.org/docs/apache-airflow-client",
        },
    }
}

/// Fully resolved description of a documentation source.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub source: Source,
    pub repo_url: String,
    /// Sparse-checkout filter: the docs directory within the repository.
    pub subtree: String,
    pub parser: ParserKind,
    pub base_url: String,
    /// When set, read this directory instead of fetching the repository.
    pub local_path: Option<PathBuf>,
    /// Glob patterns, relative to the subtree, of files never indexed.
    pub exclude: Vec<String>,
}

impl SourceSpec {
    /// File suffixes (without the dot) this source's parser reads.
    pub fn extensions(&self) -> &'static [&'static str] {
        self.parser.supported_extensions()
    }

    /// Whether `path` carries one of this source's extensions.
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.extensions()
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Public URL of a page: the base URL joined with `path`, its source
    /// extension rewritten to `.html`.
    pub fn url_for(&self, path: &str) -> String {
        let published = match path.rsplit_once('.') {
            Some((stem, ext))
                if !stem.is_empty()
                    && self
                        .extensions()
                        .iter()
                        .any(|known| known.eq_ignore_ascii_case(ext)) =>
            {
                format!("{}.{}", stem, PUBLISHED_EXTENSION)
            }
            _ => path.to_string(),
        };
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            published.trim_start_matches('/')
        )
    }
}

/// Resolve every source in registry order, applying `[sources.<id>]`
/// overrides.
pub fn registry(config: &Config) -> Vec<SourceSpec> {
    Source::ALL
        .iter()
        .map(|&source| spec_for(config, source))
        .collect()
}

/// Resolve a single source.
pub fn spec_for(config: &Config, source: Source) -> SourceSpec {
    let row = row(source);
    let overrides = config.sources.get(&source);
    SourceSpec {
        source,
        repo_url: overrides
            .and_then(|o| o.repo.clone())
            .unwrap_or_else(|| row.repo_url.to_string()),
        subtree: overrides
            .and_then(|o| o.subtree.clone())
            .unwrap_or_else(|| row.subtree.to_string()),
        parser: row.parser,
        base_url: overrides
            .and_then(|o| o.base_url.clone())
            .unwrap_or_else(|| row.base_url.to_string()),
        local_path: overrides.and_then(|o| o.local_path.clone()),
        exclude: overrides.map(|o| o.exclude.clone()).unwrap_or_default(),
    }
}

/// Configuration and health of one source, as shown by `sources`.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: Source,
    pub parser: ParserKind,
    /// Whether the source can be indexed right now.
    pub healthy: bool,
    pub notes: String,
}

/// Health of every source: a local checkout must exist, a remote one
/// needs a `git` binary on `PATH`.
pub fn get_sources(config: &Config) -> Vec<SourceStatus> {
    let git_available = std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);

    registry(config)
        .into_iter()
        .map(|spec| match &spec.local_path {
            Some(path) => SourceStatus {
                name: spec.source,
                parser: spec.parser,
                healthy: path.is_dir(),
                notes: if path.is_dir() {
                    format!("local: {}", path.display())
                } else {
                    format!("local path does not exist: {}", path.display())
                },
            },
            None => SourceStatus {
                name: spec.source,
                parser: spec.parser,
                healthy: git_available,
                notes: if git_available {
                    format!("repo: {} ({})", spec.repo_url, spec.subtree)
                } else {
                    "git binary not found".to_string()
                },
            },
        })
        .collect()
}

/// CLI entry point for `airflow-docs sources`.
pub fn list_sources(config: &Config) -> Result<()> {
    println!(
        "{:<24} {:<18} {:<8} NOTES",
        "SOURCE", "PARSER", "HEALTHY"
    );
    for s in get_sources(config) {
        println!(
            "{:<24} {:<18} {:<8} {}",
            s.name.as_str(),
            s.parser.as_str(),
            s.healthy,
            s.notes
        );
    }
    Ok(())
}
