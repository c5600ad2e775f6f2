//! Indexing orchestration.
//!
//! For each source, in registry order:
//!
//! 1. **Fetch** the docs subtree through a [`RepositoryFetcher`]. A failure
//!    here is reported against that source only; the others still run.
//! 2. **Enumerate** files under the subtree whose extension belongs to the
//!    source's parser, skipping hidden paths and `exclude` globs.
//! 3. **Parse** each file. A file that yields nothing, cannot be read or
//!    makes the parser panic counts as skipped.
//! 4. **Persist** every document in one [`WriteBatch`](crate::store::WriteBatch).
//!    With `rebuild`, the source's old rows are cleared inside the same
//!    batch, so readers see either the old set or the new one.
//!
//! Without `rebuild`, rows for files deleted upstream are left in place.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::Result;
use crate::fetch::{DefaultFetcher, RepositoryFetcher};
use crate::models::{section_for_path, Document, Source};
use crate::sources::{self, SourceSpec};
use crate::store::{DocumentStore, UpsertOutcome};

/// Outcome of indexing one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: Option<Source>,
    /// Documents persisted, including unchanged ones.
    pub indexed: u64,
    /// Subset of `indexed` whose stored content was already identical.
    pub unchanged: u64,
    pub skipped: u64,
    /// Rows removed by a rebuild.
    pub cleared: u64,
    /// Rows left in place because a rebuild could not fetch the source.
    pub retained: u64,
    /// Why the source was skipped, if it was.
    pub error: Option<String>,
}

impl SourceReport {
    fn new(source: Source) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Outcome of an indexing run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexReport {
    pub sources: Vec<SourceReport>,
}

impl IndexReport {
    pub fn indexed(&self) -> u64 {
        self.sources.iter().map(|s| s.indexed).sum()
    }

    pub fn skipped(&self) -> u64 {
        self.sources.iter().map(|s| s.skipped).sum()
    }

    pub fn cleared(&self) -> u64 {
        self.sources.iter().map(|s| s.cleared).sum()
    }

    /// True when at least one source ran and every one of them failed.
    pub fn all_failed(&self) -> bool {
        !self.sources.is_empty() && self.sources.iter().all(SourceReport::failed)
    }
}

/// Runs sources through fetch, parse and persist against one store.
pub struct Indexer<'a> {
    store: &'a DocumentStore,
    fetcher: &'a dyn RepositoryFetcher,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a DocumentStore, fetcher: &'a dyn RepositoryFetcher) -> Self {
        Self { store, fetcher }
    }

    /// Index every source in order. Only store failures abort the run.
    pub async fn index_all(
        &self,
        specs: &[SourceSpec],
        branch: &str,
        rebuild: bool,
    ) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        for spec in specs {
            report
                .sources
                .push(self.index_source(spec, branch, rebuild).await?);
        }
        Ok(report)
    }

    /// Index one source.
    ///
    /// Fetch failures are returned inside the report, not as `Err`.
    pub async fn index_source(
        &self,
        spec: &SourceSpec,
        branch: &str,
        rebuild: bool,
    ) -> Result<SourceReport> {
        let mut report = SourceReport::new(spec.source);
        tracing::info!(source = %spec.source, branch, rebuild, "indexing source");

        let checkout = match self.fetcher.fetch(spec, branch).await {
            Ok(c) => c,
            Err(e) if !e.is_fatal() => {
                tracing::warn!(source = %spec.source, error = %e, "source skipped");
                report.error = Some(e.to_string());
                if rebuild {
                    report.retained = self.store.count(Some(spec.source)).await? as u64;
                }
                return Ok(report);
            }
            Err(e) => return Err(e),
        };

        let files = enumerate(checkout.root(), spec);
        tracing::debug!(source = %spec.source, files = files.len(), "enumerated");

        let mut docs = Vec::with_capacity(files.len());
        for (abs, rel) in &files {
            match parse_file(spec, abs, rel) {
                Some(doc) => docs.push(doc),
                None => report.skipped += 1,
            }
        }

        let mut batch = self.store.begin_batch().await?;
        if rebuild {
            report.cleared = batch.clear(Some(spec.source)).await?;
        }
        for doc in &docs {
            match batch.upsert(doc).await {
                Ok(outcome) => {
                    report.indexed += 1;
                    if outcome == UpsertOutcome::Unchanged {
                        report.unchanged += 1;
                    }
                }
                Err(e) if !e.is_fatal() => {
                    tracing::warn!(source = %spec.source, path = %doc.path, error = %e, "skipping document");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        batch.commit().await?;

        tracing::info!(
            source = %spec.source,
            indexed = report.indexed,
            unchanged = report.unchanged,
            skipped = report.skipped,
            cleared = report.cleared,
            "source indexed"
        );
        Ok(report)
    }
}

/// Eligible files under `root`, as `(absolute, relative)` pairs sorted by
/// relative path. Relative paths always use `/`.
fn enumerate(root: &Path, spec: &SourceSpec) -> Vec<(PathBuf, String)> {
    let excludes = build_excludes(spec);
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(source = %spec.source, error = %e, "cannot read directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !spec.matches_extension(entry.path()) {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let Some(rel) = relative.to_str() else {
            tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 path");
            continue;
        };
        let rel = rel.replace('\\', "/");
        if excludes.is_match(&rel) {
            continue;
        }
        files.push((entry.path().to_path_buf(), rel));
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    files
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

fn build_excludes(spec: &SourceSpec) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in &spec.exclude {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => tracing::warn!(source = %spec.source, pattern, error = %e, "ignoring exclude glob"),
        }
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!(source = %spec.source, error = %e, "ignoring exclude globs");
        GlobSet::empty()
    })
}

/// Read and parse one file; `None` means skipped.
fn parse_file(spec: &SourceSpec, abs: &Path, rel: &str) -> Option<Document> {
    let bytes = match std::fs::read(abs) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(source = %spec.source, path = rel, error = %e, "cannot read file");
            return None;
        }
    };

    let parsed = match catch_unwind(AssertUnwindSafe(|| spec.parser.parse(&bytes, rel))) {
        Ok(Some(p)) => p,
        Ok(None) => {
            tracing::debug!(source = %spec.source, path = rel, "no content, skipped");
            return None;
        }
        Err(_) => {
            tracing::warn!(source = %spec.source, path = rel, "parser panicked, skipped");
            return None;
        }
    };

    tracing::debug!(source = %spec.source, path = rel, title = %parsed.title, "parsed");
    Some(Document {
        source: spec.source,
        path: rel.to_string(),
        title: parsed.title,
        description: parsed.description,
        section: section_for_path(rel),
        url: spec.url_for(rel),
        content: parsed.content,
    })
}

/// CLI entry point for `airflow-docs index`.
///
/// Opens the store for writing (recreating it on a schema mismatch when
/// rebuilding), indexes the targeted sources and prints the report.
pub async fn run_index(
    config: &Config,
    source: Option<Source>,
    rebuild: bool,
    branch: Option<&str>,
) -> anyhow::Result<IndexReport> {
    let specs: Vec<SourceSpec> = match source {
        Some(s) => vec![sources::spec_for(config, s)],
        None => sources::registry(config),
    };
    let branch = branch.unwrap_or(&config.index.branch);

    let store = if rebuild {
        DocumentStore::open_rebuilding(&config.db.path).await?
    } else {
        DocumentStore::open(&config.db.path).await?
    };
    let fetcher = DefaultFetcher::new(config.index.depth);
    let result = Indexer::new(&store, &fetcher)
        .index_all(&specs, branch, rebuild)
        .await;
    store.close().await;
    let report = result?;

    for s in &report.sources {
        let name = s.source.map(Source::as_str).unwrap_or("unknown");
        println!("index {}", name);
        match &s.error {
            Some(e) => {
                println!("  error: {}", e);
                if s.retained > 0 {
                    println!("  kept: {} documents from the previous index", s.retained);
                }
            }
            None => {
                println!("  indexed: {} ({} unchanged)", s.indexed, s.unchanged);
                println!("  skipped: {}", s.skipped);
                if rebuild {
                    println!("  cleared: {}", s.cleared);
                }
            }
        }
    }
    println!(
        "total: {} indexed, {} skipped",
        report.indexed(),
        report.skipped()
    );
    if report.all_failed() {
        println!("failed");
    } else {
        println!("ok");
    }

    Ok(report)
}
