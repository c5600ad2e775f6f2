//! Keyword search over the document store.
//!
//! User input never reaches FTS5 unchecked. [`sanitize_query`] either
//! passes a query through as plain terms (so prefix-free boolean search
//! with `AND`/`OR`/`NOT` keeps working) or wraps it in one quoted phrase,
//! which FTS5 can always parse. Every string maps to a valid MATCH
//! expression or to nothing at all.

use anyhow::Result;

use crate::config::Config;
use crate::models::{SearchResult, Source};
use crate::store::{self, SearchQuery};

const OPERATORS: [&str; 3] = ["AND", "OR", "NOT"];

/// Turn raw user input into a safe FTS5 MATCH expression.
///
/// Control characters (NUL included) count as whitespace. Returns `None`
/// when the input contains nothing searchable.
pub fn sanitize_query(raw: &str) -> Option<String> {
    let cleaned = raw.replace(|c: char| c.is_control(), " ");
    let query = cleaned.trim();
    if !query.chars().any(char::is_alphanumeric) {
        return None;
    }
    if is_plain(query) {
        Some(query.to_string())
    } else {
        Some(format!("\"{}\"", query.replace('"', "\"\"")))
    }
}

/// Plain terms, with boolean operators only ever between two terms.
fn is_plain(query: &str) -> bool {
    if !query
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c.is_whitespace())
    {
        return false;
    }

    let mut expect_term = true;
    for token in query.split_whitespace() {
        if OPERATORS.contains(&token) {
            if expect_term {
                return false;
            }
            expect_term = true;
        } else {
            expect_term = false;
        }
    }
    !expect_term
}

/// Run a search with the configured ranking, clamping `limit`.
///
/// Used by both the `search` command and the `search_documentation` tool.
pub async fn search_documents(
    config: &Config,
    query: &str,
    source: Option<Source>,
    section: Option<&str>,
    limit: Option<i64>,
) -> Result<Vec<SearchResult>> {
    let store = store::open_reader(config).await?;
    let results = store
        .search(&SearchQuery {
            text: query,
            source,
            section,
            limit: config.retrieval.clamp_limit(limit),
        })
        .await;
    store.close().await;
    Ok(results?)
}

/// CLI entry point for `airflow-docs search`.
pub async fn run_search(
    config: &Config,
    query: &str,
    source: Option<Source>,
    section: Option<&str>,
    limit: Option<i64>,
) -> Result<()> {
    let results = search_documents(config, query, source, section, limit).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            result.score,
            result.source,
            result.title
        );
        println!("    path: {}", result.path);
        if let Some(ref section) = result.section {
            println!("    section: {}", section);
        }
        println!("    url: {}", result.url);
        println!(
            "    excerpt: \"{}\"",
            result.snippet.replace('\n', " ").trim()
        );
        println!();
    }

    Ok(())
}
