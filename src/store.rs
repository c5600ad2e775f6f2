//! Document store: persistence, full-text search and aggregates.
//!
//! One SQLite file holds the `documents` table keyed by `(source, path)`
//! and an external-content FTS5 index over title, description and content.
//! Triggers keep the index in step with the table inside the same
//! transaction as every row write.
//!
//! A [`DocumentStore`] is a scoped handle: open it for an operation and
//! [`close`](DocumentStore::close) it afterwards. Multi-row writes go
//! through a [`WriteBatch`], which commits atomically or not at all.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use sqlx::sqlite::{Sqlite, SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool, Transaction};

use crate::config::{Config, RetrievalConfig};
use crate::db;
use crate::error::Result;
use crate::migrate;
use crate::models::{Document, SearchResult, Source, Statistics};
use crate::search::sanitize_query;

/// Field weights and snippet size used when ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranking {
    pub title_weight: f64,
    pub description_weight: f64,
    pub content_weight: f64,
    pub snippet_tokens: i64,
}

impl Default for Ranking {
    fn default() -> Self {
        Self {
            title_weight: 5.0,
            description_weight: 2.0,
            content_weight: 1.0,
            snippet_tokens: 32,
        }
    }
}

impl From<&RetrievalConfig> for Ranking {
    fn from(r: &RetrievalConfig) -> Self {
        Self {
            title_weight: r.title_weight,
            description_weight: r.description_weight,
            content_weight: r.content_weight,
            snippet_tokens: r.snippet_tokens,
        }
    }
}

/// A search request after limit clamping.
#[derive(Debug, Clone)]
pub struct SearchQuery<'a> {
    pub text: &'a str,
    pub source: Option<Source>,
    pub section: Option<&'a str>,
    pub limit: i64,
}

/// What an upsert did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Same content hash as the stored row; nothing was written.
    Unchanged,
}

pub struct DocumentStore {
    pool: SqlitePool,
    path: PathBuf,
    ranking: Ranking,
}

impl DocumentStore {
    /// Open for writing, creating the database and schema if needed.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        if let Err(e) = migrate::run_migrations(&pool).await {
            pool.close().await;
            return Err(e);
        }
        Ok(Self::from_pool(pool, path))
    }

    /// Open for writing; a store at another schema version is wiped and
    /// recreated instead of rejected.
    pub async fn open_rebuilding(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        let result = match migrate::schema_version(&pool).await {
            Ok(v) if v == migrate::SCHEMA_VERSION => Ok(()),
            Ok(v) => {
                tracing::info!(found = v, "resetting store schema");
                migrate::reset_schema(&pool).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            pool.close().await;
            return Err(e);
        }
        Ok(Self::from_pool(pool, path))
    }

    /// Drop and recreate the schema unconditionally.
    pub async fn reset(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        if let Err(e) = migrate::reset_schema(&pool).await {
            pool.close().await;
            return Err(e);
        }
        Ok(Self::from_pool(pool, path))
    }

    /// Open a store that must already exist at the current schema version.
    pub async fn open_existing(path: &Path) -> Result<Self> {
        let pool = db::connect_existing(path).await?;
        if let Err(e) = migrate::check_schema(&pool).await {
            pool.close().await;
            return Err(e);
        }
        Ok(Self::from_pool(pool, path))
    }

    fn from_pool(pool: SqlitePool, path: &Path) -> Self {
        Self {
            pool,
            path: path.to_path_buf(),
            ranking: Ranking::default(),
        }
    }

    pub fn with_ranking(mut self, ranking: Ranking) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release every connection.
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Insert or replace one document atomically.
    pub async fn upsert(&self, doc: &Document) -> Result<UpsertOutcome> {
        let mut batch = self.begin_batch().await?;
        let outcome = batch.upsert(doc).await?;
        batch.commit().await?;
        Ok(outcome)
    }

    /// Start a transaction. Dropping the batch without committing rolls
    /// it back.
    pub async fn begin_batch(&self) -> Result<WriteBatch> {
        Ok(WriteBatch {
            tx: self.pool.begin().await?,
        })
    }

    /// Exact lookup by primary key.
    pub async fn get(&self, source: Source, path: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT source, path, title, description, section, url, content \
             FROM documents WHERE source = ? AND path = ?",
        )
        .bind(source.as_str())
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| document_from_row(&r)).transpose()
    }

    /// Ranked full-text search.
    ///
    /// The query is sanitised first; a query with nothing searchable in it
    /// returns no results. `source` and `section` filter before the limit
    /// is applied.
    pub async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<SearchResult>> {
        let Some(fts_query) = sanitize_query(query.text) else {
            return Ok(Vec::new());
        };
        let r = &self.ranking;

        let rows = sqlx::query(
            r#"
            SELECT d.source, d.path, d.title, d.description, d.section, d.url,
                   snippet(documents_fts, 2, '<mark>', '</mark>', '...', ?) AS snippet,
                   -bm25(documents_fts, ?, ?, ?) AS score
            FROM documents_fts
            JOIN documents d ON d.id = documents_fts.rowid
            WHERE documents_fts MATCH ?
              AND (? IS NULL OR d.source = ?)
              AND (? IS NULL OR d.section = ?)
            ORDER BY score DESC, d.id ASC
            LIMIT ?
            "#,
        )
        .bind(r.snippet_tokens)
        .bind(r.title_weight)
        .bind(r.description_weight)
        .bind(r.content_weight)
        .bind(&fts_query)
        .bind(query.source.map(Source::as_str))
        .bind(query.source.map(Source::as_str))
        .bind(query.section)
        .bind(query.section)
        .bind(query.limit.max(1))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SearchResult> {
                Ok(SearchResult {
                    source: row.get::<String, _>("source").parse()?,
                    path: row.get("path"),
                    title: row.get("title"),
                    description: row.get("description"),
                    section: row.get("section"),
                    url: row.get("url"),
                    snippet: row.get("snippet"),
                    score: row.get("score"),
                })
            })
            .collect()
    }

    /// Distinct sections, alphabetically.
    pub async fn list_sections(&self, source: Option<Source>) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar(
            "SELECT DISTINCT section FROM documents \
             WHERE section IS NOT NULL AND (? IS NULL OR source = ?) \
             ORDER BY section",
        )
        .bind(source.map(Source::as_str))
        .bind(source.map(Source::as_str))
        .fetch_all(&self.pool)
        .await?)
    }

    /// Document count for every registry source, plus the total.
    pub async fn statistics(&self) -> Result<Statistics> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT source, COUNT(*) FROM documents GROUP BY source")
                .fetch_all(&self.pool)
                .await?;

        let mut per_source: BTreeMap<Source, i64> =
            Source::ALL.iter().map(|&s| (s, 0)).collect();
        for (source, count) in rows {
            match source.parse::<Source>() {
                Ok(s) => {
                    per_source.insert(s, count);
                }
                Err(_) => tracing::warn!(source = %source, "ignoring rows from unknown source"),
            }
        }
        let total = per_source.values().sum();
        Ok(Statistics { per_source, total })
    }

    pub async fn count(&self, source: Option<Source>) -> Result<i64> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE ? IS NULL OR source = ?")
                .bind(source.map(Source::as_str))
                .bind(source.map(Source::as_str))
                .fetch_one(&self.pool)
                .await?,
        )
    }

    /// Remove one source's documents, or all of them. Returns the number
    /// of rows removed.
    pub async fn clear(&self, source: Option<Source>) -> Result<u64> {
        let mut batch = self.begin_batch().await?;
        let removed = batch.clear(source).await?;
        batch.commit().await?;
        Ok(removed)
    }
}

/// Open the configured store read-only with the configured ranking.
pub async fn open_reader(config: &Config) -> Result<DocumentStore> {
    Ok(DocumentStore::open_existing(&config.db.path)
        .await?
        .with_ranking(Ranking::from(&config.retrieval)))
}

/// A group of writes committed in one transaction.
pub struct WriteBatch {
    tx: Transaction<'static, Sqlite>,
}

impl WriteBatch {
    pub async fn upsert(&mut self, doc: &Document) -> Result<UpsertOutcome> {
        upsert_in(&mut self.tx, doc).await
    }

    pub async fn clear(&mut self, source: Option<Source>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE ? IS NULL OR source = ?")
            .bind(source.map(Source::as_str))
            .bind(source.map(Source::as_str))
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

async fn upsert_in(conn: &mut SqliteConnection, doc: &Document) -> Result<UpsertOutcome> {
    doc.validate()?;
    let hash = content_hash(doc);

    let existing: Option<String> =
        sqlx::query_scalar("SELECT content_hash FROM documents WHERE source = ? AND path = ?")
            .bind(doc.source.as_str())
            .bind(&doc.path)
            .fetch_optional(&mut *conn)
            .await?;

    if existing.as_deref() == Some(hash.as_str()) {
        return Ok(UpsertOutcome::Unchanged);
    }

    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO documents (source, path, title, description, section, url, content, content_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source, path) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            section = excluded.section,
            url = excluded.url,
            content = excluded.content,
            content_hash = excluded.content_hash,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(doc.source.as_str())
    .bind(&doc.path)
    .bind(&doc.title)
    .bind(&doc.description)
    .bind(&doc.section)
    .bind(&doc.url)
    .bind(&doc.content)
    .bind(&hash)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(if existing.is_some() {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    })
}

/// SHA-256 over every stored field, NUL-separated.
fn content_hash(doc: &Document) -> String {
    let mut hasher = Sha256::new();
    for field in [
        doc.title.as_str(),
        doc.description.as_deref().unwrap_or(""),
        doc.section.as_deref().unwrap_or(""),
        doc.url.as_str(),
        doc.content.as_str(),
    ] {
        hasher.update(field.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update([u8::from(doc.description.is_some()), u8::from(doc.section.is_some())]);
    format!("{:x}", hasher.finalize())
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    Ok(Document {
        source: row.get::<String, _>("source").parse()?,
        path: row.get("path"),
        title: row.get("title"),
        description: row.get("description"),
        section: row.get("section"),
        url: row.get("url"),
        content: row.get("content"),
    })
}
