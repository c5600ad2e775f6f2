//! Schema creation and versioning.
//!
//! The schema version lives in `PRAGMA user_version`. There is no in-place
//! migration: a store written by a different version has to be rebuilt
//! from scratch with [`reset_schema`].

use sqlx::SqlitePool;

use crate::error::{Error, Result};

/// Version of the schema created by [`reset_schema`].
pub const SCHEMA_VERSION: i64 = 1;

const CREATE_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source TEXT NOT NULL,
        path TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        section TEXT,
        url TEXT NOT NULL,
        content TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE(source, path)
    )
    "#,
    r#"
    CREATE VIRTUAL TABLE documents_fts USING fts5(
        title,
        description,
        content,
        content='documents',
        content_rowid='id',
        tokenize='porter unicode61'
    )
    "#,
    r#"
    CREATE TRIGGER documents_ai AFTER INSERT ON documents BEGIN
        INSERT INTO documents_fts(rowid, title, description, content)
        VALUES (new.id, new.title, coalesce(new.description, ''), new.content);
    END
    "#,
    r#"
    CREATE TRIGGER documents_ad AFTER DELETE ON documents BEGIN
        INSERT INTO documents_fts(documents_fts, rowid, title, description, content)
        VALUES ('delete', old.id, old.title, coalesce(old.description, ''), old.content);
    END
    "#,
    r#"
    CREATE TRIGGER documents_au AFTER UPDATE ON documents BEGIN
        INSERT INTO documents_fts(documents_fts, rowid, title, description, content)
        VALUES ('delete', old.id, old.title, coalesce(old.description, ''), old.content);
        INSERT INTO documents_fts(rowid, title, description, content)
        VALUES (new.id, new.title, coalesce(new.description, ''), new.content);
    END
    "#,
    "CREATE INDEX idx_documents_source ON documents(source)",
    "CREATE INDEX idx_documents_section ON documents(section)",
    "CREATE INDEX idx_documents_source_section ON documents(source, section)",
];

const DROP_STATEMENTS: &[&str] = &[
    "DROP TRIGGER IF EXISTS documents_ai",
    "DROP TRIGGER IF EXISTS documents_ad",
    "DROP TRIGGER IF EXISTS documents_au",
    "DROP TABLE IF EXISTS documents_fts",
    "DROP TABLE IF EXISTS documents",
];

pub async fn schema_version(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?)
}

async fn has_documents_table(pool: &SqlitePool) -> Result<bool> {
    Ok(sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'documents'",
    )
    .fetch_one(pool)
    .await?)
}

/// Create the schema in an empty database; accept a database already at
/// [`SCHEMA_VERSION`]; reject anything else.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let version = schema_version(pool).await?;
    if version == SCHEMA_VERSION {
        return Ok(());
    }
    if version == 0 && !has_documents_table(pool).await? {
        return reset_schema(pool).await;
    }
    Err(Error::SchemaMismatch {
        found: version,
        expected: SCHEMA_VERSION,
    })
}

/// Fail unless the database is at [`SCHEMA_VERSION`].
pub async fn check_schema(pool: &SqlitePool) -> Result<()> {
    let version = schema_version(pool).await?;
    if version == SCHEMA_VERSION {
        Ok(())
    } else {
        Err(Error::SchemaMismatch {
            found: version,
            expected: SCHEMA_VERSION,
        })
    }
}

/// Drop everything and recreate the schema at [`SCHEMA_VERSION`].
pub async fn reset_schema(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in DROP_STATEMENTS.iter().chain(CREATE_STATEMENTS) {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    sqlx::query(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::debug!(version = SCHEMA_VERSION, "schema created");
    Ok(())
}
