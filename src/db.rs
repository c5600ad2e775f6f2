//! SQLite connection handling.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::error::{Error, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the database at `path`, creating it (and its parent directory)
/// when missing.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
    }
    open_pool(path, true).await
}

/// Open an existing database without creating anything.
pub async fn connect_existing(path: &Path) -> Result<SqlitePool> {
    if !path.is_file() {
        return Err(Error::StoreMissing {
            path: path.to_path_buf(),
        });
    }
    open_pool(path, false).await
}

async fn open_pool(path: &Path, create: bool) -> Result<SqlitePool> {
    let open_err = |source| Error::StoreOpen {
        path: path.to_path_buf(),
        source,
    };

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .map_err(open_err)?
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(open_err)
}
