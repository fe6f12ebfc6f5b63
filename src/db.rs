use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::errors::IngestError;

/// Opens the SQLite pool and creates the schema on demand, so a fresh
/// deployment works without a separate migration step.
pub async fn init_db(database_url: &str) -> Result<SqlitePool, IngestError> {
    if let Some(file) = sqlite_file_path(database_url) {
        if let Some(parent) = std::path::Path::new(file).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    IngestError::Config(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| IngestError::Config(format!("Invalid DATABASE_URL: {}", e)))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    ensure_schema(&pool).await?;

    Ok(pool)
}

pub(crate) async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS highlights (
            video_id        TEXT PRIMARY KEY,
            title           TEXT NOT NULL,
            channel_name    TEXT NOT NULL,
            published_at    TEXT NOT NULL,
            view_count      INTEGER NOT NULL,
            search_term     TEXT NOT NULL,
            first_seen_at   TEXT NOT NULL,
            last_updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_highlights_published_at ON highlights (published_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

// DATABASE_URL may be a bare path form ("sqlite:data/db.sqlite") or the
// slashed form; either way the parent directory must exist before SQLite
// can create the file.
fn sqlite_file_path(database_url: &str) -> Option<&str> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let rest = rest.split('?').next().unwrap_or(rest);
    if rest.is_empty() || rest == ":memory:" {
        None
    } else {
        Some(rest)
    }
}
