use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::errors::IngestError;
use crate::normalize::VideoRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// A persisted row, including the bookkeeping columns the pipeline manages.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredVideo {
    pub video_id: String,
    pub title: String,
    pub channel_name: String,
    pub published_at: DateTime<Utc>,
    pub view_count: i64,
    pub search_term: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

/// Filters for the presentation layer's read path.
#[derive(Debug, Clone, Default)]
pub struct QueryFilters {
    pub published_after: Option<DateTime<Utc>>,
    pub published_before: Option<DateTime<Utc>>,
    pub min_view_count: Option<i64>,
}

#[derive(Clone)]
pub struct HighlightStore {
    pool: SqlitePool,
}

impl HighlightStore {
    pub fn new(pool: SqlitePool) -> Self {
        HighlightStore { pool }
    }

    /// Inserts the record or refreshes the mutable columns of an existing
    /// row, as one atomic statement keyed on `video_id`. Rediscovery never
    /// touches `search_term`, `first_seen_at`, or `published_at`.
    pub async fn upsert(&self, record: &VideoRecord) -> Result<UpsertOutcome, IngestError> {
        let now = Utc::now();

        // On a fresh insert both bookkeeping columns carry the same bound
        // timestamp, which is what the RETURNING clause keys on.
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO highlights
                (video_id, title, channel_name, published_at, view_count,
                 search_term, first_seen_at, last_updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            ON CONFLICT(video_id) DO UPDATE SET
                title = excluded.title,
                channel_name = excluded.channel_name,
                view_count = excluded.view_count,
                last_updated_at = excluded.last_updated_at
            RETURNING first_seen_at = last_updated_at
            "#,
        )
        .bind(&record.video_id)
        .bind(&record.title)
        .bind(&record.channel_name)
        .bind(record.published_at)
        .bind(record.view_count)
        .bind(&record.search_term)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            IngestError::StoreWrite(
                anyhow::Error::new(e).context(format!("Failed to upsert video {}", record.video_id)),
            )
        })?;

        if inserted {
            Ok(UpsertOutcome::Inserted)
        } else {
            Ok(UpsertOutcome::Updated)
        }
    }

    /// Read surface for the presentation layer: optional publish-date range
    /// and minimum view count, most-viewed first with a stable tie-break.
    pub async fn query(&self, filters: &QueryFilters) -> Result<Vec<StoredVideo>, IngestError> {
        let rows = sqlx::query_as::<_, StoredVideo>(
            r#"
            SELECT video_id, title, channel_name, published_at, view_count,
                   search_term, first_seen_at, last_updated_at
            FROM highlights
            WHERE ($1 IS NULL OR published_at >= $1)
              AND ($2 IS NULL OR published_at <= $2)
              AND view_count >= $3
            ORDER BY view_count DESC, video_id ASC
            "#,
        )
        .bind(filters.published_after)
        .bind(filters.published_before)
        .bind(filters.min_view_count.unwrap_or(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
pub(crate) async fn memory_store() -> HighlightStore {
    use sqlx::sqlite::SqlitePoolOptions;

    // A shared in-memory database needs a single connection; a second
    // connection would see its own empty database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");
    crate::db::ensure_schema(&pool)
        .await
        .expect("Failed to create schema");
    HighlightStore::new(pool)
}
