use sqlx::PgPool;
use tracing::{debug, error, instrument};

use crate::db::{DbError, NewSearchHistoryEntry, SearchHistoryEntry};

/// Append-only log of search attempts. There is no update or delete path.
#[derive(Clone)]
pub struct SearchHistoryRepository {
    pool: PgPool,
}

impl SearchHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, entry), fields(location = %entry.location, source = ?entry.source, found = entry.found))]
    pub async fn record(&self, entry: &NewSearchHistoryEntry) -> Result<SearchHistoryEntry, DbError> {
        let saved = sqlx::query_as::<_, SearchHistoryEntry>(
            r#"
            INSERT INTO search_history (location, source, result_count, found)
            VALUES ($1, $2, $3, $4)
            RETURNING id, location, source, result_count, found, searched_at
            "#,
        )
        .bind(&entry.location)
        .bind(entry.source)
        .bind(entry.result_count)
        .bind(entry.found)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to record search history");
            e
        })?;

        debug!("Recorded search history entry {}", saved.id);
        Ok(saved)
    }

    /// Most recent entries, newest first
    #[instrument(skip(self))]
    pub async fn recent(&self, limit: i64) -> Result<Vec<SearchHistoryEntry>, DbError> {
        let entries = sqlx::query_as::<_, SearchHistoryEntry>(
            r#"
            SELECT id, location, source, result_count, found, searched_at
            FROM search_history
            ORDER BY searched_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Entries for one location, matched case-insensitively, newest first
    #[instrument(skip(self), fields(location = %location))]
    pub async fn find_by_location(
        &self,
        location: &str,
        limit: i64,
    ) -> Result<Vec<SearchHistoryEntry>, DbError> {
        let entries = sqlx::query_as::<_, SearchHistoryEntry>(
            r#"
            SELECT id, location, source, result_count, found, searched_at
            FROM search_history
            WHERE LOWER(location) = LOWER($1)
            ORDER BY searched_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(location)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
