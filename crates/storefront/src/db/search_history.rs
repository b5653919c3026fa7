//! Search history repository.

use sqlx::PgPool;

use pet_market_core::UserId;

use super::RepositoryError;
use crate::models::SearchHistoryEntry;

/// Most recent searches returned to a user.
const HISTORY_LIMIT: i64 = 20;

/// Repository for per-user search keywords.
pub struct SearchHistoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SearchHistoryRepository<'a> {
    /// Create a new search history repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record a search.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(&self, user_id: UserId, keyword: &str) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO search_history (user_id, keyword) VALUES ($1, $2)")
            .bind(user_id)
            .bind(keyword)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// A user's most recent searches, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, user_id: UserId) -> Result<Vec<SearchHistoryEntry>, RepositoryError> {
        let entries = sqlx::query_as::<_, SearchHistoryEntry>(
            "SELECT id, keyword, search_time FROM search_history \
             WHERE user_id = $1 ORDER BY search_time DESC, id DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(HISTORY_LIMIT)
        .fetch_all(self.pool)
        .await?;
        Ok(entries)
    }

    /// Forget all of a user's searches.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM search_history WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
