//! Visit ranking persisted in the `post_visits` table.

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::cache::{RankingError, RankingStore};

/// [`RankingStore`] over Postgres.
///
/// Increments are a single upsert, so concurrent visits are serialized by the
/// row lock instead of by the application.
#[derive(Clone)]
pub struct PostgresRanking {
    pool: PgPool,
}

impl PostgresRanking {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_id(id: u64) -> Option<i64> {
    i64::try_from(id).ok()
}

#[async_trait]
impl RankingStore for PostgresRanking {
    async fn record_visit(&self, id: u64) -> Result<u64, RankingError> {
        let post_id = db_id(id).ok_or(RankingError::OutOfRange { id })?;
        let score: i64 = sqlx::query_scalar(
            "INSERT INTO post_visits (post_id, score) VALUES ($1, 1) \
             ON CONFLICT (post_id) DO UPDATE SET score = post_visits.score + 1 \
             RETURNING score",
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await
        .map_err(RankingError::unavailable)?;

        Ok(score.max(0) as u64)
    }

    async fn remove(&self, id: u64) -> Result<bool, RankingError> {
        let Some(post_id) = db_id(id) else {
            return Ok(false);
        };
        let result = sqlx::query("DELETE FROM post_visits WHERE post_id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(RankingError::unavailable)?;
        Ok(result.rows_affected() > 0)
    }

    async fn top_n(&self, n: usize) -> Result<Vec<u64>, RankingError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT post_id FROM post_visits ORDER BY score DESC, post_id ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(RankingError::unavailable)?;

        Ok(ids.into_iter().filter_map(|id| u64::try_from(id).ok()).collect())
    }

    async fn score(&self, id: u64) -> Result<Option<u64>, RankingError> {
        let Some(post_id) = db_id(id) else {
            return Ok(None);
        };
        let score: Option<i64> =
            sqlx::query_scalar("SELECT score FROM post_visits WHERE post_id = $1")
                .bind(post_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(RankingError::unavailable)?;
        Ok(score.map(|score| score.max(0) as u64))
    }
}

impl PostgresRanking {
    /// Drop every ranking entry whose post no longer exists.
    pub async fn prune_missing(&self) -> Result<u64, RankingError> {
        let result = sqlx::query(
            "DELETE FROM post_visits v WHERE NOT EXISTS (SELECT 1 FROM posts p WHERE p.id = v.post_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(RankingError::unavailable)?;
        Ok(result.rows_affected())
    }
}
