use async_trait::async_trait;
use sqlx::FromRow;
use time::OffsetDateTime;
use tracing::instrument;

use crate::application::repos::{FetchMode, PostsRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::domain::posts::NewPost;

use super::PostgresRepositories;
use super::util::{from_db_id, map_sqlx_error, to_db_ids};

#[derive(Debug, FromRow)]
struct PostRow {
    id: i64,
    title: String,
    body: String,
    created_at: OffsetDateTime,
}

impl TryFrom<PostRow> for PostRecord {
    type Error = RepoError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        Ok(PostRecord {
            id: from_db_id(row.id)?,
            title: row.title,
            body: row.body,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn fetch_by_ids(
        &self,
        ids: &[u64],
        limit: u16,
        offset: u64,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let rows = match FetchMode::resolve(ids, limit, offset)? {
            FetchMode::ByIds(ids) => {
                sqlx::query_as::<_, PostRow>(
                    "SELECT id, title, body, created_at FROM posts \
                     WHERE id = ANY($1) \
                     ORDER BY created_at DESC, id DESC",
                )
                .bind(to_db_ids(ids))
                .fetch_all(self.pool())
                .await
            }
            FetchMode::Page { limit, offset } => {
                sqlx::query_as::<_, PostRow>(
                    "SELECT id, title, body, created_at FROM posts \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $1 OFFSET $2",
                )
                .bind(i64::from(limit))
                .bind(i64::try_from(offset).unwrap_or(i64::MAX))
                .fetch_all(self.pool())
                .await
            }
        }
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(PostRecord::try_from).collect()
    }

    async fn insert(&self, post: &NewPost) -> Result<u64, RepoError> {
        let id: i64 =
            sqlx::query_scalar("INSERT INTO posts (title, body) VALUES ($1, $2) RETURNING id")
                .bind(post.title())
                .bind(post.body())
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        from_db_id(id)
    }

    async fn delete(&self, ids: &[u64]) -> Result<u64, RepoError> {
        if ids.is_empty() {
            return Err(RepoError::invalid_input("no post ids to delete"));
        }

        let result = sqlx::query("DELETE FROM posts WHERE id = ANY($1)")
            .bind(to_db_ids(ids))
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
