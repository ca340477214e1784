//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::PostRecord;
use crate::domain::posts::NewPost;

/// Upper bound applied to `limit` when listing posts page by page.
pub const MAX_PAGE_LIMIT: u16 = 1500;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// How a `fetch_by_ids` call selects rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode<'a> {
    /// Explicit ids; pagination parameters are ignored.
    ByIds(&'a [u64]),
    /// Newest-first page.
    Page { limit: u16, offset: u64 },
}

impl<'a> FetchMode<'a> {
    /// Validate the raw `(ids, limit, offset)` triple shared by every `PostsRepo`.
    pub fn resolve(ids: &'a [u64], limit: u16, offset: u64) -> Result<Self, RepoError> {
        if !ids.is_empty() {
            return Ok(Self::ByIds(ids));
        }
        if limit == 0 {
            return Err(RepoError::invalid_input(
                "either post ids or a non-zero limit is required",
            ));
        }
        Ok(Self::Page {
            limit: limit.min(MAX_PAGE_LIMIT),
            offset,
        })
    }
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Fetch posts newest first. Non-empty `ids` select those posts and ignore
    /// `limit`/`offset`; empty `ids` switch to pagination.
    async fn fetch_by_ids(
        &self,
        ids: &[u64],
        limit: u16,
        offset: u64,
    ) -> Result<Vec<PostRecord>, RepoError>;

    async fn insert(&self, post: &NewPost) -> Result<u64, RepoError>;

    /// Delete the given posts, returning how many rows were removed.
    async fn delete(&self, ids: &[u64]) -> Result<u64, RepoError>;
}
