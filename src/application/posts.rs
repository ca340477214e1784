use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use crate::application::repos::{PostsRepo, RepoError};
use crate::cache::{PopularCache, VisitRecorder};
use crate::domain::entities::PostRecord;
use crate::domain::error::DomainError;
use crate::domain::posts::NewPost;

#[derive(Debug, Error)]
pub enum PostServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("post not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Read, create and delete posts while feeding the popularity ranking.
#[derive(Clone)]
pub struct PostService {
    repo: Arc<dyn PostsRepo>,
    recorder: Arc<VisitRecorder>,
}

impl PostService {
    pub fn new(repo: Arc<dyn PostsRepo>, recorder: Arc<VisitRecorder>) -> Self {
        Self { repo, recorder }
    }

    pub fn popular_cache(&self) -> &Arc<PopularCache> {
        self.recorder.materializer().popular()
    }

    #[instrument(skip(self, title, body))]
    pub async fn create(&self, title: &str, body: &str) -> Result<u64, PostServiceError> {
        let post = NewPost::new(title, body)?;
        let id = self.repo.insert(&post).await?;
        info!(target = "hotposts::posts", post_id = id, "post created");
        Ok(id)
    }

    /// Fetch posts by id or page by page.
    ///
    /// Explicit id reads record a visit for every post returned; paging never
    /// touches the ranking.
    pub async fn fetch(
        &self,
        ids: &[u64],
        limit: u16,
        offset: u64,
    ) -> Result<Vec<PostRecord>, PostServiceError> {
        let (posts, _visits) = self.fetch_tracked(ids, limit, offset).await?;
        Ok(posts)
    }

    /// Same as [`fetch`](Self::fetch), also handing back the background visit task.
    pub async fn fetch_tracked(
        &self,
        ids: &[u64],
        limit: u16,
        offset: u64,
    ) -> Result<(Vec<PostRecord>, Option<JoinHandle<()>>), PostServiceError> {
        let posts = self.repo.fetch_by_ids(ids, limit, offset).await?;

        let visits = if !ids.is_empty() && !posts.is_empty() {
            let visited: Vec<u64> = posts.iter().map(|post| post.id).collect();
            Some(self.recorder.spawn(visited))
        } else {
            None
        };

        Ok((posts, visits))
    }

    /// Delete one post and evict it from the ranking.
    pub async fn delete(&self, id: u64) -> Result<(), PostServiceError> {
        self.delete_tracked(id).await.map(|_rebuild| ())
    }

    /// Same as [`delete`](Self::delete), also handing back the background rebuild.
    #[instrument(skip(self))]
    pub async fn delete_tracked(&self, id: u64) -> Result<JoinHandle<()>, PostServiceError> {
        let removed = self.repo.delete(&[id]).await?;
        if removed == 0 {
            return Err(PostServiceError::NotFound);
        }
        info!(target = "hotposts::posts", post_id = id, "post deleted");
        Ok(self.recorder.forget(&[id]).await)
    }

    /// Current contents of the popular cache, most visited first.
    pub fn popular(&self) -> Vec<PostRecord> {
        self.popular_cache().snapshot()
    }
}
