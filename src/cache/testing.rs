//! In-memory fakes shared by the cache and application unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::{Duration, macros::datetime};
use tokio::sync::Notify;

use crate::application::repos::{FetchMode, PostsRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::domain::posts::NewPost;

use super::ranking::{MemoryRanking, RankingError, RankingStore};

pub(crate) fn sample_post(id: u64) -> PostRecord {
    PostRecord {
        id,
        title: format!("post {id}"),
        body: format!("body of post {id}"),
        created_at: datetime!(2024-01-01 00:00 UTC) + Duration::seconds(id as i64),
    }
}

/// Posts repository over a `BTreeMap`, with a switch to simulate outages.
#[derive(Default)]
pub(crate) struct StubPosts {
    posts: Mutex<BTreeMap<u64, PostRecord>>,
    failing: AtomicBool,
    fetch_calls: AtomicUsize,
}

impl StubPosts {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_posts(ids: impl IntoIterator<Item = u64>) -> Self {
        let stub = Self::new();
        {
            let mut posts = stub.posts.lock().unwrap();
            for id in ids {
                posts.insert(id, sample_post(id));
            }
        }
        stub
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for StubPosts {
    async fn fetch_by_ids(
        &self,
        ids: &[u64],
        limit: u16,
        offset: u64,
    ) -> Result<Vec<PostRecord>, RepoError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let mode = FetchMode::resolve(ids, limit, offset)?;
        self.check()?;

        let posts = self.posts.lock().unwrap();
        let mut newest_first: Vec<PostRecord> = posts.values().rev().cloned().collect();
        Ok(match mode {
            FetchMode::ByIds(ids) => {
                newest_first.retain(|post| ids.contains(&post.id));
                newest_first
            }
            FetchMode::Page { limit, offset } => newest_first
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect(),
        })
    }

    async fn insert(&self, post: &NewPost) -> Result<u64, RepoError> {
        self.check()?;
        let mut posts = self.posts.lock().unwrap();
        let id = posts.keys().next_back().copied().unwrap_or(0) + 1;
        posts.insert(
            id,
            PostRecord {
                title: post.title().to_string(),
                body: post.body().to_string(),
                ..sample_post(id)
            },
        );
        Ok(id)
    }

    async fn delete(&self, ids: &[u64]) -> Result<u64, RepoError> {
        if ids.is_empty() {
            return Err(RepoError::invalid_input("no post ids to delete"));
        }
        self.check()?;
        let mut posts = self.posts.lock().unwrap();
        Ok(ids.iter().filter(|id| posts.remove(*id).is_some()).count() as u64)
    }
}

/// [`StubPosts`] whose next fetch can be held until the test releases it.
#[derive(Default)]
pub(crate) struct GatedPosts {
    inner: StubPosts,
    hold: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedPosts {
    pub(crate) fn with_posts(ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            inner: StubPosts::with_posts(ids),
            ..Self::default()
        }
    }

    pub(crate) fn hold_next_fetch(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Resolves once a held fetch has started waiting.
    pub(crate) async fn fetch_started(&self) {
        self.entered.notified().await;
    }

    pub(crate) fn release_fetch(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl PostsRepo for GatedPosts {
    async fn fetch_by_ids(
        &self,
        ids: &[u64],
        limit: u16,
        offset: u64,
    ) -> Result<Vec<PostRecord>, RepoError> {
        if self.hold.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.fetch_by_ids(ids, limit, offset).await
    }

    async fn insert(&self, post: &NewPost) -> Result<u64, RepoError> {
        self.inner.insert(post).await
    }

    async fn delete(&self, ids: &[u64]) -> Result<u64, RepoError> {
        self.inner.delete(ids).await
    }
}

/// [`MemoryRanking`] that can be switched off to simulate an unreachable store.
#[derive(Default)]
pub(crate) struct SwitchableRanking {
    inner: MemoryRanking,
    down: AtomicBool,
}

impl SwitchableRanking {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_available(&self, available: bool) {
        self.down.store(!available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RankingError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(RankingError::unavailable("connection reset"));
        }
        Ok(())
    }
}

#[async_trait]
impl RankingStore for SwitchableRanking {
    async fn record_visit(&self, id: u64) -> Result<u64, RankingError> {
        self.check()?;
        self.inner.record_visit(id).await
    }

    async fn remove(&self, id: u64) -> Result<bool, RankingError> {
        self.check()?;
        self.inner.remove(id).await
    }

    async fn top_n(&self, n: usize) -> Result<Vec<u64>, RankingError> {
        self.check()?;
        self.inner.top_n(n).await
    }

    async fn score(&self, id: u64) -> Result<Option<u64>, RankingError> {
        self.check()?;
        self.inner.score(id).await
    }
}
