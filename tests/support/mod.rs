#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::Mutex;
use tower::ServiceExt;

use hotposts::application::posts::PostService;
use hotposts::application::repos::{FetchMode, PostsRepo, RepoError};
use hotposts::cache::{
    CacheMaterializer, MAX_POPULAR_LIMIT, MemoryRanking, PopularCache, RankingStore,
    VisitRecorder,
};
use hotposts::domain::entities::PostRecord;
use hotposts::domain::posts::NewPost;
use hotposts::infra::http::{HttpState, build_router};

const BASE_TIME: OffsetDateTime = datetime!(2024-01-01 00:00 UTC);

/// Posts repository kept in memory, newest id = newest post.
#[derive(Default)]
pub struct InMemoryPosts {
    posts: Mutex<BTreeMap<u64, PostRecord>>,
    failing: AtomicBool,
}

impl InMemoryPosts {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("database is down"));
        }
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for InMemoryPosts {
    async fn fetch_by_ids(
        &self,
        ids: &[u64],
        limit: u16,
        offset: u64,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let mode = FetchMode::resolve(ids, limit, offset)?;
        self.check()?;
        let posts = self.posts.lock().await;
        let newest_first = posts.values().rev().cloned();
        Ok(match mode {
            FetchMode::ByIds(ids) => newest_first.filter(|post| ids.contains(&post.id)).collect(),
            FetchMode::Page { limit, offset } => newest_first
                .skip(offset as usize)
                .take(limit as usize)
                .collect(),
        })
    }

    async fn insert(&self, post: &NewPost) -> Result<u64, RepoError> {
        self.check()?;
        let mut posts = self.posts.lock().await;
        let id = posts.keys().next_back().copied().unwrap_or(0) + 1;
        posts.insert(
            id,
            PostRecord {
                id,
                title: post.title().to_string(),
                body: post.body().to_string(),
                created_at: BASE_TIME + time::Duration::seconds(id as i64),
            },
        );
        Ok(id)
    }

    async fn delete(&self, ids: &[u64]) -> Result<u64, RepoError> {
        if ids.is_empty() {
            return Err(RepoError::invalid_input("no post ids to delete"));
        }
        self.check()?;
        let mut posts = self.posts.lock().await;
        Ok(ids.iter().filter(|id| posts.remove(*id).is_some()).count() as u64)
    }
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryPosts>,
    pub ranking: Arc<MemoryRanking>,
    pub materializer: Arc<CacheMaterializer>,
    pub service: Arc<PostService>,
}

impl TestApp {
    pub fn new() -> Self {
        let repo = Arc::new(InMemoryPosts::default());
        let ranking = Arc::new(MemoryRanking::new());
        let materializer = Arc::new(CacheMaterializer::new(
            ranking.clone(),
            repo.clone(),
            Arc::new(PopularCache::new()),
            MAX_POPULAR_LIMIT,
        ));
        let recorder = Arc::new(VisitRecorder::new(ranking.clone(), materializer.clone()));
        let service = Arc::new(PostService::new(repo.clone(), recorder));
        let router = build_router(HttpState {
            posts: service.clone(),
            db: None,
        });

        Self {
            router,
            repo,
            ranking,
            materializer,
            service,
        }
    }

    pub async fn seed(&self, count: u64) -> Vec<u64> {
        let mut ids = Vec::new();
        for n in 1..=count {
            let post = NewPost::new(format!("title{n}"), format!("test body {n}"))
                .expect("valid post");
            ids.push(self.repo.insert(&post).await.expect("insert"));
        }
        ids
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_form(&self, form: &str) -> (StatusCode, Value) {
        self.send(
            Request::post("/posts")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Ids currently listed by `/posts/top10`, in order.
    pub async fn top_ids(&self) -> Vec<u64> {
        let (status, body) = self.get("/posts/top10").await;
        assert_eq!(status, StatusCode::OK);
        body["result"]
            .as_array()
            .expect("result array")
            .iter()
            .map(|post| post["id"].as_u64().expect("numeric id"))
            .collect()
    }

    /// Poll `/posts/top10` until it reports `expected`; background work has no completion signal.
    pub async fn wait_for_top(&self, expected: &[u64]) {
        for _ in 0..200 {
            if self.top_ids().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(self.top_ids().await, expected, "popular posts never converged");
    }

    /// Poll until `id` reaches `score` visits.
    pub async fn wait_for_score(&self, id: u64, score: u64) {
        for _ in 0..200 {
            if self.ranking.score(id).await.unwrap() == Some(score) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("post {id} never reached {score} visits");
    }
}
