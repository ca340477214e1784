//! Rebuilds the popular cache from the ranking and the posts repository.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::application::repos::{PostsRepo, RepoError};

use super::popular::PopularCache;
use super::ranking::{RankingError, RankingStore};
use super::{
    METRIC_POPULAR_ENTRIES, METRIC_REBUILD_FAILED, METRIC_REBUILD_MS, METRIC_REBUILD_TOTAL,
};

#[derive(Debug, Error)]
pub enum RebuildError {
    /// Ranking could not be read. On the first read the previous cache
    /// contents are kept.
    #[error("failed to read ranking: {0}")]
    Ranking(#[from] RankingError),
    /// Posts could not be fetched; the cache was left empty.
    #[error("failed to fetch popular posts: {0}")]
    Repository(#[from] RepoError),
}

/// How many times one rebuild re-reads the ranking after pruning ids whose
/// posts no longer exist.
const MAX_FETCH_PASSES: usize = 3;

/// Replaces the [`PopularCache`] with the current top posts.
///
/// A rebuild claims a cache generation, reads the top ids, clears the cache,
/// fetches those posts and fills them in. A rebuild that is overtaken by a
/// newer one stops writing, so the cache converges on the last rebuild
/// started and never mixes two of them.
///
/// Ranked ids the repository no longer returns belong to deleted posts (ids
/// are never reused). They are dropped from the ranking and the top ids are
/// read again, so a visit that lands after its post was deleted cannot hold a
/// slot.
pub struct CacheMaterializer {
    ranking: Arc<dyn RankingStore>,
    posts: Arc<dyn PostsRepo>,
    popular: Arc<PopularCache>,
    limit: usize,
}

impl CacheMaterializer {
    pub fn new(
        ranking: Arc<dyn RankingStore>,
        posts: Arc<dyn PostsRepo>,
        popular: Arc<PopularCache>,
        limit: usize,
    ) -> Self {
        Self {
            ranking,
            posts,
            popular,
            limit,
        }
    }

    pub fn popular(&self) -> &Arc<PopularCache> {
        &self.popular
    }

    /// Recompute the cache, returning how many posts it now holds.
    #[instrument(skip(self), fields(limit = self.limit))]
    pub async fn rebuild(&self) -> Result<usize, RebuildError> {
        let started = Instant::now();
        counter!(METRIC_REBUILD_TOTAL).increment(1);

        let result = self.replace_entries().await;

        histogram!(METRIC_REBUILD_MS).record(started.elapsed().as_secs_f64() * 1000.0);
        gauge!(METRIC_POPULAR_ENTRIES).set(self.popular.len() as f64);
        if result.is_err() {
            counter!(METRIC_REBUILD_FAILED).increment(1);
        }

        result
    }

    async fn replace_entries(&self) -> Result<usize, RebuildError> {
        let generation = self.popular.begin();
        let mut ids = self.ranking.top_n(self.limit).await?;

        // Full invalidation: a failed fetch below leaves the cache empty
        // instead of mixing two generations.
        if !self.popular.clear(generation) {
            return Ok(self.superseded(generation));
        }

        let mut posts = Vec::new();
        for pass in 1..=MAX_FETCH_PASSES {
            if ids.is_empty() {
                break;
            }
            posts = self.posts.fetch_by_ids(&ids, 0, 0).await?;

            let missing: Vec<u64> = ids
                .iter()
                .copied()
                .filter(|id| !posts.iter().any(|post| post.id == *id))
                .collect();
            if missing.is_empty() {
                break;
            }
            self.drop_deleted(&missing).await;
            if pass == MAX_FETCH_PASSES {
                break;
            }
            ids = self.ranking.top_n(self.limit).await?;
            posts.clear();
        }

        if ids.is_empty() {
            debug!(target = "hotposts::cache", "ranking empty; popular cache cleared");
            return Ok(0);
        }

        let ranks: HashMap<u64, usize> = ids
            .iter()
            .enumerate()
            .map(|(rank, id)| (*id, rank))
            .collect();
        let ranked = posts
            .into_iter()
            .filter_map(|post| ranks.get(&post.id).map(|rank| (*rank, post)));

        if !self.popular.fill(generation, ranked) {
            return Ok(self.superseded(generation));
        }

        let stored = self.popular.len();
        debug!(
            target = "hotposts::cache",
            ranked = ids.len(),
            stored,
            "popular cache rebuilt"
        );
        Ok(stored)
    }

    async fn drop_deleted(&self, ids: &[u64]) {
        for &id in ids {
            match self.ranking.remove(id).await {
                Ok(_) => debug!(
                    target = "hotposts::cache",
                    post_id = id,
                    "dropped ranking entry of a deleted post"
                ),
                Err(err) => warn!(
                    target = "hotposts::cache",
                    post_id = id,
                    error = %err,
                    "failed to drop ranking entry of a deleted post"
                ),
            }
        }
    }

    fn superseded(&self, generation: u64) -> usize {
        debug!(
            target = "hotposts::cache",
            generation, "newer rebuild started; discarding this one"
        );
        self.popular.len()
    }
}
