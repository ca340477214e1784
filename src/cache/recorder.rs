//! Background recording of post visits.

use std::sync::Arc;

use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use super::materializer::CacheMaterializer;
use super::ranking::{RankingError, RankingStore};
use super::{METRIC_RANKING_UNAVAILABLE, METRIC_VISITS_RECORDED};

/// Feeds visits into the ranking and keeps the popular cache in step.
///
/// Every failure is logged and swallowed here: ranking and cache problems
/// must never change the outcome of the read or delete that triggered them.
pub struct VisitRecorder {
    ranking: Arc<dyn RankingStore>,
    materializer: Arc<CacheMaterializer>,
}

impl VisitRecorder {
    pub fn new(ranking: Arc<dyn RankingStore>, materializer: Arc<CacheMaterializer>) -> Self {
        Self {
            ranking,
            materializer,
        }
    }

    pub fn materializer(&self) -> &Arc<CacheMaterializer> {
        &self.materializer
    }

    /// Record one visit per id, then rebuild the popular cache once.
    #[instrument(skip(self, ids), fields(posts = ids.len()))]
    pub async fn record_visits(&self, ids: &[u64]) {
        if ids.is_empty() {
            return;
        }

        for &id in ids {
            match self.ranking.record_visit(id).await {
                Ok(score) => {
                    counter!(METRIC_VISITS_RECORDED).increment(1);
                    debug!(target = "hotposts::visits", post_id = id, score, "visit recorded");
                }
                Err(err) => report_ranking_error("record_visit", id, &err),
            }
        }

        self.rebuild().await;
    }

    /// Fire-and-forget [`record_visits`](Self::record_visits) on the runtime.
    ///
    /// The handle is only useful to tests; request handlers drop it.
    pub fn spawn(self: &Arc<Self>, ids: Vec<u64>) -> JoinHandle<()> {
        let recorder = Arc::clone(self);
        tokio::spawn(async move {
            recorder.record_visits(&ids).await;
        })
    }

    /// Drop deleted posts from the ranking, then rebuild in the background.
    ///
    /// Ranking removal happens before this returns; the rebuild does not.
    #[instrument(skip(self, ids), fields(posts = ids.len()))]
    pub async fn forget(self: &Arc<Self>, ids: &[u64]) -> JoinHandle<()> {
        for &id in ids {
            match self.ranking.remove(id).await {
                Ok(removed) => {
                    debug!(target = "hotposts::visits", post_id = id, removed, "ranking entry dropped");
                }
                Err(err) => report_ranking_error("remove", id, &err),
            }
        }
        self.spawn_rebuild()
    }

    /// Rebuild the popular cache on the runtime, logging any failure.
    pub fn spawn_rebuild(self: &Arc<Self>) -> JoinHandle<()> {
        let recorder = Arc::clone(self);
        tokio::spawn(async move {
            recorder.rebuild().await;
        })
    }

    async fn rebuild(&self) {
        if let Err(err) = self.materializer.rebuild().await {
            error!(
                target = "hotposts::cache",
                error = %err,
                "failed to rebuild popular posts cache"
            );
        }
    }
}

fn report_ranking_error(op: &'static str, post_id: u64, err: &RankingError) {
    if matches!(err, RankingError::StoreUnavailable(_)) {
        counter!(METRIC_RANKING_UNAVAILABLE).increment(1);
    }
    warn!(
        target = "hotposts::visits",
        op,
        post_id,
        error = %err,
        "ranking update failed"
    );
}
