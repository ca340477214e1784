//! Visit ranking: an ordered score index over post ids.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::ranking";

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("ranking store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("post id {id} is outside the range supported by the ranking store")]
    OutOfRange { id: u64 },
}

impl RankingError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

/// Score index keyed by post id.
///
/// Scores only grow: each [`record_visit`](RankingStore::record_visit) adds
/// one, and the entry disappears entirely on [`remove`](RankingStore::remove).
/// [`top_n`](RankingStore::top_n) orders by score descending, breaking ties by
/// ascending id.
#[async_trait]
pub trait RankingStore: Send + Sync {
    /// Add one visit to `id`, returning the new score.
    async fn record_visit(&self, id: u64) -> Result<u64, RankingError>;

    /// Drop the entry for `id`. Returns whether an entry existed.
    async fn remove(&self, id: u64) -> Result<bool, RankingError>;

    /// Up to `n` ids, highest score first.
    async fn top_n(&self, n: usize) -> Result<Vec<u64>, RankingError>;

    async fn score(&self, id: u64) -> Result<Option<u64>, RankingError>;
}

#[derive(Debug, Default)]
struct RankingState {
    scores: HashMap<u64, u64>,
    // (Reverse(score), id) iterates highest score first, then lowest id.
    order: BTreeSet<(Reverse<u64>, u64)>,
}

/// In-process ranking backed by an ordered set.
#[derive(Debug, Default)]
pub struct MemoryRanking {
    state: Mutex<RankingState>,
}

impl MemoryRanking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.state, SOURCE, "len").scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RankingStore for MemoryRanking {
    async fn record_visit(&self, id: u64) -> Result<u64, RankingError> {
        let mut state = mutex_lock(&self.state, SOURCE, "record_visit");
        let previous = state.scores.get(&id).copied().unwrap_or(0);
        let score = previous.saturating_add(1);
        if previous > 0 {
            state.order.remove(&(Reverse(previous), id));
        }
        state.scores.insert(id, score);
        state.order.insert((Reverse(score), id));
        Ok(score)
    }

    async fn remove(&self, id: u64) -> Result<bool, RankingError> {
        let mut state = mutex_lock(&self.state, SOURCE, "remove");
        match state.scores.remove(&id) {
            Some(score) => {
                state.order.remove(&(Reverse(score), id));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn top_n(&self, n: usize) -> Result<Vec<u64>, RankingError> {
        let state = mutex_lock(&self.state, SOURCE, "top_n");
        Ok(state.order.iter().take(n).map(|(_, id)| *id).collect())
    }

    async fn score(&self, id: u64) -> Result<Option<u64>, RankingError> {
        Ok(mutex_lock(&self.state, SOURCE, "score")
            .scores
            .get(&id)
            .copied())
    }
}
