//! Materialized snapshot of the most visited posts.

use std::sync::Mutex;

use dashmap::DashMap;

use crate::domain::entities::{PostRecord, PostSnapshot};

use super::lock::mutex_lock;

const SOURCE: &str = "cache::popular";

#[derive(Debug, Clone)]
struct RankedSnapshot {
    rank: usize,
    snapshot: PostSnapshot,
}

/// Post id -> snapshot map filled by the materializer.
///
/// Entries are sharded, so a reader never blocks a rebuild, but a clear
/// followed by a fill is not atomic as a whole: a concurrent
/// [`snapshot`](PopularCache::snapshot) may see zero or some of the entries.
///
/// Writers are fenced by a generation. Each rebuild claims a new one with
/// [`begin`](PopularCache::begin), and clearing or filling under an older
/// generation is refused, so the map only ever holds entries of one rebuild.
#[derive(Debug, Default)]
pub struct PopularCache {
    entries: DashMap<u64, RankedSnapshot>,
    generation: Mutex<u64>,
}

impl PopularCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current entries in rank order (most visited first).
    pub fn snapshot(&self) -> Vec<PostRecord> {
        let mut ranked: Vec<(usize, u64, PostSnapshot)> = self
            .entries
            .iter()
            .map(|entry| (entry.rank, *entry.key(), entry.snapshot.clone()))
            .collect();
        ranked.sort_by_key(|(rank, id, _)| (*rank, *id));
        ranked
            .into_iter()
            .map(|(_, id, snapshot)| snapshot.into_record(id))
            .collect()
    }

    pub fn get(&self, id: u64) -> Option<PostSnapshot> {
        self.entries.get(&id).map(|entry| entry.snapshot.clone())
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<u64> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Claim a new write generation, superseding any rebuild still in flight.
    pub(crate) fn begin(&self) -> u64 {
        let mut current = mutex_lock(&self.generation, SOURCE, "begin");
        *current += 1;
        *current
    }

    /// Evict everything, unless `generation` has been superseded.
    pub(crate) fn clear(&self, generation: u64) -> bool {
        let current = mutex_lock(&self.generation, SOURCE, "clear");
        if *current != generation {
            return false;
        }
        self.entries.clear();
        true
    }

    /// Insert `(rank, post)` pairs, unless `generation` has been superseded.
    pub(crate) fn fill(
        &self,
        generation: u64,
        ranked: impl IntoIterator<Item = (usize, PostRecord)>,
    ) -> bool {
        let current = mutex_lock(&self.generation, SOURCE, "fill");
        if *current != generation {
            return false;
        }
        for (rank, post) in ranked {
            self.entries.insert(
                post.id,
                RankedSnapshot {
                    rank,
                    snapshot: PostSnapshot::from(post),
                },
            );
        }
        true
    }
}
