//! Popular-posts cache.
//!
//! Visits to posts feed a [`RankingStore`] (post id -> visit count). After
//! every batch of visits, and after every delete, the [`CacheMaterializer`]
//! recomputes the top posts and replaces the contents of the
//! [`PopularCache`] wholesale:
//!
//! ```text
//! read ──► VisitRecorder ──► RankingStore ──► CacheMaterializer ──► PopularCache
//! delete ─────────────────► RankingStore ──┘
//! ```
//!
//! The cache is advisory. Readers may briefly observe it empty or partially
//! filled while a rebuild runs, and it converges once traffic stops.

mod config;
mod lock;
mod materializer;
mod popular;
mod ranking;
mod recorder;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{MAX_POPULAR_LIMIT, PopularityConfig, RankingBackend};
pub use materializer::{CacheMaterializer, RebuildError};
pub use popular::PopularCache;
pub use ranking::{MemoryRanking, RankingError, RankingStore};
pub use recorder::VisitRecorder;

pub const METRIC_VISITS_RECORDED: &str = "hotposts_visits_recorded_total";
pub const METRIC_RANKING_UNAVAILABLE: &str = "hotposts_ranking_unavailable_total";
pub const METRIC_REBUILD_TOTAL: &str = "hotposts_rebuild_total";
pub const METRIC_REBUILD_FAILED: &str = "hotposts_rebuild_failed_total";
pub const METRIC_REBUILD_MS: &str = "hotposts_rebuild_ms";
pub const METRIC_POPULAR_ENTRIES: &str = "hotposts_popular_entries";
