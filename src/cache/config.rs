//! Popular-posts cache configuration.

use std::str::FromStr;

use serde::Deserialize;

/// Largest number of posts the popular cache will hold.
pub const MAX_POPULAR_LIMIT: usize = 10;

/// Where visit counts are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingBackend {
    /// Process-local ordered set; counts are lost on restart.
    Memory,
    /// `post_visits` table in the primary database.
    Postgres,
}

impl RankingBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            RankingBackend::Memory => "memory",
            RankingBackend::Postgres => "postgres",
        }
    }
}

impl FromStr for RankingBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(RankingBackend::Memory),
            "postgres" => Ok(RankingBackend::Postgres),
            other => Err(format!(
                "unknown ranking backend `{other}` (expected `memory` or `postgres`)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PopularityConfig {
    pub backend: RankingBackend,
    /// Number of top-ranked posts materialized on each rebuild.
    pub limit: usize,
}

impl Default for PopularityConfig {
    fn default() -> Self {
        Self {
            backend: RankingBackend::Postgres,
            limit: MAX_POPULAR_LIMIT,
        }
    }
}

impl From<&crate::config::RankingSettings> for PopularityConfig {
    fn from(settings: &crate::config::RankingSettings) -> Self {
        Self {
            backend: settings.backend,
            limit: settings.top_k.get(),
        }
    }
}

impl PopularityConfig {
    /// The configured limit, never above [`MAX_POPULAR_LIMIT`] and never zero.
    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, MAX_POPULAR_LIMIT)
    }
}
