//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

/// A post as stored by the backing repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: u64,
    pub title: String,
    pub body: String,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

/// Denormalized copy of a post held by the popular-posts cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSnapshot {
    pub title: String,
    pub body: String,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

impl PostSnapshot {
    pub fn into_record(self, id: u64) -> PostRecord {
        PostRecord {
            id,
            title: self.title,
            body: self.body,
            created_at: self.created_at,
        }
    }
}

impl From<PostRecord> for PostSnapshot {
    fn from(record: PostRecord) -> Self {
        Self {
            title: record.title,
            body: record.body,
            created_at: record.created_at,
        }
    }
}
