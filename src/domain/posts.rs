//! Validation rules for new posts.

use super::error::DomainError;

/// Column width of `posts.title`.
pub const MAX_TITLE_CHARS: usize = 100;
/// Column width of `posts.body`.
pub const MAX_BODY_CHARS: usize = 500;

/// A validated, not yet persisted post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    title: String,
    body: String,
}

impl NewPost {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Result<Self, DomainError> {
        let title = title.into();
        let body = body.into();

        if title.trim().is_empty() {
            return Err(DomainError::empty("title"));
        }
        if body.trim().is_empty() {
            return Err(DomainError::empty("body"));
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(DomainError::too_long("title", MAX_TITLE_CHARS));
        }
        if body.chars().count() > MAX_BODY_CHARS {
            return Err(DomainError::too_long("body", MAX_BODY_CHARS));
        }

        Ok(Self { title, body })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}
