use std::fmt::Debug;
use std::fmt::Display;
use std::sync::Arc;
use tokio::time::Instant;

use crate::types::Content;
use crate::types::FeatureId;
use crate::types::TagId;

/// Cache key of a user lookup: the feature ID followed by the tag ID. Several tags of the same banner occupy separate
/// slots.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    pub fn new(feature_id: FeatureId, tag_id: TagId) -> Self {
        Self(Arc::from(format!("{feature_id}:{tag_id}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CacheKey({})", self.0)
    }
}

/// Content believed active for a key, valid until `expires_at`.
#[derive(Clone)]
pub struct CacheEntry {
    content:    Content,
    expires_at: Instant,
}

impl CacheEntry {
    pub(crate) fn new(content: Content, expires_at: Instant) -> Self {
        Self { content, expires_at }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at <= now
    }

    pub fn into_content(self) -> Content {
        self.content
    }
}

impl Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("content", &self.content)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
