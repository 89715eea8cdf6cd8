use std::sync::Arc;

use tracing::debug;
use tracing::instrument;

use crate::cache::BannerCache;
use crate::entry::CacheKey;
use crate::error::BannerError;
use crate::error::Result;
use crate::traits::BannerStore;
use crate::types::AdminQuery;
use crate::types::Banner;
use crate::types::BannerId;
use crate::types::BannerUpdate;
use crate::types::Content;
use crate::types::FeatureId;
use crate::types::NewBanner;
use crate::types::TagId;
use crate::types::Version;
use crate::types::VersionSnapshot;

/// What transport adapters talk to.
///
/// User reads go through the cache and populate it on a miss. Everything else, including user reads with `use_latest`
/// set, goes straight to the store. Writes never touch the cache: a changed banner may be served from the cache for
/// up to the cache TTL.
pub struct BannerService<S: BannerStore> {
    store: Arc<S>,
    cache: Arc<BannerCache>,
}

impl<S: BannerStore> Clone for BannerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<S: BannerStore> BannerService<S> {
    pub fn new(store: Arc<S>, cache: Arc<BannerCache>) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<BannerCache> {
        &self.cache
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn get_for_user(&self, tag_id: TagId, feature_id: FeatureId, use_latest: bool) -> Result<Content> {
        positive("tag ID", tag_id)?;
        positive("feature ID", feature_id)?;

        if use_latest {
            return self.store.get_for_user(tag_id, feature_id).await;
        }

        let key = CacheKey::new(feature_id, tag_id);
        if let Some(content) = self.cache.get(&key).await {
            return Ok(content);
        }

        let content = self.store.get_for_user(tag_id, feature_id).await?;
        self.cache.set(key, content.clone()).await;
        Ok(content)
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn get_for_admin(&self, query: AdminQuery) -> Result<Vec<Banner>> {
        if let Some(tag_id) = query.tag_id {
            not_negative("tag ID", tag_id)?;
        }
        if let Some(feature_id) = query.feature_id {
            not_negative("feature ID", feature_id)?;
        }

        self.store.get_for_admin(query).await
    }

    #[instrument(level = "debug", skip(self, banner))]
    pub async fn create(&self, mut banner: NewBanner) -> Result<BannerId> {
        if banner.tag_ids.is_empty() {
            return Err(BannerError::Validation("at least one tag ID is required".into()));
        }
        banner.tag_ids = unique_tags(banner.tag_ids)?;
        positive("feature ID", banner.feature_id)?;
        if banner.content.has_blanks() {
            return Err(BannerError::Validation("title, text and url are all required".into()));
        }

        let banner_id = self.store.create(banner).await?;
        debug!(banner_id, "created");
        Ok(banner_id)
    }

    #[instrument(level = "debug", skip(self, update), fields(banner_id = update.id))]
    pub async fn update(&self, mut update: BannerUpdate) -> Result<Version> {
        positive("banner ID", update.id)?;
        update.tag_ids = unique_tags(update.tag_ids)?;
        not_negative("feature ID", update.feature_id)?;

        let version = self.store.update(update).await?;
        debug!(version, "updated");
        Ok(version)
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn delete(&self, banner_id: BannerId) -> Result<()> {
        positive("banner ID", banner_id)?;
        self.store.delete(banner_id).await
    }

    /// Make an earlier (or later) version the one users see. This is how a rollback is done.
    #[instrument(level = "debug", skip(self))]
    pub async fn set_version_active(&self, banner_id: BannerId, version: Version) -> Result<()> {
        positive("banner ID", banner_id)?;
        positive("version", version)?;
        self.store.set_version_active(banner_id, version).await
    }

    #[instrument(level = "trace", skip(self))]
    pub async fn version_history(&self, banner_id: BannerId) -> Result<Vec<VersionSnapshot>> {
        positive("banner ID", banner_id)?;
        self.store.version_history(banner_id).await
    }
}

fn positive(what: &str, value: i32) -> Result<()> {
    if value > 0 {
        Ok(())
    }
    else {
        Err(BannerError::Validation(format!("{what} must be positive, got {value}")))
    }
}

fn not_negative(what: &str, value: i32) -> Result<()> {
    if value >= 0 {
        Ok(())
    }
    else {
        Err(BannerError::Validation(format!("{what} must not be negative, got {value}")))
    }
}

// Drops repeated tags, first occurrence wins.
fn unique_tags(tag_ids: Vec<TagId>) -> Result<Vec<TagId>> {
    let mut unique = Vec::with_capacity(tag_ids.len());
    for tag_id in tag_ids {
        positive("tag ID", tag_id)?;
        if !unique.contains(&tag_id) {
            unique.push(tag_id);
        }
    }
    Ok(unique)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::MemoryStore;
    use std::time::Duration;

    fn service() -> BannerService<MemoryStore> {
        let cache = BannerCache::builder()
            .ttl(Duration::from_secs(60))
            .build()
            .expect("cache builds");
        BannerService::new(Arc::new(MemoryStore::new()), cache)
    }

    fn new_banner(tag_ids: Vec<TagId>, feature_id: FeatureId, title: &str) -> NewBanner {
        NewBanner {
            tag_ids,
            feature_id,
            content: Content::new(title, "text", "https://example.com"),
            is_active: true,
        }
    }

    #[test]
    fn test_unique_tags() {
        assert_eq!(unique_tags(vec![3, 1, 3, 2, 1]).unwrap(), vec![3, 1, 2]);
        assert_eq!(unique_tags(vec![1, 0]).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let service = service();

        let err = service.create(new_banner(vec![], 1, "t")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = service.create(new_banner(vec![1], 0, "t")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = service.create(new_banner(vec![1], 1, "")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = service.get_for_user(0, 1, false).await.unwrap_err();
        assert_eq!(err.status_code(), 400);

        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_create_drops_duplicate_tags() {
        let service = service();
        let id = service.create(new_banner(vec![2, 1, 2], 5, "t")).await.unwrap();

        let history = service.version_history(id).await.unwrap();
        assert_eq!(history[0].tag_ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_read_through_serves_stale_until_ttl() {
        let service = service();
        let id = service.create(new_banner(vec![1], 1, "first")).await.unwrap();

        assert_eq!(service.get_for_user(1, 1, false).await.unwrap().title, "first");

        service
            .update(BannerUpdate {
                id,
                content: Content::new("second", "", ""),
                is_active: true,
                ..Default::default()
            })
            .await
            .unwrap();

        // Cached value stays until it expires.
        assert_eq!(service.get_for_user(1, 1, false).await.unwrap().title, "first");
        // The latest content is only a use_latest away, and reading it doesn't refresh the cache.
        assert_eq!(service.get_for_user(1, 1, true).await.unwrap().title, "second");
        assert_eq!(service.get_for_user(1, 1, false).await.unwrap().title, "first");
    }

    #[tokio::test]
    async fn test_miss_is_not_cached() {
        let service = service();

        let err = service.get_for_user(1, 1, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(service.cache().is_empty().await);

        service.create(new_banner(vec![1], 1, "late")).await.unwrap();
        assert_eq!(service.get_for_user(1, 1, false).await.unwrap().title, "late");
    }
}
