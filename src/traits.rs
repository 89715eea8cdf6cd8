use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;

use crate::error::Result;
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

// For types that are in charge of keeping banners and their version history.
#[async_trait]
pub trait BannerStore: Debug + Send + Sync + 'static {
    /// Creates a banner with version 1. The banner row, its content and all tag associations are written atomically.
    /// If the banner is requested active, none of its (tag, feature) pairs may be claimed by another active banner.
    async fn create(&self, banner: NewBanner) -> Result<BannerId>;

    /// Appends a new version, filling blank fields from the last one. Returns the number of the new version.
    async fn update(&self, update: BannerUpdate) -> Result<Version>;

    /// Removes the banner along with its history and tag associations.
    async fn delete(&self, banner_id: BannerId) -> Result<()>;

    /// Content of the active version of the only banner associated with both the tag and the feature.
    async fn get_for_user(&self, tag_id: TagId, feature_id: FeatureId) -> Result<Content>;

    /// Banners at their latest version, tags merged, activity computed against the active pointers.
    async fn get_for_admin(&self, query: AdminQuery) -> Result<Vec<Banner>>;

    /// Repoints the active version of a banner to any existing version of it.
    async fn set_version_active(&self, banner_id: BannerId, version: Version) -> Result<()>;

    /// Active pointers of all banners that have one.
    async fn banner_active_versions(&self) -> Result<HashMap<BannerId, Version>>;

    /// Full history of a banner, oldest version first.
    async fn version_history(&self, banner_id: BannerId) -> Result<Vec<VersionSnapshot>>;
}
