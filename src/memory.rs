//! In-process implementation of [`BannerStore`].
//!
//! Holds everything behind a single lock, so every operation is trivially atomic. Meant for tests and for embedding
//! where persistence isn't needed; behaviour matches [`DbStore`](crate::db::DbStore).

use std::collections::BTreeMap;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;
use tracing::warn;

use crate::collision;
use crate::error::BannerError;
use crate::error::Result;
use crate::listing;
use crate::listing::AssociationRow;
use crate::resolver;
use crate::traits::BannerStore;
use crate::types::AdminQuery;
use crate::types::Banner;
use crate::types::BannerId;
use crate::types::BannerUpdate;
use crate::types::Claim;
use crate::types::Content;
use crate::types::FeatureId;
use crate::types::NewBanner;
use crate::types::TagId;
use crate::types::Version;
use crate::types::VersionSnapshot;
use crate::types::FIRST_VERSION;
use crate::types::NO_ACTIVE_VERSION;

#[derive(Debug)]
struct StoredBanner {
    active_version: Version,
    last_version:   Version,
    created_at:     DateTime<Utc>,
    updated_at:     DateTime<Utc>,
    versions:       BTreeMap<Version, VersionSnapshot>,
}

impl StoredBanner {
    fn active(&self) -> Option<&VersionSnapshot> {
        self.versions.get(&self.active_version)
    }

    fn last(&self) -> Option<&VersionSnapshot> {
        self.versions.get(&self.last_version)
    }
}

#[derive(Debug, Default)]
struct State {
    last_id: BannerId,
    banners: BTreeMap<BannerId, StoredBanner>,
}

impl State {
    fn claims(&self, tag_ids: &[TagId], feature_id: FeatureId) -> Vec<Claim> {
        let mut claims = vec![];
        for (banner_id, banner) in &self.banners {
            let Some(active) = banner.active()
            else {
                continue;
            };
            if active.feature_id != feature_id {
                continue;
            }
            for tag_id in active.tag_ids.iter().filter(|t| tag_ids.contains(t)) {
                claims.push(Claim {
                    banner_id: *banner_id,
                    version: active.version,
                    tag_id: *tag_id,
                    feature_id,
                });
            }
        }
        claims
    }

    fn banner(&self, banner_id: BannerId) -> Result<&StoredBanner> {
        self.banners
            .get(&banner_id)
            .ok_or_else(|| BannerError::banner_not_found(banner_id))
    }

    fn banner_mut(&mut self, banner_id: BannerId) -> Result<&mut StoredBanner> {
        self.banners
            .get_mut(&banner_id)
            .ok_or_else(|| BannerError::banner_not_found(banner_id))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored banners, active or not.
    pub fn len(&self) -> usize {
        self.state.read().banners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BannerStore for MemoryStore {
    async fn create(&self, banner: NewBanner) -> Result<BannerId> {
        let mut state = self.state.write();

        if banner.is_active {
            collision::ensure_unclaimed(None, &state.claims(&banner.tag_ids, banner.feature_id))?;
        }

        state.last_id += 1;
        let banner_id = state.last_id;
        let now = Utc::now();
        let first = VersionSnapshot {
            banner_id,
            version: FIRST_VERSION,
            tag_ids: banner.tag_ids,
            feature_id: banner.feature_id,
            content: banner.content,
            updated_at: now,
        };

        state.banners.insert(
            banner_id,
            StoredBanner {
                active_version: if banner.is_active {
                    FIRST_VERSION
                }
                else {
                    NO_ACTIVE_VERSION
                },
                last_version:   FIRST_VERSION,
                created_at:     now,
                updated_at:     now,
                versions:       BTreeMap::from([(FIRST_VERSION, first)]),
            },
        );

        debug!(banner_id, active = banner.is_active, "banner created");
        Ok(banner_id)
    }

    async fn update(&self, update: BannerUpdate) -> Result<Version> {
        let mut state = self.state.write();
        let banner_id = update.id;

        let last = state
            .banner(banner_id)?
            .last()
            .cloned()
            .ok_or_else(|| BannerError::Internal(format!("banner {banner_id} has no versions")))?;
        let resolved = resolver::resolve(&update, last);

        if update.is_active {
            collision::ensure_unclaimed(
                Some(banner_id),
                &state.claims(&resolved.tag_ids, resolved.feature_id),
            )?;
        }

        let now = Utc::now();
        let banner = state.banner_mut(banner_id)?;
        banner.versions.insert(
            resolved.version,
            VersionSnapshot {
                banner_id,
                version: resolved.version,
                tag_ids: resolved.tag_ids,
                feature_id: resolved.feature_id,
                content: resolved.content,
                updated_at: now,
            },
        );
        banner.last_version = resolved.version;
        banner.updated_at = now;
        banner.active_version = if update.is_active {
            resolved.version
        }
        else {
            NO_ACTIVE_VERSION
        };

        Ok(resolved.version)
    }

    async fn delete(&self, banner_id: BannerId) -> Result<()> {
        self.state
            .write()
            .banners
            .remove(&banner_id)
            .map(|_| ())
            .ok_or_else(|| BannerError::banner_not_found(banner_id))
    }

    async fn get_for_user(&self, tag_id: TagId, feature_id: FeatureId) -> Result<Content> {
        let state = self.state.read();
        let claims = state.claims(&[tag_id], feature_id);

        match claims.as_slice() {
            [claim] => Ok(state
                .banner(claim.banner_id)?
                .active()
                .map(|v| v.content.clone())
                .ok_or_else(|| BannerError::version_not_found(claim.banner_id, claim.version))?),
            claims => {
                if !claims.is_empty() {
                    warn!(
                        "{} active banners claim tag {tag_id} and feature {feature_id}",
                        claims.len()
                    );
                }
                Err(BannerError::NotFound(format!(
                    "active banner for tag {tag_id} and feature {feature_id}"
                )))
            }
        }
    }

    async fn get_for_admin(&self, query: AdminQuery) -> Result<Vec<Banner>> {
        let query = query.normalized();
        let state = self.state.read();

        let rows = state.banners.values().filter_map(|b| b.last()).flat_map(|last| {
            last.tag_ids.iter().map(|tag_id| AssociationRow {
                banner_id:  last.banner_id,
                version:    last.version,
                feature_id: last.feature_id,
                tag_id:     *tag_id,
            })
        });
        let page = listing::paginate(
            listing::merge_tag_rows(rows)
                .into_iter()
                .filter(|m| query.matches(&m.tag_ids, m.feature_id))
                .collect(),
            query.limit,
            query.offset,
        );

        let mut banners = Vec::with_capacity(page.len());
        for m in page {
            let stored = state.banner(m.banner_id)?;
            let version = stored
                .versions
                .get(&m.version)
                .ok_or_else(|| BannerError::version_not_found(m.banner_id, m.version))?;
            banners.push(Banner {
                id:         m.banner_id,
                tag_ids:    m.tag_ids,
                feature_id: m.feature_id,
                is_active:  false,
                version:    m.version,
                content:    version.content.clone(),
                created_at: stored.created_at,
                updated_at: stored.updated_at,
            });
        }

        let active_versions = state
            .banners
            .iter()
            .filter(|(_, b)| b.active_version != NO_ACTIVE_VERSION)
            .map(|(id, b)| (*id, b.active_version))
            .collect::<HashMap<_, _>>();
        listing::resolve_active_flags(&mut banners, &active_versions);

        Ok(banners)
    }

    async fn set_version_active(&self, banner_id: BannerId, version: Version) -> Result<()> {
        let mut state = self.state.write();
        let banner = state.banner(banner_id)?;

        if banner.active_version == version {
            return Ok(());
        }

        let target = banner
            .versions
            .get(&version)
            .ok_or_else(|| BannerError::version_not_found(banner_id, version))?;
        collision::ensure_unclaimed(Some(banner_id), &state.claims(&target.tag_ids, target.feature_id))?;

        let banner = state.banner_mut(banner_id)?;
        banner.active_version = version;
        banner.updated_at = Utc::now();
        Ok(())
    }

    async fn banner_active_versions(&self) -> Result<HashMap<BannerId, Version>> {
        Ok(self
            .state
            .read()
            .banners
            .iter()
            .filter(|(_, b)| b.active_version != NO_ACTIVE_VERSION)
            .map(|(id, b)| (*id, b.active_version))
            .collect())
    }

    async fn version_history(&self, banner_id: BannerId) -> Result<Vec<VersionSnapshot>> {
        Ok(self
            .state
            .read()
            .banner(banner_id)?
            .versions
            .values()
            .cloned()
            .collect())
    }
}
