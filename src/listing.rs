use std::collections::btree_map;
use std::collections::BTreeMap;
use std::collections::HashMap;

use crate::types::Banner;
use crate::types::BannerId;
use crate::types::FeatureId;
use crate::types::TagId;
use crate::types::Version;

/// A single (banner, version, feature, tag) association as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociationRow {
    pub banner_id:  BannerId,
    pub version:    Version,
    pub feature_id: FeatureId,
    pub tag_id:     TagId,
}

/// All tags of one banner version for one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedAssociation {
    pub banner_id:  BannerId,
    pub version:    Version,
    pub feature_id: FeatureId,
    pub tag_ids:    Vec<TagId>,
}

/// Collapses association rows sharing banner, version and feature into one record. Tags keep the order of the input;
/// the records come out ordered by banner, then version, then feature.
pub fn merge_tag_rows<I>(rows: I) -> Vec<MergedAssociation>
where
    I: IntoIterator<Item = AssociationRow>,
{
    let mut merged: BTreeMap<(BannerId, Version, FeatureId), Vec<TagId>> = BTreeMap::new();

    for row in rows {
        match merged.entry((row.banner_id, row.version, row.feature_id)) {
            btree_map::Entry::Occupied(mut entry) => {
                let tags = entry.get_mut();
                if !tags.contains(&row.tag_id) {
                    tags.push(row.tag_id);
                }
            }
            btree_map::Entry::Vacant(entry) => {
                entry.insert(vec![row.tag_id]);
            }
        }
    }

    merged
        .into_iter()
        .map(|((banner_id, version, feature_id), tag_ids)| MergedAssociation {
            banner_id,
            version,
            feature_id,
            tag_ids,
        })
        .collect()
}

/// A banner is active only when the version it is listed with is the one its active pointer refers to.
pub fn resolve_active_flags(banners: &mut [Banner], active_versions: &HashMap<BannerId, Version>) {
    for banner in banners.iter_mut() {
        banner.is_active = active_versions.get(&banner.id) == Some(&banner.version);
    }
}

/// Zero `limit` means no limit, zero `offset` means no offset.
pub fn paginate<T>(items: Vec<T>, limit: u64, offset: u64) -> Vec<T> {
    let items = items.into_iter().skip(offset as usize);
    if limit == 0 {
        items.collect()
    }
    else {
        items.take(limit as usize).collect()
    }
}
