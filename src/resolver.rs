//! Version resolution for partial updates.
//!
//! Clients are not required to resend fields that don't change. Everything left blank in a [`BannerUpdate`] is taken
//! from the last written version of the banner:
//!
//! - empty `title`, `text`, or `url`;
//! - zero `feature_id`;
//! - empty `tag_ids`.
//!
//! The stores fetch the last version inside the update transaction and call [`resolve`] on it. If there is no last
//! version the update is aborted before anything is written.

use crate::types::BannerUpdate;
use crate::types::Content;
use crate::types::FeatureId;
use crate::types::TagId;
use crate::types::Version;
use crate::types::VersionSnapshot;

/// Complete field set of a version about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub version:    Version,
    pub tag_ids:    Vec<TagId>,
    pub feature_id: FeatureId,
    pub content:    Content,
}

fn inherit(new: &str, old: String) -> String {
    if new.is_empty() {
        old
    }
    else {
        new.to_string()
    }
}

/// Merges an update request with the last version of the banner. The result carries the next version number.
pub fn resolve(update: &BannerUpdate, last: VersionSnapshot) -> ResolvedVersion {
    let VersionSnapshot {
        version,
        tag_ids,
        feature_id,
        content,
        ..
    } = last;

    ResolvedVersion {
        version:    version + 1,
        tag_ids:    if update.tag_ids.is_empty() {
            tag_ids
        }
        else {
            update.tag_ids.clone()
        },
        feature_id: if update.feature_id == 0 {
            feature_id
        }
        else {
            update.feature_id
        },
        content:    Content {
            title: inherit(&update.content.title, content.title),
            text:  inherit(&update.content.text, content.text),
            url:   inherit(&update.content.url, content.url),
        },
    }
}
