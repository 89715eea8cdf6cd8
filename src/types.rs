use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

pub type BannerId = i32;
pub type TagId = i32;
pub type FeatureId = i32;
pub type Version = i32;

/// Value of the active-version pointer of a banner that has nothing to show.
pub const NO_ACTIVE_VERSION: Version = 0;
/// Every banner starts its history with this version.
pub const FIRST_VERSION: Version = 1;

/// The payload displayed to end users. Immutable per version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Content {
    pub title: String,
    pub text:  String,
    pub url:   String,
}

impl Content {
    pub fn new<T: Into<String>, X: Into<String>, U: Into<String>>(title: T, text: X, url: U) -> Self {
        Self {
            title: title.into(),
            text:  text.into(),
            url:   url.into(),
        }
    }

    /// True if at least one of the fields is empty.
    pub fn has_blanks(&self) -> bool {
        self.title.is_empty() || self.text.is_empty() || self.url.is_empty()
    }

    pub fn is_blank(&self) -> bool {
        self.title.is_empty() && self.text.is_empty() && self.url.is_empty()
    }
}

/// A banner as seen by administrators: its latest version along with the computed activity flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    pub id:         BannerId,
    pub tag_ids:    Vec<TagId>,
    pub feature_id: FeatureId,
    pub is_active:  bool,
    pub version:    Version,
    pub content:    Content,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a banner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBanner {
    pub tag_ids:    Vec<TagId>,
    pub feature_id: FeatureId,
    pub content:    Content,
    pub is_active:  bool,
}

/// Request to append a new version to an existing banner. Blank fields are inherited from the last version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BannerUpdate {
    pub id:         BannerId,
    #[serde(default)]
    pub tag_ids:    Vec<TagId>,
    #[serde(default)]
    pub feature_id: FeatureId,
    #[serde(default)]
    pub content:    Content,
    /// Makes the new version the active one. Otherwise the banner is left with no active version.
    #[serde(default)]
    pub is_active:  bool,
}

/// One entry of a banner's version history together with the tag set it was written with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub banner_id:  BannerId,
    pub version:    Version,
    pub tag_ids:    Vec<TagId>,
    pub feature_id: FeatureId,
    pub content:    Content,
    pub updated_at: DateTime<Utc>,
}

/// An active banner's claim on a (tag, feature) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Claim {
    pub banner_id:  BannerId,
    pub version:    Version,
    pub tag_id:     TagId,
    pub feature_id: FeatureId,
}

/// Filtering and pagination of the admin listing. Zero or `None` means "no filter", zero limit/offset mean "no
/// limit"/"no offset".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminQuery {
    pub tag_id:     Option<TagId>,
    pub feature_id: Option<FeatureId>,
    pub limit:      u64,
    pub offset:     u64,
}

impl AdminQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag_id: TagId) -> Self {
        self.tag_id = Some(tag_id);
        self
    }

    pub fn feature(mut self, feature_id: FeatureId) -> Self {
        self.feature_id = Some(feature_id);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn normalized(self) -> Self {
        Self {
            tag_id:     self.tag_id.filter(|t| *t != 0),
            feature_id: self.feature_id.filter(|f| *f != 0),
            ..self
        }
    }

    /// Whether a merged banner record passes the tag and feature filters.
    pub fn matches(&self, tag_ids: &[TagId], feature_id: FeatureId) -> bool {
        self.tag_id.map_or(true, |t| tag_ids.contains(&t)) && self.feature_id.map_or(true, |f| f == feature_id)
    }
}
