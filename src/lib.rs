//! # banner-store
//!
//! Versioned banner storage with a read-through cache for the user-facing lookups.
//!
//! A banner is a piece of content (title, text, and URL) shown to users who carry a given tag when they visit a given
//! feature. Banners are never edited in place: every change appends a new version, and an active-version pointer
//! decides which one users get to see. Rolling back is nothing more than moving that pointer.
//!
//! # The Basics
//!
//! The crate consists of two parts that are glued together by [`BannerService`]:
//!
//! - The store, described by the [`BannerStore`](traits::BannerStore) trait. [`DbStore`](db::DbStore) keeps banners
//!   in an SQL database via [SeaORM](https://crates.io/crates/sea-orm), [`MemoryStore`](memory::MemoryStore) keeps
//!   them in process memory.
//! - The cache, [`BannerCache`], a [moka](https://crates.io/crates/moka)-based map from (feature, tag) to content
//!   with a fixed time-to-live per entry and a background task sweeping expired entries.
//!
//! The store guarantees the following:
//!
//! - a banner has exactly one latest version and at most one active one;
//! - version numbers of a banner are unique and grow by one with every update;
//! - no two active banners claim the same (tag, feature) pair, [`collision`] is where this is checked;
//! - a write either lands completely or leaves no trace.
//!
//! Updates may omit fields, these are taken from the previous version (see [`resolver`]). Administrators see banners
//! at their latest version with tags of multi-tag banners merged into a single record (see [`listing`]).
//!
//! # Cache Consistency
//!
//! The cache is never invalidated by writes. A user may keep receiving the previous content of a banner for up to the
//! cache TTL after it has been changed or removed. Readers that can't tolerate this ask for the latest
//! content and skip the cache altogether; administrators always do.
//!
//! ```ignore
//! let app = BannerApp::new(Config::from_env()?);
//! let service = app.build_service().await?;
//!
//! let banner_id = service.create(NewBanner {
//!     tag_ids:    vec![1, 2],
//!     feature_id: 7,
//!     content:    Content::new("Hello", "Welcome aboard", "https://example.com"),
//!     is_active:  true,
//! }).await?;
//!
//! let content = service.get_for_user(2, 7, false).await?;
//! ```

pub mod app;
pub mod cache;
pub mod collision;
pub mod config;
pub mod db;
pub mod entry;
pub mod error;
pub mod listing;
pub mod memory;
pub mod resolver;
pub mod service;
pub mod traits;
pub mod types;

#[doc(inline)]
pub use cache::BannerCache;
#[doc(inline)]
pub use error::BannerError;
#[doc(inline)]
pub use service::BannerService;
#[doc(inline)]
pub use traits::BannerStore;

pub mod prelude {
    pub use crate::cache::BannerCache;
    pub use crate::db::DbStore;
    pub use crate::error::BannerError;
    pub use crate::error::ErrorKind;
    pub use crate::memory::MemoryStore;
    pub use crate::service::BannerService;
    pub use crate::traits::BannerStore;
    pub use crate::types::*;
}
