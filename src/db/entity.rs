pub mod banner;
pub mod banner_version;
pub mod feature_tag;

pub use banner::Entity as Banners;
pub use banner::Model as BannerRecord;
pub use banner_version::Entity as BannerVersions;
pub use banner_version::Model as BannerVersionRecord;
pub use feature_tag::Entity as FeatureTags;
pub use feature_tag::Model as FeatureTagRecord;
