use sea_orm::entity::prelude::*;

use crate::listing::AssociationRow;

/// Association of a banner version with its feature and one of its tags.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "banner_feature_tags")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub banner_id:  i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub version:    i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub tag_id:     i32,
    pub feature_id: i32,
    /// Position of the tag in the banner's tag list.
    pub position:   i32,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::banner::Entity",
        from = "Column::BannerId",
        to = "super::banner::Column::Id",
        on_delete = "Cascade"
    )]
    Banner,
}

impl Related<super::banner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Banner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Model> for AssociationRow {
    fn from(model: &Model) -> Self {
        AssociationRow {
            banner_id:  model.banner_id,
            version:    model.version,
            feature_id: model.feature_id,
            tag_id:     model.tag_id,
        }
    }
}
