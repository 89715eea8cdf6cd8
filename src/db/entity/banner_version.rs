use sea_orm::entity::prelude::*;

/// Append-only content history. The primary key makes every (banner, version) pair unique.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "banner_versions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub banner_id:  i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub version:    i32,
    /// JSON-serialized [`Content`](crate::types::Content).
    #[sea_orm(column_type = "Text")]
    pub content:    String,
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
