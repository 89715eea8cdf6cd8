use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "banners")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id:             i32,
    /// Version shown to users, `0` if none.
    pub active_version: i32,
    /// The highest version ever written.
    pub last_version:   i32,
    pub created_at:     DateTimeUtc,
    pub updated_at:     DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
