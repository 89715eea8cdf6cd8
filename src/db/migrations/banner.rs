use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "banner_migration"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Banners::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Banners::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Banners::ActiveVersion).integer().not_null().default(0))
                    .col(ColumnDef::new(Banners::LastVersion).integer().not_null())
                    .col(ColumnDef::new(Banners::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Banners::UpdatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Banners::Table).if_exists().to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Banners {
    Table,
    Id,
    ActiveVersion,
    LastVersion,
    CreatedAt,
    UpdatedAt,
}
