use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "banner_version_migration"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BannerVersions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BannerVersions::BannerId).integer().not_null())
                    .col(ColumnDef::new(BannerVersions::Version).integer().not_null())
                    .col(ColumnDef::new(BannerVersions::Content).text().not_null())
                    .col(
                        ColumnDef::new(BannerVersions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk-banner_versions")
                            .col(BannerVersions::BannerId)
                            .col(BannerVersions::Version),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-banner_versions-banner_id")
                            .from(BannerVersions::Table, BannerVersions::BannerId)
                            .to(super::banner::Banners::Table, super::banner::Banners::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BannerVersions::Table).if_exists().to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum BannerVersions {
    Table,
    BannerId,
    Version,
    Content,
    UpdatedAt,
}
