use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "feature_tag_migration"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BannerFeatureTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BannerFeatureTags::BannerId).integer().not_null())
                    .col(ColumnDef::new(BannerFeatureTags::Version).integer().not_null())
                    .col(ColumnDef::new(BannerFeatureTags::TagId).integer().not_null())
                    .col(ColumnDef::new(BannerFeatureTags::FeatureId).integer().not_null())
                    .col(ColumnDef::new(BannerFeatureTags::Position).integer().not_null())
                    .col(
                        ColumnDef::new(BannerFeatureTags::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk-banner_feature_tags")
                            .col(BannerFeatureTags::BannerId)
                            .col(BannerFeatureTags::Version)
                            .col(BannerFeatureTags::TagId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-banner_feature_tags-banner_id")
                            .from(BannerFeatureTags::Table, BannerFeatureTags::BannerId)
                            .to(super::banner::Banners::Table, super::banner::Banners::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-banner_feature_tags-tag_feature")
                    .if_not_exists()
                    .table(BannerFeatureTags::Table)
                    .col(BannerFeatureTags::TagId)
                    .col(BannerFeatureTags::FeatureId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BannerFeatureTags::Table).if_exists().to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum BannerFeatureTags {
    Table,
    BannerId,
    Version,
    TagId,
    FeatureId,
    Position,
    UpdatedAt,
}
