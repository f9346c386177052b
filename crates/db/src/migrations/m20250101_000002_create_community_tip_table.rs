//! Create `community_tip` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CommunityTip::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CommunityTip::Id).string_len(64).not_null().primary_key())
                    .col(ColumnDef::new(CommunityTip::ReportId).string_len(64).not_null())
                    .col(
                        ColumnDef::new(CommunityTip::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(CommunityTip::ReporterName).string_len(128).not_null())
                    .col(ColumnDef::new(CommunityTip::Description).text().not_null())
                    .col(ColumnDef::new(CommunityTip::Location).string_len(512).not_null())
                    .col(ColumnDef::new(CommunityTip::SightedAt).timestamp_with_time_zone().not_null())
                    .col(
                        ColumnDef::new(CommunityTip::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(CommunityTip::DismissReason).text())
                    .col(ColumnDef::new(CommunityTip::ReviewedBy).string_len(128))
                    .col(ColumnDef::new(CommunityTip::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_community_tip_report")
                            .from(CommunityTip::Table, CommunityTip::ReportId)
                            .to(MissingReport::Table, MissingReport::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (report_id, created_at) for per-report listings
        manager
            .create_index(
                Index::create()
                    .name("idx_community_tip_report_created")
                    .table(CommunityTip::Table)
                    .col(CommunityTip::ReportId)
                    .col(CommunityTip::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CommunityTip::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CommunityTip {
    Table,
    Id,
    ReportId,
    CreatedAt,
    ReporterName,
    Description,
    Location,
    SightedAt,
    Status,
    DismissReason,
    ReviewedBy,
    UpdatedAt,
}

#[derive(Iden)]
enum MissingReport {
    Table,
    Id,
}
