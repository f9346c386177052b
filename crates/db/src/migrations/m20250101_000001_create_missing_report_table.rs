//! Create `missing_report` table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MissingReport::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(MissingReport::Id).string_len(64).not_null().primary_key())
                    .col(ColumnDef::new(MissingReport::ChildId).string_len(64).not_null())
                    .col(ColumnDef::new(MissingReport::GuardianId).string_len(64).not_null())
                    .col(ColumnDef::new(MissingReport::Status).string_len(16).not_null())
                    .col(ColumnDef::new(MissingReport::Priority).string_len(16).not_null())
                    .col(ColumnDef::new(MissingReport::StartedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(MissingReport::ClosedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(MissingReport::LastSeenLocation).json_binary().not_null())
                    .col(ColumnDef::new(MissingReport::LastSeenAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(MissingReport::Outfit).text().not_null())
                    .col(ColumnDef::new(MissingReport::Context).text().not_null())
                    .col(ColumnDef::new(MissingReport::WhoNearby).text())
                    .col(ColumnDef::new(MissingReport::WithKnownPerson).boolean().not_null().default(false))
                    .col(ColumnDef::new(MissingReport::KnownPersonDetails).text())
                    .col(ColumnDef::new(MissingReport::AnonymousReport).boolean().not_null().default(false))
                    .col(ColumnDef::new(MissingReport::Subject).json_binary().not_null())
                    .col(ColumnDef::new(MissingReport::CurrentRadiusKm).double().not_null())
                    .col(ColumnDef::new(MissingReport::ExpansionRateKmPerHour).double().not_null())
                    .col(ColumnDef::new(MissingReport::ActivatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(MissingReport::LastExpansionAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(MissingReport::NotifiedCount).big_integer().not_null().default(0))
                    .col(ColumnDef::new(MissingReport::TipsReceived).integer().not_null().default(0))
                    .col(ColumnDef::new(MissingReport::PartnerNotified).json_binary().not_null())
                    .col(ColumnDef::new(MissingReport::Timeline).json_binary().not_null())
                    .col(ColumnDef::new(MissingReport::CaseNotes).json_binary().not_null())
                    .col(ColumnDef::new(MissingReport::AssignedAdminId).string_len(64))
                    .col(ColumnDef::new(MissingReport::ResolutionType).string_len(32))
                    .col(ColumnDef::new(MissingReport::TimelineSeq).big_integer().not_null().default(0))
                    .col(ColumnDef::new(MissingReport::Version).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(MissingReport::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: status (admin queue, boot recovery)
        manager
            .create_index(
                Index::create()
                    .name("idx_missing_report_status")
                    .table(MissingReport::Table)
                    .col(MissingReport::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_missing_report_guardian_id")
                    .table(MissingReport::Table)
                    .col(MissingReport::GuardianId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_missing_report_child_id")
                    .table(MissingReport::Table)
                    .col(MissingReport::ChildId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_missing_report_started_at")
                    .table(MissingReport::Table)
                    .col(MissingReport::StartedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MissingReport::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MissingReport {
    Table,
    Id,
    ChildId,
    GuardianId,
    Status,
    Priority,
    StartedAt,
    ClosedAt,
    LastSeenLocation,
    LastSeenAt,
    Outfit,
    Context,
    WhoNearby,
    WithKnownPerson,
    KnownPersonDetails,
    AnonymousReport,
    Subject,
    CurrentRadiusKm,
    ExpansionRateKmPerHour,
    ActivatedAt,
    LastExpansionAt,
    NotifiedCount,
    TipsReceived,
    PartnerNotified,
    Timeline,
    CaseNotes,
    AssignedAdminId,
    ResolutionType,
    TimelineSeq,
    Version,
    UpdatedAt,
}
