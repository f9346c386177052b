//! Community tip entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Review status of a tip.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum TipStatus {
    /// Not reviewed yet.
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "credible")]
    Credible,
    #[sea_orm(string_value = "investigate")]
    Investigate,
    #[sea_orm(string_value = "dismissed")]
    Dismissed,
}

impl TipStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Credible => "credible",
            Self::Investigate => "investigate",
            Self::Dismissed => "dismissed",
        }
    }
}

/// A sighting or lead submitted by the community. Tips are never deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "community_tip")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub report_id: String,

    pub created_at: DateTimeUtc,

    pub reporter_name: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub location: String,

    /// When the sighting happened, as reported by the tipster.
    #[serde(rename = "when")]
    pub sighted_at: DateTimeUtc,

    pub status: TipStatus,

    /// Present only when `status` is dismissed.
    #[sea_orm(column_type = "Text", nullable)]
    pub dismiss_reason: Option<String>,

    #[sea_orm(nullable)]
    pub reviewed_by: Option<String>,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::missing_report::Entity",
        from = "Column::ReportId",
        to = "super::missing_report::Column::Id",
        on_delete = "Cascade"
    )]
    MissingReport,
}

impl Related<super::missing_report::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MissingReport.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
