//! Missing report entity.
//!
//! A report is the canonical record of one missing-child case. Its timeline
//! and case notes live on the same row as typed JSON columns, so every
//! lifecycle transition is a single versioned row update.

use flare_common::PartnerChannel;
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Submitted, awaiting verification.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Verified and broadcasting.
    #[sea_orm(string_value = "active")]
    Active,
    /// Child recovered.
    #[sea_orm(string_value = "found")]
    Found,
    /// Closed by an operator.
    #[sea_orm(string_value = "closed")]
    Closed,
    /// Withdrawn by the guardian.
    #[sea_orm(string_value = "retracted")]
    Retracted,
}

impl ReportStatus {
    /// Whether no further status transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Found | Self::Closed | Self::Retracted)
    }

    /// Whether the state graph has an edge from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(
                next,
                Self::Active | Self::Found | Self::Closed | Self::Retracted
            ),
            Self::Active => matches!(next, Self::Found | Self::Closed | Self::Retracted),
            Self::Found | Self::Closed | Self::Retracted => false,
        }
    }

    /// Lowercase status name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Found => "found",
            Self::Closed => "closed",
            Self::Retracted => "retracted",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case priority. Ordered from lowest to highest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ReportPriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[default]
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "critical")]
    Critical,
}

impl ReportPriority {
    /// Number of steps above `medium`, used to widen the initial radius.
    #[must_use]
    pub const fn steps_above_medium(self) -> u8 {
        match self {
            Self::Low | Self::Medium => 0,
            Self::High => 1,
            Self::Critical => 2,
        }
    }
}

/// How a report was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    #[sea_orm(string_value = "found_safe")]
    FoundSafe,
    #[sea_orm(string_value = "found_medical")]
    FoundMedical,
    #[sea_orm(string_value = "false_report")]
    FalseReport,
    #[sea_orm(string_value = "guardian_retracted")]
    GuardianRetracted,
}

impl ResolutionType {
    /// Terminal status this resolution leads to.
    #[must_use]
    pub const fn target_status(self) -> ReportStatus {
        match self {
            Self::FoundSafe | Self::FoundMedical => ReportStatus::Found,
            Self::FalseReport => ReportStatus::Closed,
            Self::GuardianRetracted => ReportStatus::Retracted,
        }
    }
}

/// Where the child was last seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct LastSeenLocation {
    pub address: String,
    /// Coordinates are absent when only an address was given.
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

impl LastSeenLocation {
    /// `(lat, lng)` when both are known.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lng)
    }
}

/// Redacted child snapshot taken at submission for the public feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSnapshot {
    pub first_name: String,
    pub age: Option<u8>,
    pub blurred_photo_url: Option<String>,
}

/// Which partner channels have been notified.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult,
)]
pub struct PartnerFlags {
    pub police: bool,
    pub hospital: bool,
    pub school: bool,
    pub media: bool,
    pub community: bool,
}

impl PartnerFlags {
    /// Flags with the given channels set.
    #[must_use]
    pub fn with_channels(channels: &[PartnerChannel]) -> Self {
        let mut flags = Self::default();
        for channel in channels {
            flags.set(*channel, true);
        }
        flags
    }

    #[must_use]
    pub const fn get(&self, channel: PartnerChannel) -> bool {
        match channel {
            PartnerChannel::Police => self.police,
            PartnerChannel::Hospital => self.hospital,
            PartnerChannel::School => self.school,
            PartnerChannel::Media => self.media,
            PartnerChannel::Community => self.community,
        }
    }

    pub const fn set(&mut self, channel: PartnerChannel, notified: bool) {
        match channel {
            PartnerChannel::Police => self.police = notified,
            PartnerChannel::Hospital => self.hospital = notified,
            PartnerChannel::School => self.school = notified,
            PartnerChannel::Media => self.media = notified,
            PartnerChannel::Community => self.community = notified,
        }
    }

    /// Channels currently flagged as notified.
    #[must_use]
    pub fn notified_channels(&self) -> Vec<PartnerChannel> {
        PartnerChannel::ALL
            .into_iter()
            .filter(|c| self.get(*c))
            .collect()
    }
}

/// Severity of a timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineSeverity {
    Info,
    Warning,
    Success,
    Danger,
}

/// One entry of the append-only audit log of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: String,
    /// Per-report logical sequence, strictly increasing.
    pub seq: i64,
    pub timestamp: DateTimeUtc,
    pub title: String,
    pub detail: String,
    pub severity: TimelineSeverity,
    pub actor: String,
}

/// Timeline column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct Timeline(pub Vec<TimelineEvent>);

/// Internal note attached to a case. Never shown publicly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseNote {
    pub body: String,
    pub author: String,
    pub created_at: DateTimeUtc,
}

/// Case notes column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct CaseNotes(pub Vec<CaseNote>);

/// A missing-child report.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "missing_report")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub child_id: String,

    #[sea_orm(indexed)]
    pub guardian_id: String,

    #[sea_orm(indexed)]
    pub status: ReportStatus,

    pub priority: ReportPriority,

    /// Submission time. Never changes.
    pub started_at: DateTimeUtc,

    /// Set once, at the first terminal transition.
    #[sea_orm(nullable)]
    pub closed_at: Option<DateTimeUtc>,

    #[sea_orm(column_type = "JsonBinary")]
    pub last_seen_location: LastSeenLocation,

    pub last_seen_at: DateTimeUtc,

    #[sea_orm(column_type = "Text")]
    pub outfit: String,

    #[sea_orm(column_type = "Text")]
    pub context: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub who_nearby: Option<String>,

    pub with_known_person: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub known_person_details: Option<String>,

    pub anonymous_report: bool,

    #[sea_orm(column_type = "JsonBinary")]
    pub subject: SubjectSnapshot,

    #[sea_orm(column_type = "Double")]
    pub current_radius_km: f64,

    #[sea_orm(column_type = "Double")]
    pub expansion_rate_km_per_hour: f64,

    /// When the report became active.
    #[sea_orm(nullable)]
    pub activated_at: Option<DateTimeUtc>,

    /// Reference point for continuous radius growth.
    #[sea_orm(nullable)]
    pub last_expansion_at: Option<DateTimeUtc>,

    pub notified_count: i64,

    pub tips_received: i32,

    #[sea_orm(column_type = "JsonBinary")]
    pub partner_notified: PartnerFlags,

    #[sea_orm(column_type = "JsonBinary")]
    pub timeline: Timeline,

    #[sea_orm(column_type = "JsonBinary")]
    pub case_notes: CaseNotes,

    #[sea_orm(nullable)]
    pub assigned_admin_id: Option<String>,

    #[sea_orm(nullable)]
    pub resolution_type: Option<ResolutionType>,

    /// Last sequence number handed out to a timeline event.
    pub timeline_seq: i64,

    /// Optimistic concurrency token.
    pub version: i32,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::community_tip::Entity")]
    CommunityTip,
}

impl Related<super::community_tip::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CommunityTip.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Most recent timeline event.
    #[must_use]
    pub fn last_event(&self) -> Option<&TimelineEvent> {
        self.timeline.0.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_graph() {
        use ReportStatus::*;

        assert!(Pending.can_transition_to(Active));
        assert!(Pending.can_transition_to(Retracted));
        assert!(Active.can_transition_to(Found));
        assert!(Active.can_transition_to(Closed));
        assert!(Pending.can_transition_to(Found));
        assert!(!Active.can_transition_to(Pending));
        assert!(!Active.can_transition_to(Active));

        for terminal in [Found, Closed, Retracted] {
            assert!(terminal.is_terminal());
            for next in [Pending, Active, Found, Closed, Retracted] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_priority_ordering() {
        assert!(ReportPriority::Critical > ReportPriority::High);
        assert!(ReportPriority::High > ReportPriority::Medium);
        assert_eq!(ReportPriority::default(), ReportPriority::Medium);
        assert_eq!(ReportPriority::Critical.steps_above_medium(), 2);
    }

    #[test]
    fn test_resolution_targets() {
        assert_eq!(ResolutionType::FoundMedical.target_status(), ReportStatus::Found);
        assert_eq!(ResolutionType::FalseReport.target_status(), ReportStatus::Closed);
        assert_eq!(
            ResolutionType::GuardianRetracted.target_status(),
            ReportStatus::Retracted
        );
    }

    #[test]
    fn test_partner_flags() {
        let mut flags = PartnerFlags::with_channels(&[PartnerChannel::Police, PartnerChannel::School]);
        assert!(flags.get(PartnerChannel::Police));
        assert!(!flags.get(PartnerChannel::Media));

        flags.set(PartnerChannel::Police, false);
        assert_eq!(flags.notified_channels(), vec![PartnerChannel::School]);
    }

    #[test]
    fn test_timeline_serializes_as_array() {
        let json = serde_json::to_value(Timeline::default()).unwrap_or_default();
        assert_eq!(json, serde_json::json!([]));
    }
}
