//! Missing report repository.

use std::sync::Arc;

use crate::entities::missing_report::{self, ReportStatus};
use crate::entities::{CommunityTip, MissingReport, community_tip};
use flare_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};

/// Filter for report listings.
#[derive(Debug, Clone)]
pub struct ReportFilter {
    /// Restrict to these statuses. Empty means any status.
    pub statuses: Vec<ReportStatus>,
    pub guardian_id: Option<String>,
    pub child_id: Option<String>,
    /// Page size. `None` returns every match.
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            guardian_id: None,
            child_id: None,
            limit: Some(100),
            offset: 0,
        }
    }
}

impl ReportFilter {
    /// Filter matching every report in one of `statuses`.
    #[must_use]
    pub fn with_statuses(statuses: &[ReportStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            limit: None,
            ..Default::default()
        }
    }

    /// Whether `report` passes the filter, ignoring paging.
    #[must_use]
    pub fn matches(&self, report: &missing_report::Model) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&report.status))
            && self
                .guardian_id
                .as_ref()
                .is_none_or(|g| *g == report.guardian_id)
            && self.child_id.as_ref().is_none_or(|c| *c == report.child_id)
    }
}

/// Tip change committed together with a report update.
#[derive(Debug, Clone)]
pub enum TipWrite {
    Insert(community_tip::Model),
    Update(community_tip::Model),
}

/// Report repository for database operations.
#[derive(Clone)]
pub struct ReportRepository {
    db: Arc<DatabaseConnection>,
}

impl ReportRepository {
    /// Create a new report repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a report by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<missing_report::Model>> {
        MissingReport::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a report by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<missing_report::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report {id} not found")))
    }

    /// List reports matching a filter, newest first.
    pub async fn list(&self, filter: &ReportFilter) -> AppResult<Vec<missing_report::Model>> {
        let mut query = MissingReport::find();

        if !filter.statuses.is_empty() {
            query = query.filter(missing_report::Column::Status.is_in(filter.statuses.clone()));
        }
        if let Some(guardian_id) = &filter.guardian_id {
            query = query.filter(missing_report::Column::GuardianId.eq(guardian_id));
        }
        if let Some(child_id) = &filter.child_id {
            query = query.filter(missing_report::Column::ChildId.eq(child_id));
        }

        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        query
            .order_by_desc(missing_report::Column::StartedAt)
            .offset(filter.offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a new report.
    pub async fn create(&self, report: missing_report::Model) -> AppResult<missing_report::Model> {
        MissingReport::insert(missing_report::ActiveModel::from(report.clone()))
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(report)
    }

    /// Replace a report if its stored version still equals `expected_version`.
    ///
    /// Returns the written report with its version bumped.
    pub async fn update_versioned(
        &self,
        report: missing_report::Model,
        expected_version: i32,
    ) -> AppResult<missing_report::Model> {
        write_versioned(self.db.as_ref(), report, expected_version).await
    }

    /// Apply a tip change and a versioned report update in one transaction.
    pub async fn update_with_tip(
        &self,
        report: missing_report::Model,
        expected_version: i32,
        tip: TipWrite,
    ) -> AppResult<missing_report::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let tip_result = match tip {
            TipWrite::Insert(tip) => CommunityTip::insert(community_tip::ActiveModel::from(tip))
                .exec_without_returning(&txn)
                .await
                .map(|_| ()),
            TipWrite::Update(tip) => {
                let id = tip.id.clone();
                CommunityTip::update_many()
                    .set(tip_changes(tip))
                    .filter(community_tip::Column::Id.eq(id))
                    .exec(&txn)
                    .await
                    .map(|_| ())
            }
        };

        if let Err(e) = tip_result {
            let _ = txn.rollback().await;
            return Err(AppError::Database(e.to_string()));
        }

        match write_versioned(&txn, report, expected_version).await {
            Ok(written) => {
                txn.commit()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(written)
            }
            Err(e) => {
                let _ = txn.rollback().await;
                Err(e)
            }
        }
    }
}

async fn write_versioned<C: ConnectionTrait>(
    conn: &C,
    mut report: missing_report::Model,
    expected_version: i32,
) -> AppResult<missing_report::Model> {
    report.version = expected_version + 1;
    let id = report.id.clone();

    let result = MissingReport::update_many()
        .set(report_changes(report.clone()))
        .filter(missing_report::Column::Id.eq(id.as_str()))
        .filter(missing_report::Column::Version.eq(expected_version))
        .exec(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    if result.rows_affected == 0 {
        return Err(AppError::ConcurrencyConflict(format!(
            "Report {id} was modified concurrently (expected version {expected_version})"
        )));
    }

    Ok(report)
}

/// Every mutable column marked as set, for use with `update_many`.
fn report_changes(m: missing_report::Model) -> missing_report::ActiveModel {
    missing_report::ActiveModel {
        status: Set(m.status),
        priority: Set(m.priority),
        closed_at: Set(m.closed_at),
        last_seen_location: Set(m.last_seen_location),
        last_seen_at: Set(m.last_seen_at),
        outfit: Set(m.outfit),
        context: Set(m.context),
        who_nearby: Set(m.who_nearby),
        with_known_person: Set(m.with_known_person),
        known_person_details: Set(m.known_person_details),
        anonymous_report: Set(m.anonymous_report),
        subject: Set(m.subject),
        current_radius_km: Set(m.current_radius_km),
        expansion_rate_km_per_hour: Set(m.expansion_rate_km_per_hour),
        activated_at: Set(m.activated_at),
        last_expansion_at: Set(m.last_expansion_at),
        notified_count: Set(m.notified_count),
        tips_received: Set(m.tips_received),
        partner_notified: Set(m.partner_notified),
        timeline: Set(m.timeline),
        case_notes: Set(m.case_notes),
        assigned_admin_id: Set(m.assigned_admin_id),
        resolution_type: Set(m.resolution_type),
        timeline_seq: Set(m.timeline_seq),
        version: Set(m.version),
        updated_at: Set(m.updated_at),
        ..Default::default()
    }
}

/// Review columns of a tip.
fn tip_changes(m: community_tip::Model) -> community_tip::ActiveModel {
    community_tip::ActiveModel {
        status: Set(m.status),
        dismiss_reason: Set(m.dismiss_reason),
        reviewed_by: Set(m.reviewed_by),
        updated_at: Set(m.updated_at),
        ..Default::default()
    }
}
