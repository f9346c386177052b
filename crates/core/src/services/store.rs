//! Report storage.
//!
//! The lifecycle engine is the only writer. Every write carries the version
//! the engine read; a store rejects the write with
//! [`AppError::ConcurrencyConflict`] when the stored version moved on.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use flare_common::{AppError, AppResult};
use flare_db::entities::{community_tip, missing_report};
use flare_db::repositories::{ReportRepository, TipRepository};
use tokio::sync::RwLock;

pub use flare_db::repositories::{ReportFilter, TipWrite};

/// Persistence seam for reports and their tips.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn find_report(&self, id: &str) -> AppResult<Option<missing_report::Model>>;

    /// Reports matching `filter`, newest first.
    async fn list_reports(&self, filter: &ReportFilter) -> AppResult<Vec<missing_report::Model>>;

    async fn insert_report(
        &self,
        report: missing_report::Model,
    ) -> AppResult<missing_report::Model>;

    /// Replace a report whose stored version equals `expected_version`,
    /// applying `tip` in the same atomic step. Returns the report as
    /// written, with its version bumped.
    async fn save_report(
        &self,
        report: missing_report::Model,
        expected_version: i32,
        tip: Option<TipWrite>,
    ) -> AppResult<missing_report::Model>;

    async fn find_tip(&self, id: &str) -> AppResult<Option<community_tip::Model>>;

    /// Tips of a report, oldest first.
    async fn list_tips(&self, report_id: &str) -> AppResult<Vec<community_tip::Model>>;
}

/// Shared store handle.
pub type ReportStoreRef = Arc<dyn ReportStore>;

#[derive(Default)]
struct MemoryState {
    reports: HashMap<String, missing_report::Model>,
    tips: HashMap<String, community_tip::Model>,
}

/// Process-local store. Reports and tips share one lock so a tip and its
/// report counter always change together.
#[derive(Default)]
pub struct InMemoryReportStore {
    state: RwLock<MemoryState>,
}

impl InMemoryReportStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn find_report(&self, id: &str) -> AppResult<Option<missing_report::Model>> {
        Ok(self.state.read().await.reports.get(id).cloned())
    }

    async fn list_reports(&self, filter: &ReportFilter) -> AppResult<Vec<missing_report::Model>> {
        let state = self.state.read().await;
        let mut reports: Vec<_> = state
            .reports
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.started_at.cmp(&a.started_at).then_with(|| a.id.cmp(&b.id)));

        let offset = usize::try_from(filter.offset).unwrap_or(usize::MAX);
        let limit = filter
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(reports.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert_report(
        &self,
        report: missing_report::Model,
    ) -> AppResult<missing_report::Model> {
        let mut state = self.state.write().await;
        if state.reports.contains_key(&report.id) {
            return Err(AppError::Internal(format!(
                "Report {} already exists",
                report.id
            )));
        }
        state.reports.insert(report.id.clone(), report.clone());
        Ok(report)
    }

    async fn save_report(
        &self,
        mut report: missing_report::Model,
        expected_version: i32,
        tip: Option<TipWrite>,
    ) -> AppResult<missing_report::Model> {
        let mut state = self.state.write().await;

        let stored_version = state
            .reports
            .get(&report.id)
            .map(|r| r.version)
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", report.id)))?;
        if stored_version != expected_version {
            return Err(AppError::ConcurrencyConflict(format!(
                "Report {} was modified concurrently (expected version {expected_version}, found {stored_version})",
                report.id
            )));
        }

        match tip {
            Some(TipWrite::Insert(tip)) => {
                state.tips.insert(tip.id.clone(), tip);
            }
            Some(TipWrite::Update(tip)) => {
                if !state.tips.contains_key(&tip.id) {
                    return Err(AppError::NotFound(format!("Tip {} not found", tip.id)));
                }
                state.tips.insert(tip.id.clone(), tip);
            }
            None => {}
        }

        report.version = expected_version + 1;
        state.reports.insert(report.id.clone(), report.clone());
        Ok(report)
    }

    async fn find_tip(&self, id: &str) -> AppResult<Option<community_tip::Model>> {
        Ok(self.state.read().await.tips.get(id).cloned())
    }

    async fn list_tips(&self, report_id: &str) -> AppResult<Vec<community_tip::Model>> {
        let state = self.state.read().await;
        let mut tips: Vec<_> = state
            .tips
            .values()
            .filter(|t| t.report_id == report_id)
            .cloned()
            .collect();
        tips.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tips)
    }
}

/// `PostgreSQL` store backed by the db repositories.
#[derive(Clone)]
pub struct DbReportStore {
    report_repo: ReportRepository,
    tip_repo: TipRepository,
}

impl DbReportStore {
    #[must_use]
    pub const fn new(report_repo: ReportRepository, tip_repo: TipRepository) -> Self {
        Self {
            report_repo,
            tip_repo,
        }
    }
}

#[async_trait]
impl ReportStore for DbReportStore {
    async fn find_report(&self, id: &str) -> AppResult<Option<missing_report::Model>> {
        self.report_repo.find_by_id(id).await
    }

    async fn list_reports(&self, filter: &ReportFilter) -> AppResult<Vec<missing_report::Model>> {
        self.report_repo.list(filter).await
    }

    async fn insert_report(
        &self,
        report: missing_report::Model,
    ) -> AppResult<missing_report::Model> {
        self.report_repo.create(report).await
    }

    async fn save_report(
        &self,
        report: missing_report::Model,
        expected_version: i32,
        tip: Option<TipWrite>,
    ) -> AppResult<missing_report::Model> {
        match tip {
            Some(tip) => {
                self.report_repo
                    .update_with_tip(report, expected_version, tip)
                    .await
            }
            None => {
                self.report_repo
                    .update_versioned(report, expected_version)
                    .await
            }
        }
    }

    async fn find_tip(&self, id: &str) -> AppResult<Option<community_tip::Model>> {
        self.tip_repo.find_by_id(id).await
    }

    async fn list_tips(&self, report_id: &str) -> AppResult<Vec<community_tip::Model>> {
        self.tip_repo.find_by_report(report_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support::{sample_report, sample_tip};
    use flare_db::entities::missing_report::ReportStatus;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_in_memory_version_check() {
        let store = InMemoryReportStore::new();
        let report = store
            .insert_report(sample_report("r1", ReportStatus::Pending))
            .await
            .unwrap();

        let mut next = report.clone();
        next.status = ReportStatus::Active;
        let saved = store.save_report(next, report.version, None).await.unwrap();
        assert_eq!(saved.version, report.version + 1);

        let stale = store.save_report(report.clone(), report.version, None).await;
        assert!(matches!(stale, Err(AppError::ConcurrencyConflict(_))));

        let stored = store.find_report("r1").await.unwrap().unwrap();
        assert_eq!(stored.status, ReportStatus::Active);
    }

    #[tokio::test]
    async fn test_in_memory_conflict_leaves_tips_untouched() {
        let store = InMemoryReportStore::new();
        let report = store
            .insert_report(sample_report("r1", ReportStatus::Active))
            .await
            .unwrap();

        let result = store
            .save_report(
                report.clone(),
                report.version + 7,
                Some(TipWrite::Insert(sample_tip("t1", "r1"))),
            )
            .await;
        assert!(result.is_err());
        assert!(store.list_tips("r1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_list_filters_and_pages() {
        let store = InMemoryReportStore::new();
        let mut older = sample_report("r1", ReportStatus::Active);
        older.started_at -= chrono::Duration::hours(1);
        store.insert_report(older).await.unwrap();
        store
            .insert_report(sample_report("r2", ReportStatus::Active))
            .await
            .unwrap();
        store
            .insert_report(sample_report("r3", ReportStatus::Closed))
            .await
            .unwrap();

        let active = store
            .list_reports(&ReportFilter::with_statuses(&[ReportStatus::Active]))
            .await
            .unwrap();
        assert_eq!(
            active.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["r2", "r1"]
        );

        let page = store
            .list_reports(&ReportFilter {
                limit: Some(1),
                offset: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn test_db_store_maps_zero_rows_to_conflict() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );
        let store = DbReportStore::new(ReportRepository::new(db.clone()), TipRepository::new(db));

        let result = store
            .save_report(sample_report("r1", ReportStatus::Active), 0, None)
            .await;
        assert!(matches!(result, Err(AppError::ConcurrencyConflict(_))));
    }
}
