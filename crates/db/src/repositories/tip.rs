//! Community tip repository.
//!
//! Tips are written together with their report through
//! [`ReportRepository::update_with_tip`](super::ReportRepository::update_with_tip);
//! this repository only reads.

use std::sync::Arc;

use crate::entities::{CommunityTip, community_tip};
use flare_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};

/// Tip repository for database operations.
#[derive(Clone)]
pub struct TipRepository {
    db: Arc<DatabaseConnection>,
}

impl TipRepository {
    /// Create a new tip repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a tip by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<community_tip::Model>> {
        CommunityTip::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a tip by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<community_tip::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tip {id} not found")))
    }

    /// All tips of a report, oldest first.
    pub async fn find_by_report(&self, report_id: &str) -> AppResult<Vec<community_tip::Model>> {
        CommunityTip::find()
            .filter(community_tip::Column::ReportId.eq(report_id))
            .order_by_asc(community_tip::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count tips of a report.
    pub async fn count_by_report(&self, report_id: &str) -> AppResult<u64> {
        CommunityTip::find()
            .filter(community_tip::Column::ReportId.eq(report_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::community_tip::TipStatus;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_tip(id: &str, status: TipStatus) -> community_tip::Model {
        let now = Utc::now();
        community_tip::Model {
            id: id.to_string(),
            report_id: "r1".to_string(),
            created_at: now,
            reporter_name: "Sam".to_string(),
            description: "Child seen boarding the 42 bus".to_string(),
            location: "Market Street".to_string(),
            sighted_at: now,
            status,
            dismiss_reason: None,
            reviewed_by: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_report() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_tip("t1", TipStatus::Pending),
                    create_test_tip("t2", TipStatus::Credible),
                ]])
                .into_connection(),
        );

        let repo = TipRepository::new(db);
        let tips = repo.find_by_report("r1").await.unwrap();
        assert_eq!(tips.len(), 2);
        assert_eq!(tips[1].status, TipStatus::Credible);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<community_tip::Model>::new()])
                .into_connection(),
        );

        let repo = TipRepository::new(db);
        assert!(matches!(
            repo.get_by_id("nope").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_count_by_report() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(4))
                }]])
                .into_connection(),
        );

        let repo = TipRepository::new(db);
        assert_eq!(repo.count_by_report("r1").await.unwrap(), 4);
    }
}
