//! Community tip intake.

use chrono::{DateTime, Utc};
use flare_common::{AppError, AppResult, Metrics, get_metrics};
use flare_db::entities::community_tip::{self, TipStatus};
use flare_db::entities::missing_report::{ReportPriority, TimelineSeverity};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::services::report::{ReportService, raise_priority};
use crate::services::store::TipWrite;

const ANONYMOUS_REPORTER: &str = "Anonymous";

/// Input for a new tip.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTipInput {
    #[validate(length(max = 128))]
    #[serde(default)]
    pub reporter_name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: String,
    #[validate(length(max = 512))]
    pub location: String,
    /// When the sighting happened. Defaults to the submission time.
    #[serde(default)]
    pub when: Option<DateTime<Utc>>,
}

/// Tip service. Tip writes share the report's lock and version check.
#[derive(Clone)]
pub struct TipService {
    reports: ReportService,
}

impl TipService {
    #[must_use]
    pub const fn new(reports: ReportService) -> Self {
        Self { reports }
    }

    /// Attach a tip to a non-terminal report.
    pub async fn submit_tip(
        &self,
        report_id: &str,
        input: SubmitTipInput,
    ) -> AppResult<community_tip::Model> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let description = input.description.trim().to_string();
        if description.is_empty() {
            return Err(AppError::Validation(
                "description must not be empty".to_string(),
            ));
        }
        let location = input.location.trim().to_string();
        if location.is_empty() {
            return Err(AppError::Validation("location must not be empty".to_string()));
        }
        let reporter_name = input
            .reporter_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(ANONYMOUS_REPORTER)
            .to_string();

        let guard = self.reports.lock_report(report_id).await;
        let now = self.reports.now();
        let tip = community_tip::Model {
            id: self.reports.id_gen().generate(),
            report_id: report_id.to_string(),
            created_at: now,
            reporter_name,
            description,
            location,
            sighted_at: input.when.unwrap_or(now),
            status: TipStatus::Pending,
            dismiss_reason: None,
            reviewed_by: None,
            updated_at: None,
        };

        let report = self
            .reports
            .apply_locked(&guard, report_id, now, |d| {
                d.ensure_not_terminal()?;
                d.report.tips_received += 1;
                d.mark_changed();
                Ok(Some(TipWrite::Insert(tip.clone())))
            })
            .await?;

        Metrics::incr(&get_metrics().tips_submitted);
        info!(
            report_id = %report.id,
            tip_id = %tip.id,
            tips_received = report.tips_received,
            "Tip submitted"
        );
        Ok(tip)
    }

    /// Review a tip. A credible tip raises its report to at least high
    /// priority.
    pub async fn set_tip_status(
        &self,
        tip_id: &str,
        status: TipStatus,
        dismiss_reason: Option<&str>,
        actor: &str,
    ) -> AppResult<community_tip::Model> {
        if status == TipStatus::Pending {
            return Err(AppError::Validation(
                "A reviewed tip cannot return to pending".to_string(),
            ));
        }
        let dismiss_reason = match status {
            TipStatus::Dismissed => Some(
                dismiss_reason
                    .map(str::trim)
                    .filter(|reason| !reason.is_empty())
                    .ok_or_else(|| {
                        AppError::Validation("dismissReason is required to dismiss a tip".to_string())
                    })?
                    .to_string(),
            ),
            _ => None,
        };

        let report_id = self.get_tip(tip_id).await?.report_id;
        let guard = self.reports.lock_report(&report_id).await;

        // Re-read under the lock; another review may have landed meanwhile.
        let current = self.get_tip(tip_id).await?;
        if current.status == status && current.dismiss_reason == dismiss_reason {
            return Ok(current);
        }

        let now = self.reports.now();
        let updated = community_tip::Model {
            status,
            dismiss_reason,
            reviewed_by: Some(actor.to_string()),
            updated_at: Some(now),
            ..current
        };

        self.reports
            .apply_locked(&guard, &report_id, now, |d| {
                let (title, severity) = match status {
                    TipStatus::Credible => ("Tip Marked Credible", TimelineSeverity::Success),
                    TipStatus::Investigate => ("Tip Under Investigation", TimelineSeverity::Warning),
                    _ => ("Tip Dismissed", TimelineSeverity::Info),
                };
                let detail = match &updated.dismiss_reason {
                    Some(reason) => format!("Tip from {} dismissed: {reason}", updated.reporter_name),
                    None => format!("Tip from {} at {}.", updated.reporter_name, updated.location),
                };
                d.record(title, detail, severity, actor);

                if status == TipStatus::Credible
                    && !d.report.status.is_terminal()
                    && d.report.priority < ReportPriority::High
                {
                    raise_priority(d, ReportPriority::High, actor);
                }
                Ok(Some(TipWrite::Update(updated.clone())))
            })
            .await?;

        Metrics::incr(&get_metrics().tips_reviewed);
        info!(
            report_id = %report_id,
            tip_id = %updated.id,
            status = updated.status.as_str(),
            "Tip reviewed"
        );
        Ok(updated)
    }

    /// Tips of a report, oldest first.
    pub async fn list_tips_for_report(&self, report_id: &str) -> AppResult<Vec<community_tip::Model>> {
        self.reports.get_report(report_id).await?;
        self.reports.store().list_tips(report_id).await
    }

    /// Get a tip by ID.
    pub async fn get_tip(&self, tip_id: &str) -> AppResult<community_tip::Model> {
        self.reports
            .store()
            .find_tip(tip_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tip {tip_id} not found")))
    }
}
