//! Notification gateway seam.
//!
//! The engine never talks to partners directly. After a transition commits
//! it hands [`AlertNotice`]s to a [`NotificationDispatch`], which queues them
//! for delivery through a [`NotificationGateway`]. Delivery failures never
//! touch report state.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flare_common::{AppResult, PartnerChannel};
use flare_db::entities::missing_report::{ReportPriority, ReportStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::services::projection::CommunityAlert;

/// Where a notice goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyChannel {
    Partner(PartnerChannel),
    PublicFeed,
}

impl std::fmt::Display for NotifyChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Partner(channel) => write!(f, "partner:{channel}"),
            Self::PublicFeed => f.write_str("public_feed"),
        }
    }
}

/// What happened to the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    ReportSubmitted,
    AlertActivated,
    RadiusExpanded,
    PartnerAlert,
    Broadcast,
    Escalated,
    AlertClosed,
}

/// Payload handed to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertNotice {
    pub kind: NoticeKind,
    pub report_id: String,
    pub status: ReportStatus,
    pub priority: ReportPriority,
    pub radius_km: f64,
    pub notified_count: i64,
    pub message: String,
    /// Public view of the report, when it is visible.
    pub alert: Option<CommunityAlert>,
    pub occurred_at: DateTime<Utc>,
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    pub delivered: bool,
    pub detail: Option<String>,
}

impl DeliveryResult {
    #[must_use]
    pub const fn delivered() -> Self {
        Self {
            delivered: true,
            detail: None,
        }
    }

    /// Nothing to deliver to. Not retried.
    #[must_use]
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            delivered: false,
            detail: Some(reason.into()),
        }
    }
}

/// Pushes notices to partners and the public. Errors are retried by the
/// dispatcher; `Ok` with `delivered == false` is final.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn notify(&self, channel: NotifyChannel, notice: &AlertNotice)
    -> AppResult<DeliveryResult>;
}

/// Shared gateway handle.
pub type NotificationGatewayRef = Arc<dyn NotificationGateway>;

/// Gateway that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingGateway;

#[async_trait]
impl NotificationGateway for LoggingGateway {
    async fn notify(
        &self,
        channel: NotifyChannel,
        notice: &AlertNotice,
    ) -> AppResult<DeliveryResult> {
        info!(
            %channel,
            report_id = %notice.report_id,
            kind = ?notice.kind,
            radius_km = notice.radius_km,
            "Notification (no gateway configured)"
        );
        Ok(DeliveryResult::delivered())
    }
}

/// Fire-and-forget hand-off from the engine. Must not block.
pub trait NotificationDispatch: Send + Sync {
    fn dispatch(&self, channel: NotifyChannel, notice: AlertNotice);
}

/// Shared dispatch handle.
pub type NotificationDispatchRef = Arc<dyn NotificationDispatch>;

/// Dispatch that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpDispatch;

impl NotificationDispatch for NoOpDispatch {
    fn dispatch(&self, _channel: NotifyChannel, _notice: AlertNotice) {}
}
