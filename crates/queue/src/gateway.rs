//! Channel routing for notification gateways.

use std::sync::Arc;

use async_trait::async_trait;
use flare_common::AppResult;
use flare_core::{
    AlertNotice, DeliveryResult, LoggingGateway, NotificationGateway, NotificationGatewayRef,
    NotifyChannel,
};

/// Sends partner notices and public-feed notices to different gateways.
#[derive(Clone)]
pub struct RoutingGateway {
    partners: NotificationGatewayRef,
    public_feed: NotificationGatewayRef,
}

impl RoutingGateway {
    #[must_use]
    pub fn new(partners: NotificationGatewayRef, public_feed: NotificationGatewayRef) -> Self {
        Self {
            partners,
            public_feed,
        }
    }
}

impl Default for RoutingGateway {
    fn default() -> Self {
        Self::new(Arc::new(LoggingGateway), Arc::new(LoggingGateway))
    }
}

#[async_trait]
impl NotificationGateway for RoutingGateway {
    async fn notify(&self, channel: NotifyChannel, notice: &AlertNotice) -> AppResult<DeliveryResult> {
        match channel {
            NotifyChannel::Partner(_) => self.partners.notify(channel, notice).await,
            NotifyChannel::PublicFeed => self.public_feed.notify(channel, notice).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flare_common::PartnerChannel;
    use flare_core::NoticeKind;
    use flare_db::entities::missing_report::{ReportPriority, ReportStatus};

    struct Fixed(bool);

    #[async_trait]
    impl NotificationGateway for Fixed {
        async fn notify(&self, _: NotifyChannel, _: &AlertNotice) -> AppResult<DeliveryResult> {
            Ok(if self.0 {
                DeliveryResult::delivered()
            } else {
                DeliveryResult::skipped("fixed")
            })
        }
    }

    #[tokio::test]
    async fn test_routes_by_channel() {
        let gateway = RoutingGateway::new(Arc::new(Fixed(true)), Arc::new(Fixed(false)));
        let notice = AlertNotice {
            kind: NoticeKind::AlertActivated,
            report_id: "r1".to_string(),
            status: ReportStatus::Active,
            priority: ReportPriority::Medium,
            radius_km: 10.0,
            notified_count: 1885,
            message: "Missing child alert active".to_string(),
            alert: None,
            occurred_at: Utc::now(),
        };

        let partner = gateway
            .notify(NotifyChannel::Partner(PartnerChannel::Media), &notice)
            .await
            .unwrap();
        let public = gateway.notify(NotifyChannel::PublicFeed, &notice).await.unwrap();

        assert!(partner.delivered);
        assert!(!public.delivered);
    }
}
