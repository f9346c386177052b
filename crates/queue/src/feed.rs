//! Public alert feed over Redis Pub/Sub.
//!
//! Community notices are published as JSON on `{prefix}:alerts` so any
//! number of edge servers can push them to subscribed clients.

#![allow(missing_docs)]

use async_trait::async_trait;
use fred::clients::Client;
use fred::interfaces::{ClientLike, PubsubInterface};
use fred::types::config::Config as RedisConfig;
use flare_common::{AppError, AppResult};
use flare_core::{
    AlertNotice, CommunityAlert, DeliveryResult, NoticeKind, NotificationGateway, NotifyChannel,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Message published on the feed channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMessage {
    pub kind: NoticeKind,
    pub report_id: String,
    pub message: String,
    /// Absent when the report is no longer publicly visible.
    pub alert: Option<CommunityAlert>,
}

impl From<&AlertNotice> for FeedMessage {
    fn from(notice: &AlertNotice) -> Self {
        Self {
            kind: notice.kind,
            report_id: notice.report_id.clone(),
            message: notice.message.clone(),
            alert: notice.alert.clone(),
        }
    }
}

/// Feed channel name for a key prefix.
#[must_use]
pub fn alerts_channel(prefix: &str) -> String {
    format!("{prefix}:alerts")
}

/// Publishes public-feed notices to Redis.
#[derive(Clone)]
pub struct RedisFeedGateway {
    publisher: Client,
    channel: String,
}

impl RedisFeedGateway {
    /// Connect to Redis.
    pub async fn connect(redis_url: &str, prefix: &str) -> AppResult<Self> {
        let config = RedisConfig::from_url(redis_url).map_err(|e| AppError::Redis(e.to_string()))?;
        let publisher = Client::new(config, None, None, None);
        publisher
            .init()
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        let channel = alerts_channel(prefix);
        info!(channel = %channel, "Redis alert feed initialized");

        Ok(Self { publisher, channel })
    }
}

#[async_trait]
impl NotificationGateway for RedisFeedGateway {
    async fn notify(&self, channel: NotifyChannel, notice: &AlertNotice) -> AppResult<DeliveryResult> {
        if channel != NotifyChannel::PublicFeed {
            return Ok(DeliveryResult::skipped("not the public feed"));
        }

        let payload = serde_json::to_string(&FeedMessage::from(notice))
            .map_err(|e| AppError::Internal(format!("Serialization error: {e}")))?;
        let _: () = self
            .publisher
            .publish(self.channel.as_str(), payload)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        debug!(channel = %self.channel, report_id = %notice.report_id, "Published feed message");
        Ok(DeliveryResult::delivered())
    }
}
