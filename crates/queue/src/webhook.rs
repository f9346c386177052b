//! Partner webhook gateway.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flare_common::{AppError, AppResult, GatewayConfig, PartnerChannel};
use flare_core::{AlertNotice, DeliveryResult, NotificationGateway, NotifyChannel};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use url::Url;

/// Header carrying the payload signature.
pub const SIGNATURE_HEADER: &str = "X-Flare-Signature";

const USER_AGENT: &str = "Flare-Webhook/1.0";

type HmacSha256 = Hmac<Sha256>;

/// Body posted to a partner endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    channel: PartnerChannel,
    #[serde(flatten)]
    notice: &'a AlertNotice,
}

/// Posts partner notices to per-channel webhook endpoints.
#[derive(Clone)]
pub struct WebhookGateway {
    endpoints: HashMap<PartnerChannel, Url>,
    secret: Option<String>,
    http_client: Arc<reqwest::Client>,
}

impl WebhookGateway {
    pub fn new(config: &GatewayConfig) -> AppResult<Self> {
        let endpoints = config
            .partner_webhooks
            .iter()
            .map(|(channel, url)| {
                Url::parse(url)
                    .map(|url| (*channel, url))
                    .map_err(|e| AppError::Config(format!("Invalid webhook URL for {channel}: {e}")))
            })
            .collect::<AppResult<HashMap<_, _>>>()?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoints,
            secret: config.signing_secret.clone(),
            http_client: Arc::new(http_client),
        })
    }

    /// Whether any partner endpoint is configured.
    #[must_use]
    pub fn has_endpoints(&self) -> bool {
        !self.endpoints.is_empty()
    }
}

#[async_trait]
impl NotificationGateway for WebhookGateway {
    async fn notify(&self, channel: NotifyChannel, notice: &AlertNotice) -> AppResult<DeliveryResult> {
        let NotifyChannel::Partner(partner) = channel else {
            return Ok(DeliveryResult::skipped("not a partner channel"));
        };
        let Some(url) = self.endpoints.get(&partner) else {
            return Ok(DeliveryResult::skipped(format!("no webhook for {partner}")));
        };

        let body = serde_json::to_string(&WebhookPayload {
            channel: partner,
            notice,
        })
        .map_err(|e| AppError::Internal(format!("Failed to serialize payload: {e}")))?;

        let mut request = self
            .http_client
            .post(url.clone())
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT);
        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(&body, secret)?);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Request failed: {e}")))?;

        if response.status().is_success() {
            Ok(DeliveryResult::delivered())
        } else {
            Err(AppError::ExternalService(format!("HTTP {}", response.status())))
        }
    }
}

/// `sha256=<hex hmac>` of `payload` under `secret`.
pub fn sign_payload(payload: &str, secret: &str) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid signing key: {e}")))?;
    mac.update(payload.as_bytes());

    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}
