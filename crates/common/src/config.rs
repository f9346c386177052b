//! Application configuration.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration. The in-memory report store is used when absent.
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    /// Redis configuration for the public alert feed.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// Alert lifecycle policy.
    #[serde(default)]
    pub alerts: AlertPolicyConfig,
    /// Notification gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this deployment.
    #[serde(default = "default_url")]
    pub url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            url: default_url(),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis channels.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Partner channels that can be notified about an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnerChannel {
    /// Police dispatch.
    Police,
    /// Hospitals and clinics.
    Hospital,
    /// Schools in the broadcast radius.
    School,
    /// Press and broadcast media.
    Media,
    /// Community responders.
    Community,
}

impl PartnerChannel {
    /// All partner channels in display order.
    pub const ALL: [Self; 5] = [
        Self::Police,
        Self::Hospital,
        Self::School,
        Self::Media,
        Self::Community,
    ];

    /// Lowercase channel name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Police => "police",
            Self::Hospital => "hospital",
            Self::School => "school",
            Self::Media => "media",
            Self::Community => "community",
        }
    }
}

impl std::fmt::Display for PartnerChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert lifecycle policy.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertPolicyConfig {
    /// Radius of the initial broadcast in kilometres.
    #[serde(default = "default_radius_km")]
    pub default_radius_km: f64,
    /// Extra initial radius per priority step above medium.
    #[serde(default = "default_priority_radius_step_km")]
    pub priority_radius_step_km: f64,
    /// Continuous expansion rate while a report is active.
    #[serde(default = "default_expansion_rate")]
    pub expansion_rate_km_per_hour: f64,
    /// Upper bound for the broadcast radius.
    #[serde(default = "default_max_radius_km")]
    pub max_radius_km: f64,
    /// Seconds between scheduled expansion ticks.
    #[serde(default = "default_expansion_tick_secs")]
    pub expansion_tick_secs: u64,
    /// Promote pending reports automatically after this many seconds.
    #[serde(default)]
    pub auto_verify_after_secs: Option<u64>,
    /// Hours a resolved alert stays on the public feed.
    #[serde(default = "default_alert_retention_hours")]
    pub alert_retention_hours: i64,
    /// Whether pending reports already appear on the public feed.
    #[serde(default = "default_true")]
    pub show_pending_alerts: bool,
    /// Hours of activity after which a report is escalated to critical.
    #[serde(default = "default_escalation_after_hours")]
    pub escalation_after_hours: i64,
    /// Population density used by the reach estimator.
    #[serde(default = "default_population_density")]
    pub population_density_per_km2: f64,
    /// Channels flagged as notified when a report is verified.
    #[serde(default = "default_partner_channels")]
    pub default_partner_channels: Vec<PartnerChannel>,
}

impl Default for AlertPolicyConfig {
    fn default() -> Self {
        Self {
            default_radius_km: default_radius_km(),
            priority_radius_step_km: default_priority_radius_step_km(),
            expansion_rate_km_per_hour: default_expansion_rate(),
            max_radius_km: default_max_radius_km(),
            expansion_tick_secs: default_expansion_tick_secs(),
            auto_verify_after_secs: None,
            alert_retention_hours: default_alert_retention_hours(),
            show_pending_alerts: true,
            escalation_after_hours: default_escalation_after_hours(),
            population_density_per_km2: default_population_density(),
            default_partner_channels: default_partner_channels(),
        }
    }
}

/// Longest retention, escalation or auto-verify window accepted from config.
pub const MAX_POLICY_HOURS: i64 = 24 * 365;

impl AlertPolicyConfig {
    /// Reject values the engine cannot turn into radii and deadlines.
    pub fn validate(&self) -> Result<(), String> {
        let distances = [
            ("default_radius_km", self.default_radius_km),
            ("priority_radius_step_km", self.priority_radius_step_km),
            ("expansion_rate_km_per_hour", self.expansion_rate_km_per_hour),
            ("max_radius_km", self.max_radius_km),
            ("population_density_per_km2", self.population_density_per_km2),
        ];
        for (name, value) in distances {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("alerts.{name} must be a non-negative number"));
            }
        }
        if self.default_radius_km > self.max_radius_km {
            return Err("alerts.default_radius_km must not exceed alerts.max_radius_km".to_string());
        }

        let hours = [
            ("alert_retention_hours", self.alert_retention_hours),
            ("escalation_after_hours", self.escalation_after_hours),
        ];
        for (name, value) in hours {
            if !(0..=MAX_POLICY_HOURS).contains(&value) {
                return Err(format!("alerts.{name} must be between 0 and {MAX_POLICY_HOURS}"));
            }
        }
        if self
            .auto_verify_after_secs
            .is_some_and(|secs| secs > MAX_POLICY_HOURS.unsigned_abs() * 3600)
        {
            return Err(format!(
                "alerts.auto_verify_after_secs must not exceed {MAX_POLICY_HOURS} hours"
            ));
        }
        Ok(())
    }

    /// Interval between scheduled expansion ticks.
    #[must_use]
    pub fn expansion_tick(&self) -> Duration {
        Duration::from_secs(self.expansion_tick_secs.max(1))
    }

    /// Delay before a pending report is promoted automatically.
    #[must_use]
    pub fn auto_verify_delay(&self) -> Option<Duration> {
        self.auto_verify_after_secs.map(Duration::from_secs)
    }

    /// How long a resolved alert stays visible.
    #[must_use]
    pub fn alert_retention(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.alert_retention_hours).unwrap_or(chrono::Duration::MAX)
    }

    /// How long a report may stay active before escalation.
    #[must_use]
    pub fn escalation_after(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.escalation_after_hours).unwrap_or(chrono::Duration::MAX)
    }
}

/// Notification gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Number of concurrent dispatch workers.
    #[serde(default = "default_gateway_workers")]
    pub workers: usize,
    /// Capacity of the dispatch queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Maximum delivery attempts per notification.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Ceiling for the retry delay, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// HMAC secret used to sign webhook payloads.
    #[serde(default)]
    pub signing_secret: Option<String>,
    /// Webhook endpoint per partner channel.
    #[serde(default)]
    pub partner_webhooks: HashMap<PartnerChannel, String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            workers: default_gateway_workers(),
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            signing_secret: None,
            partner_webhooks: HashMap::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

fn default_url() -> String {
    "http://localhost:3000".to_string()
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_redis_prefix() -> String {
    "flare".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_radius_km() -> f64 {
    10.0
}

const fn default_priority_radius_step_km() -> f64 {
    5.0
}

const fn default_expansion_rate() -> f64 {
    5.0
}

const fn default_max_radius_km() -> f64 {
    200.0
}

const fn default_expansion_tick_secs() -> u64 {
    60
}

const fn default_alert_retention_hours() -> i64 {
    24
}

const fn default_escalation_after_hours() -> i64 {
    3
}

const fn default_population_density() -> f64 {
    120.0
}

fn default_partner_channels() -> Vec<PartnerChannel> {
    vec![
        PartnerChannel::Police,
        PartnerChannel::Hospital,
        PartnerChannel::School,
        PartnerChannel::Community,
    ]
}

const fn default_gateway_workers() -> usize {
    4
}

const fn default_queue_capacity() -> usize {
    1000
}

const fn default_max_attempts() -> u32 {
    5
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    60_000
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `FLARE_ENV`)
    /// 4. Environment variables with `FLARE__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("FLARE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("FLARE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::checked(config.try_deserialize()?)
    }

    fn checked(loaded: Self) -> Result<Self, config::ConfigError> {
        loaded.alerts.validate().map_err(config::ConfigError::Message)?;
        Ok(loaded)
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("FLARE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::checked(config.try_deserialize()?)
    }
}
