//! Background work for flare-rs.
//!
//! - **Scheduler**: per-report expansion ticks and auto-verify deadlines
//! - **Dispatch**: bounded notification queue with retry and dead letters
//! - **Gateways**: partner webhooks and the Redis public alert feed

pub mod dispatch;
pub mod feed;
pub mod gateway;
pub mod retry;
pub mod scheduler;
pub mod webhook;

pub use dispatch::{DispatchHandle, DispatchJob, Dispatcher};
pub use feed::{FeedMessage, RedisFeedGateway, alerts_channel};
pub use gateway::RoutingGateway;
pub use retry::{DeadLetterEntry, RetryConfig};
pub use scheduler::{LifecycleTick, TickScheduler, run_lifecycle_worker};
pub use webhook::{SIGNATURE_HEADER, WebhookGateway, sign_payload};
