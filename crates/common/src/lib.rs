//! Common utilities and shared types for flare-rs.
//!
//! This crate provides foundational components used across all flare-rs crates:
//!
//! - **Configuration**: Application and alert-policy settings via [`Config`]
//! - **Error handling**: The lifecycle error taxonomy via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Metrics**: Engine and HTTP counters via [`Metrics`]
//!
//! # Example
//!
//! ```no_run
//! use flare_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("{} km default radius, report {id}", config.alerts.default_radius_km);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod metrics;

pub use config::{AlertPolicyConfig, Config, GatewayConfig, PartnerChannel};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use metrics::{Metrics, MetricsSnapshot, Timer, get_metrics};
