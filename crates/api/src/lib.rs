//! HTTP API layer for flare-rs.
//!
//! - **Endpoints**: POST endpoints taking JSON bodies
//! - **Extractors**: acting identity from the `X-Flare-Actor` header
//! - **Middleware**: request metrics
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::{healthz, router};
pub use extractors::{ACTOR_HEADER, Actor};
pub use middleware::{AppState, metrics_middleware};
