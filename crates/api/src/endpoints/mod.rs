//! API endpoints.

mod alerts;
mod metrics;
mod registry;
mod reports;
mod tips;

use axum::{Router, routing::get};

use crate::middleware::AppState;

pub use metrics::healthz;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .nest("/reports", reports::router())
        .nest("/reports/tips", tips::router())
        .nest("/alerts", alerts::router())
        .nest("/registry", registry::router())
        .nest("/metrics", metrics::router())
}
