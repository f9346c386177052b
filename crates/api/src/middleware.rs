//! API state and middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use flare_common::{Timer, get_metrics};
use flare_core::{InMemoryChildRegistry, ReportService, TipService};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub report_service: ReportService,
    pub tip_service: TipService,
    pub child_registry: Arc<InMemoryChildRegistry>,
}

impl AppState {
    #[must_use]
    pub fn new(report_service: ReportService, child_registry: Arc<InMemoryChildRegistry>) -> Self {
        Self {
            tip_service: TipService::new(report_service.clone()),
            report_service,
            child_registry,
        }
    }
}

/// Record status and latency of every request.
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let timer = Timer::start();
    let response = next.run(req).await;
    get_metrics().record_http_request(response.status().as_u16(), timer.elapsed());
    response
}
