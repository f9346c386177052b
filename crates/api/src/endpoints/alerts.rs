//! Public community alert feed.

use axum::{Json, Router, extract::State, routing::post};
use flare_common::{AppError, AppResult};
use flare_core::{AlertQuery, CommunityAlert, GeoPoint};
use serde::Deserialize;

use crate::{middleware::AppState, response::ApiResponse};

const MAX_ALERTS: usize = 100;

/// List alerts request. `lat` and `lng` come together or not at all.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAlertsRequest {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(default)]
    pub within_broadcast: bool,
    pub limit: Option<usize>,
}

impl ListAlertsRequest {
    fn viewer(&self) -> AppResult<Option<GeoPoint>> {
        match (self.lat, self.lng) {
            (None, None) => Ok(None),
            (Some(lat), Some(lng))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) =>
            {
                Ok(Some(GeoPoint::new(lat, lng)))
            }
            _ => Err(AppError::Validation(
                "lat and lng must both be given and in range".to_string(),
            )),
        }
    }
}

async fn list(
    State(state): State<AppState>,
    Json(req): Json<ListAlertsRequest>,
) -> AppResult<ApiResponse<Vec<CommunityAlert>>> {
    let query = AlertQuery {
        viewer: req.viewer()?,
        within_broadcast: req.within_broadcast,
        limit: Some(req.limit.unwrap_or(MAX_ALERTS).min(MAX_ALERTS)),
    };
    let alerts = state.report_service.list_community_alerts(&query).await?;
    Ok(ApiResponse::ok(alerts))
}

/// Create the alerts router.
pub fn router() -> Router<AppState> {
    Router::new().route("/list", post(list))
}
