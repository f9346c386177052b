//! Community tip endpoints.

use axum::{Json, Router, extract::State, routing::post};
use flare_common::AppResult;
use flare_core::SubmitTipInput;
use flare_db::entities::community_tip::{self, TipStatus};
use serde::Deserialize;

use crate::{extractors::Actor, middleware::AppState, response::ApiResponse};

/// Submit tip request. Open to the public.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTipRequest {
    pub report_id: String,
    #[serde(flatten)]
    pub tip: SubmitTipInput,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTipsRequest {
    pub report_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowTipRequest {
    pub tip_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTipStatusRequest {
    pub tip_id: String,
    pub status: TipStatus,
    pub dismiss_reason: Option<String>,
}

async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateTipRequest>,
) -> AppResult<ApiResponse<community_tip::Model>> {
    let tip = state.tip_service.submit_tip(&req.report_id, req.tip).await?;
    Ok(ApiResponse::ok(tip))
}

async fn list(
    State(state): State<AppState>,
    _actor: Actor,
    Json(req): Json<ListTipsRequest>,
) -> AppResult<ApiResponse<Vec<community_tip::Model>>> {
    let tips = state.tip_service.list_tips_for_report(&req.report_id).await?;
    Ok(ApiResponse::ok(tips))
}

async fn show(
    State(state): State<AppState>,
    _actor: Actor,
    Json(req): Json<ShowTipRequest>,
) -> AppResult<ApiResponse<community_tip::Model>> {
    let tip = state.tip_service.get_tip(&req.tip_id).await?;
    Ok(ApiResponse::ok(tip))
}

/// Review a tip.
async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<UpdateTipStatusRequest>,
) -> AppResult<ApiResponse<community_tip::Model>> {
    let tip = state
        .tip_service
        .set_tip_status(
            &req.tip_id,
            req.status,
            req.dismiss_reason.as_deref(),
            actor.as_str(),
        )
        .await?;
    Ok(ApiResponse::ok(tip))
}

/// Create the tips router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/list", post(list))
        .route("/show", post(show))
        .route("/update-status", post(update_status))
}
