//! Child registry endpoints for the built-in registry.

use axum::{Json, Router, extract::State, routing::post};
use flare_common::{AppError, AppResult};
use flare_core::ChildSummary;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extractors::Actor, middleware::AppState, response::ApiResponse};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterGuardianRequest {
    #[validate(length(min = 1, max = 64))]
    pub guardian_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterChildRequest {
    #[validate(length(min = 1, max = 64))]
    pub child_id: String,
    #[validate(length(min = 1, max = 64))]
    pub guardian_id: String,
    #[validate(length(min = 1, max = 64))]
    pub first_name: String,
    #[validate(range(max = 17))]
    pub age: Option<u8>,
    #[validate(url)]
    pub blurred_photo_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredGuardian {
    pub guardian_id: String,
}

async fn register_guardian(
    State(state): State<AppState>,
    _actor: Actor,
    Json(req): Json<RegisterGuardianRequest>,
) -> AppResult<ApiResponse<RegisteredGuardian>> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state
        .child_registry
        .register_guardian(req.guardian_id.clone())
        .await;
    Ok(ApiResponse::ok(RegisteredGuardian {
        guardian_id: req.guardian_id,
    }))
}

async fn register_child(
    State(state): State<AppState>,
    _actor: Actor,
    Json(req): Json<RegisterChildRequest>,
) -> AppResult<ApiResponse<ChildSummary>> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let child = ChildSummary {
        child_id: req.child_id,
        guardian_id: req.guardian_id,
        first_name: req.first_name,
        age: req.age,
        blurred_photo_url: req.blurred_photo_url,
    };
    state.child_registry.register_child(child.clone()).await;
    Ok(ApiResponse::ok(child))
}

/// Create the registry router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/guardians/register", post(register_guardian))
        .route("/children/register", post(register_child))
}
