//! Report endpoints.

use axum::{Json, Router, extract::State, routing::post};
use flare_common::{AppResult, PartnerChannel};
use flare_core::{ReportDetail, ReportFilter, SubmitReportInput};
use flare_db::entities::missing_report::{self, ReportPriority, ReportStatus, ResolutionType};
use serde::{Deserialize, Serialize};

use crate::{extractors::Actor, middleware::AppState, response::ApiResponse};

// ==================== Request/Response Types ====================

/// Request naming one report.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportIdRequest {
    pub report_id: String,
}

/// List reports request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReportsRequest {
    #[serde(default)]
    pub status: Vec<ReportStatus>,
    pub guardian_id: Option<String>,
    pub child_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    50
}

const MAX_LIMIT: u64 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    pub report_id: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandByRequest {
    pub report_id: String,
    pub step_km: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub report_id: String,
    pub resolution_type: ResolutionType,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNoteRequest {
    pub report_id: String,
    pub note: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePartnerRequest {
    pub report_id: String,
    pub channel: PartnerChannel,
    pub notified: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalateRequest {
    pub report_id: String,
    pub priority: ReportPriority,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub report_id: String,
    pub admin_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub report_id: String,
    pub message: String,
}

/// Radius after an expansion.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadiusResponse {
    pub report_id: String,
    pub radius_km: f64,
}

// ==================== Handlers ====================

/// File a new report.
async fn create(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<SubmitReportInput>,
) -> AppResult<ApiResponse<missing_report::Model>> {
    let report = state
        .report_service
        .submit_report(input, actor.as_str())
        .await?;
    Ok(ApiResponse::ok(report))
}

/// Report with tips and public view.
async fn show(
    State(state): State<AppState>,
    _actor: Actor,
    Json(req): Json<ReportIdRequest>,
) -> AppResult<ApiResponse<ReportDetail>> {
    let detail = state.report_service.get_report_detail(&req.report_id).await?;
    Ok(ApiResponse::ok(detail))
}

/// Admin queue.
async fn list(
    State(state): State<AppState>,
    _actor: Actor,
    Json(req): Json<ListReportsRequest>,
) -> AppResult<ApiResponse<Vec<missing_report::Model>>> {
    let filter = ReportFilter {
        statuses: req.status,
        guardian_id: req.guardian_id,
        child_id: req.child_id,
        limit: Some(req.limit.min(MAX_LIMIT)),
        offset: req.offset,
    };
    let reports = state.report_service.list_reports(&filter).await?;
    Ok(ApiResponse::ok(reports))
}

async fn verify(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<ReportIdRequest>,
) -> AppResult<ApiResponse<missing_report::Model>> {
    let report = state
        .report_service
        .verify_report(&req.report_id, actor.as_str())
        .await?;
    Ok(ApiResponse::ok(report))
}

async fn reject(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<RejectRequest>,
) -> AppResult<ApiResponse<missing_report::Model>> {
    let report = state
        .report_service
        .reject_report(&req.report_id, actor.as_str(), &req.reason)
        .await?;
    Ok(ApiResponse::ok(report))
}

/// Catch the radius up to the current time.
async fn expand(
    State(state): State<AppState>,
    _actor: Actor,
    Json(req): Json<ReportIdRequest>,
) -> AppResult<ApiResponse<RadiusResponse>> {
    let now = state.report_service.now();
    let radius_km = state.report_service.expand_radius(&req.report_id, now).await?;
    Ok(ApiResponse::ok(RadiusResponse {
        report_id: req.report_id,
        radius_km,
    }))
}

async fn expand_by(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<ExpandByRequest>,
) -> AppResult<ApiResponse<RadiusResponse>> {
    let radius_km = state
        .report_service
        .expand_radius_by(&req.report_id, req.step_km, actor.as_str())
        .await?;
    Ok(ApiResponse::ok(RadiusResponse {
        report_id: req.report_id,
        radius_km,
    }))
}

async fn resolve(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<ResolveRequest>,
) -> AppResult<ApiResponse<missing_report::Model>> {
    let report = state
        .report_service
        .resolve_report(
            &req.report_id,
            req.resolution_type,
            actor.as_str(),
            req.note.as_deref(),
        )
        .await?;
    Ok(ApiResponse::ok(report))
}

/// Guardian-initiated cancellation.
async fn cancel(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<ReportIdRequest>,
) -> AppResult<ApiResponse<missing_report::Model>> {
    let report = state
        .report_service
        .cancel_report(&req.report_id, actor.as_str())
        .await?;
    Ok(ApiResponse::ok(report))
}

async fn add_note(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<AddNoteRequest>,
) -> AppResult<ApiResponse<missing_report::Model>> {
    let report = state
        .report_service
        .add_case_note(&req.report_id, &req.note, actor.as_str())
        .await?;
    Ok(ApiResponse::ok(report))
}

async fn update_partner(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<UpdatePartnerRequest>,
) -> AppResult<ApiResponse<missing_report::Model>> {
    let report = state
        .report_service
        .update_partner_channel(&req.report_id, req.channel, req.notified, actor.as_str())
        .await?;
    Ok(ApiResponse::ok(report))
}

async fn escalate(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<EscalateRequest>,
) -> AppResult<ApiResponse<missing_report::Model>> {
    let report = state
        .report_service
        .escalate_priority(&req.report_id, req.priority, actor.as_str())
        .await?;
    Ok(ApiResponse::ok(report))
}

async fn assign(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<AssignRequest>,
) -> AppResult<ApiResponse<missing_report::Model>> {
    let report = state
        .report_service
        .assign_admin(&req.report_id, &req.admin_id, actor.as_str())
        .await?;
    Ok(ApiResponse::ok(report))
}

async fn broadcast(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<BroadcastRequest>,
) -> AppResult<ApiResponse<missing_report::Model>> {
    let report = state
        .report_service
        .broadcast_update(&req.report_id, &req.message, actor.as_str())
        .await?;
    Ok(ApiResponse::ok(report))
}

/// Create the reports router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/show", post(show))
        .route("/list", post(list))
        .route("/verify", post(verify))
        .route("/reject", post(reject))
        .route("/expand", post(expand))
        .route("/expand-by", post(expand_by))
        .route("/resolve", post(resolve))
        .route("/cancel", post(cancel))
        .route("/notes/add", post(add_note))
        .route("/partners/update", post(update_partner))
        .route("/escalate", post(escalate))
        .route("/assign", post(assign))
        .route("/broadcast", post(broadcast))
}
