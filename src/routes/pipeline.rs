//! Pipeline Routes
//!
//! Funnel catalogue, label normalization and the deal boards.

use super::{PersistQuery, TypeQuery};
use crate::error::{validation_error, AppError};
use crate::models::SuccessResponse;
use crate::pipeline::funnel::{self, Funnel};
use crate::pipeline::service::{
    BoardView, CreateOutcome, DirectoryView, PipelineService, ResyncReport, SummaryView,
    UnsyncedWrite,
};
use crate::pipeline::types::{NewRecord, PipelineRecord, RecordType};
use crate::pipeline::{StageMove, StageNormalizer};
use crate::state::SharedState;
use crate::sync::SyncStatus;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

// =============================================================================
// REQUEST/RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeRequest {
    #[serde(default = "default_funnel")]
    pub funnel: String,
    pub label: String,
}

fn default_funnel() -> String {
    "deals".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeResponse {
    pub funnel: &'static str,
    pub label: String,
    pub rewritten: String,
    pub stage: &'static str,
    /// The cascade did not land on a canonical key
    pub defaulted: bool,
}

#[derive(Debug, Serialize)]
pub struct FunnelListResponse {
    pub funnels: Vec<&'static Funnel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRequest {
    pub stage: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveResponse {
    #[serde(rename = "move")]
    pub stage_move: StageMove,
    pub record: PipelineRecord,
    pub sync: SyncStatus,
    /// The requested label matched no stage and the first stage was used
    pub defaulted: bool,
}

/// A record with the stages a guided advance could still reach
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDetail {
    pub record: PipelineRecord,
    pub next_stages: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsyncedResponse {
    pub unsynced: Vec<UnsyncedWrite>,
}

#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    #[serde(rename = "type")]
    pub record_type: String,
}

// =============================================================================
// SHARED HANDLER BODIES
// =============================================================================

/// Send a locally applied move and report how the write went
pub(super) async fn finish_move(
    service: &PipelineService,
    container: &str,
    record_id: &str,
    stage_move: StageMove,
    defaulted: bool,
    persist: PersistQuery,
) -> Result<MoveResponse, AppError> {
    let sync = if persist.background {
        service.spawn_persist(container, stage_move.clone());
        SyncStatus::Pending
    } else {
        service.persist_move(container, &stage_move).await
    };
    let record = service.record(container, record_id).await?;

    Ok(MoveResponse {
        stage_move,
        record,
        sync,
        defaulted,
    })
}

/// Whether a manual override fell back to the first stage because `label`
/// matched none
pub(super) fn label_defaulted(service: &PipelineService, label: &str, stage_move: &StageMove) -> bool {
    StageNormalizer::rewrite(service.funnel(), label) != stage_move.to
}

pub(super) async fn record_detail(
    service: &PipelineService,
    container: &str,
    record_id: &str,
) -> Result<RecordDetail, AppError> {
    Ok(RecordDetail {
        record: service.record(container, record_id).await?,
        next_stages: service.next_stages(container, record_id).await?,
    })
}

pub(super) fn move_message(stage_move: &StageMove, sync: SyncStatus) -> String {
    match sync {
        SyncStatus::Failed => format!("Moved to {} locally; remote write failed", stage_move.to),
        SyncStatus::Pending => format!("Moved to {}; saving in background", stage_move.to),
        SyncStatus::Synced => format!("Moved to {}", stage_move.to),
    }
}

pub(super) fn create_status(outcome: &CreateOutcome) -> (StatusCode, &'static str) {
    match outcome.sync {
        SyncStatus::Synced => (StatusCode::CREATED, "Record created"),
        _ => (StatusCode::ACCEPTED, "Record kept locally; remote create failed"),
    }
}

// =============================================================================
// FUNNEL ROUTES
// =============================================================================

/// List the declared funnels with their stages and rewrite rules
pub async fn list_funnels() -> Json<SuccessResponse<FunnelListResponse>> {
    Json(SuccessResponse::with_data(
        "Funnels retrieved",
        FunnelListResponse {
            funnels: funnel::all().to_vec(),
        },
    ))
}

/// Normalize a free-text stage label
pub async fn normalize_label(
    Json(req): Json<NormalizeRequest>,
) -> Result<Json<SuccessResponse<NormalizeResponse>>, AppError> {
    let funnel = funnel::by_name(&req.funnel)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown funnel '{}'", req.funnel)))?;

    let rewritten = StageNormalizer::rewrite(funnel, &req.label);
    let stage = StageNormalizer::normalize(funnel, &req.label);

    Ok(Json(SuccessResponse::with_data(
        "Label normalized",
        NormalizeResponse {
            funnel: funnel.name,
            defaulted: rewritten != stage,
            label: req.label,
            rewritten,
            stage,
        },
    )))
}

// =============================================================================
// DEAL BOARD ROUTES
// =============================================================================

/// Board of the configured default container
pub async fn get_default_board(
    State(state): State<SharedState>,
    Query(query): Query<TypeQuery>,
) -> Result<Json<SuccessResponse<BoardView>>, AppError> {
    let view = state.deals.board(&state.default_container, query.filter()?).await?;
    Ok(Json(SuccessResponse::with_data("Pipeline retrieved", view)))
}

pub async fn get_board(
    State(state): State<SharedState>,
    Path(container): Path<String>,
    Query(query): Query<TypeQuery>,
) -> Result<Json<SuccessResponse<BoardView>>, AppError> {
    let view = state.deals.board(&container, query.filter()?).await?;
    Ok(Json(SuccessResponse::with_data("Pipeline retrieved", view)))
}

pub async fn get_summary(
    State(state): State<SharedState>,
    Path(container): Path<String>,
    Query(query): Query<TypeQuery>,
) -> Result<Json<SuccessResponse<SummaryView>>, AppError> {
    let view = state.deals.summary(&container, query.filter()?).await?;
    Ok(Json(SuccessResponse::with_data("Pipeline summary retrieved", view)))
}

pub async fn reload_board(
    State(state): State<SharedState>,
    Path(container): Path<String>,
) -> Json<SuccessResponse<BoardView>> {
    let view = state.deals.reload(&container).await;
    Json(SuccessResponse::with_data("Pipeline reloaded", view))
}

/// Records of one type, for selection lists
pub async fn records_by_type(
    State(state): State<SharedState>,
    Path(container): Path<String>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<SuccessResponse<DirectoryView>>, AppError> {
    let record_type: RecordType = query.record_type.parse().map_err(AppError::BadRequest)?;
    let view = state.deals.records_by_type(&container, record_type).await;
    Ok(Json(SuccessResponse::with_data("Records retrieved", view)))
}

pub async fn create_record(
    State(state): State<SharedState>,
    Path(container): Path<String>,
    Json(fields): Json<NewRecord>,
) -> Result<(StatusCode, Json<SuccessResponse<CreateOutcome>>), AppError> {
    fields.validate().map_err(|e| validation_error(e.to_string()))?;

    let outcome = state.deals.create(&container, fields).await?;
    let (status, message) = create_status(&outcome);
    Ok((status, Json(SuccessResponse::with_data(message, outcome))))
}

pub async fn get_record(
    State(state): State<SharedState>,
    Path((container, id)): Path<(String, String)>,
) -> Result<Json<SuccessResponse<RecordDetail>>, AppError> {
    let detail = record_detail(&state.deals, &container, &id).await?;
    Ok(Json(SuccessResponse::with_data("Record retrieved", detail)))
}

/// Guided advance to the next stage
pub async fn advance_record(
    State(state): State<SharedState>,
    Path((container, id)): Path<(String, String)>,
    Query(persist): Query<PersistQuery>,
) -> Result<Json<SuccessResponse<MoveResponse>>, AppError> {
    let stage_move = state.deals.advance(&container, &id).await?;
    let response = finish_move(&state.deals, &container, &id, stage_move, false, persist).await?;
    Ok(Json(SuccessResponse::with_data(
        move_message(&response.stage_move, response.sync),
        response,
    )))
}

/// Manual override to any stage, earlier ones included. The label goes
/// through the normalizer, so a label that matches no stage (a typo too)
/// lands on the first stage; the response flags that as `defaulted`.
pub async fn set_stage(
    State(state): State<SharedState>,
    Path((container, id)): Path<(String, String)>,
    Query(persist): Query<PersistQuery>,
    Json(req): Json<StageRequest>,
) -> Result<Json<SuccessResponse<MoveResponse>>, AppError> {
    let stage_move = state.deals.move_to(&container, &id, &req.stage).await?;
    let defaulted = label_defaulted(&state.deals, &req.stage, &stage_move);
    let response = finish_move(&state.deals, &container, &id, stage_move, defaulted, persist).await?;
    Ok(Json(SuccessResponse::with_data(
        move_message(&response.stage_move, response.sync),
        response,
    )))
}

pub async fn list_unsynced(
    State(state): State<SharedState>,
    Path(container): Path<String>,
) -> Json<SuccessResponse<UnsyncedResponse>> {
    let unsynced = state.deals.unsynced(&container).await;
    Json(SuccessResponse::with_data(
        format!("{} unsynced writes", unsynced.len()),
        UnsyncedResponse { unsynced },
    ))
}

/// Retry every unsynced write
pub async fn resync(
    State(state): State<SharedState>,
    Path(container): Path<String>,
) -> Json<SuccessResponse<ResyncReport>> {
    let report = state.deals.resync(&container).await;
    Json(SuccessResponse::with_data(
        format!("{} synced, {} failed", report.synced.len(), report.failed.len()),
        report,
    ))
}
