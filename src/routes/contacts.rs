//! Contact Routes
//!
//! The contact lifecycle board. Contacts live in the local store under a
//! single collection.

use super::pipeline::{
    create_status, finish_move, label_defaulted, move_message, record_detail, MoveResponse,
    RecordDetail, StageRequest, UnsyncedResponse,
};
use super::{PersistQuery, TypeQuery};
use crate::error::{validation_error, AppError};
use crate::models::SuccessResponse;
use crate::pipeline::service::{BoardView, CreateOutcome, ResyncReport, SummaryView};
use crate::pipeline::types::NewRecord;
use crate::state::{SharedState, CONTACTS_KEY};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

pub async fn get_board(
    State(state): State<SharedState>,
    Query(query): Query<TypeQuery>,
) -> Result<Json<SuccessResponse<BoardView>>, AppError> {
    let view = state.contacts.board(CONTACTS_KEY, query.filter()?).await?;
    Ok(Json(SuccessResponse::with_data("Contacts retrieved", view)))
}

pub async fn get_summary(
    State(state): State<SharedState>,
    Query(query): Query<TypeQuery>,
) -> Result<Json<SuccessResponse<SummaryView>>, AppError> {
    let view = state.contacts.summary(CONTACTS_KEY, query.filter()?).await?;
    Ok(Json(SuccessResponse::with_data("Contact summary retrieved", view)))
}

pub async fn create_contact(
    State(state): State<SharedState>,
    Json(fields): Json<NewRecord>,
) -> Result<(StatusCode, Json<SuccessResponse<CreateOutcome>>), AppError> {
    fields.validate().map_err(|e| validation_error(e.to_string()))?;

    let outcome = state.contacts.create(CONTACTS_KEY, fields).await?;
    let (status, message) = create_status(&outcome);
    Ok((status, Json(SuccessResponse::with_data(message, outcome))))
}

pub async fn get_contact(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse<RecordDetail>>, AppError> {
    let detail = record_detail(&state.contacts, CONTACTS_KEY, &id).await?;
    Ok(Json(SuccessResponse::with_data("Contact retrieved", detail)))
}

pub async fn advance_contact(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(persist): Query<PersistQuery>,
) -> Result<Json<SuccessResponse<MoveResponse>>, AppError> {
    let stage_move = state.contacts.advance(CONTACTS_KEY, &id).await?;
    let response = finish_move(&state.contacts, CONTACTS_KEY, &id, stage_move, false, persist).await?;
    Ok(Json(SuccessResponse::with_data(
        move_message(&response.stage_move, response.sync),
        response,
    )))
}

/// Manual override; an unmatched label lands on `aware` and is flagged `defaulted`
pub async fn set_stage(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(persist): Query<PersistQuery>,
    Json(req): Json<StageRequest>,
) -> Result<Json<SuccessResponse<MoveResponse>>, AppError> {
    let stage_move = state.contacts.move_to(CONTACTS_KEY, &id, &req.stage).await?;
    let defaulted = label_defaulted(&state.contacts, &req.stage, &stage_move);
    let response = finish_move(&state.contacts, CONTACTS_KEY, &id, stage_move, defaulted, persist).await?;
    Ok(Json(SuccessResponse::with_data(
        move_message(&response.stage_move, response.sync),
        response,
    )))
}

pub async fn list_unsynced(State(state): State<SharedState>) -> Json<SuccessResponse<UnsyncedResponse>> {
    let unsynced = state.contacts.unsynced(CONTACTS_KEY).await;
    Json(SuccessResponse::with_data(
        format!("{} unsynced writes", unsynced.len()),
        UnsyncedResponse { unsynced },
    ))
}

/// Retry every unsynced contact write
pub async fn resync(State(state): State<SharedState>) -> Json<SuccessResponse<ResyncReport>> {
    let report = state.contacts.resync(CONTACTS_KEY).await;
    Json(SuccessResponse::with_data(
        format!("{} synced, {} failed", report.synced.len(), report.failed.len()),
        report,
    ))
}
