//! Roadmap Routes

use super::PersistQuery;
use crate::error::{validation_error, AppError};
use crate::models::SuccessResponse;
use crate::pipeline::types::Selection;
use crate::roadmap::board::{GroupedRoadmapView, RoadmapView};
use crate::roadmap::types::{NewRoadmapItem, RoadmapItem, RoadmapItemPatch};
use crate::roadmap::{RoadmapBoard, RoadmapFilter};
use crate::state::SharedState;
use crate::sync::SyncStatus;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct RoadmapQuery {
    pub phase: Option<String>,
    pub status: Option<String>,
}

impl RoadmapQuery {
    fn filter(&self) -> Result<RoadmapFilter, AppError> {
        Ok(RoadmapFilter {
            phase: Selection::parse(self.phase.as_deref()).map_err(AppError::BadRequest)?,
            status: Selection::parse(self.status.as_deref()).map_err(AppError::BadRequest)?,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub item: RoadmapItem,
    pub sync: SyncStatus,
}

async fn save(board: &RoadmapBoard, persist: &PersistQuery) -> SyncStatus {
    if persist.background {
        board.spawn_persist();
        SyncStatus::Pending
    } else {
        board.persist().await
    }
}

/// Filtered items in priority order
pub async fn list_items(
    State(state): State<SharedState>,
    Query(query): Query<RoadmapQuery>,
) -> Result<Json<SuccessResponse<RoadmapView>>, AppError> {
    let view = state.roadmap.list(query.filter()?).await;
    Ok(Json(SuccessResponse::with_data("Roadmap retrieved", view)))
}

/// Filtered items grouped by phase
pub async fn grouped_items(
    State(state): State<SharedState>,
    Query(query): Query<RoadmapQuery>,
) -> Result<Json<SuccessResponse<GroupedRoadmapView>>, AppError> {
    let view = state.roadmap.grouped(query.filter()?).await;
    Ok(Json(SuccessResponse::with_data("Roadmap retrieved", view)))
}

pub async fn reload_items(State(state): State<SharedState>) -> Json<SuccessResponse<RoadmapView>> {
    let view = state.roadmap.reload().await;
    Json(SuccessResponse::with_data("Roadmap reloaded", view))
}

pub async fn get_item(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse<RoadmapItem>>, AppError> {
    let item = state.roadmap.get(&id).await?;
    Ok(Json(SuccessResponse::with_data("Roadmap item retrieved", item)))
}

pub async fn create_item(
    State(state): State<SharedState>,
    Query(persist): Query<PersistQuery>,
    Json(req): Json<NewRoadmapItem>,
) -> Result<(StatusCode, Json<SuccessResponse<ItemResponse>>), AppError> {
    req.validate().map_err(|e| validation_error(e.to_string()))?;

    let item = state.roadmap.create(req).await?;
    let sync = save(&state.roadmap, &persist).await;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Roadmap item created", ItemResponse { item, sync })),
    ))
}

pub async fn update_item(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(persist): Query<PersistQuery>,
    Json(patch): Json<RoadmapItemPatch>,
) -> Result<Json<SuccessResponse<ItemResponse>>, AppError> {
    patch.validate().map_err(|e| validation_error(e.to_string()))?;

    let item = state.roadmap.update(&id, patch).await?;
    let sync = save(&state.roadmap, &persist).await;
    Ok(Json(SuccessResponse::with_data("Roadmap item updated", ItemResponse { item, sync })))
}

/// Advance the item's status one step (not started → in progress → done → not started)
pub async fn cycle_item(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(persist): Query<PersistQuery>,
) -> Result<Json<SuccessResponse<ItemResponse>>, AppError> {
    let item = state.roadmap.cycle(&id).await?;
    let sync = save(&state.roadmap, &persist).await;
    Ok(Json(SuccessResponse::with_data("Status updated", ItemResponse { item, sync })))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{app, send};
    use axum::http::StatusCode;
    use serde_json::json;

    fn ids(body: &serde_json::Value) -> Vec<String> {
        body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["id"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_list_is_prioritized() {
        let (status, body) = send(&app(), "GET", "/api/roadmap", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body), vec!["rm-2", "rm-1", "rm-7", "rm-5", "rm-3", "rm-4", "rm-6"]);
    }

    #[tokio::test]
    async fn test_filters() {
        let app = app();
        let (_, body) = send(&app, "GET", "/api/roadmap?phase=foundation&status=all", None).await;
        assert_eq!(ids(&body), vec!["rm-2", "rm-1", "rm-5"]);

        let (_, body) = send(&app, "GET", "/api/roadmap?status=in-progress", None).await;
        assert_eq!(ids(&body), vec!["rm-2", "rm-7", "rm-5"]);

        let (status, _) = send(&app, "GET", "/api/roadmap?phase=someday", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_grouped() {
        let (_, body) = send(&app(), "GET", "/api/roadmap/grouped", None).await;
        let groups = body["groups"].as_array().unwrap();
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0]["phase"], "foundation");
        assert_eq!(groups[0]["doneCount"], 1);
        assert_eq!(groups[0]["totalCount"], 3);
    }

    #[tokio::test]
    async fn test_cycle_persists() {
        let app = app();
        let (status, body) = send(&app, "POST", "/api/roadmap/rm-1/cycle", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["item"]["status"], "not-started");
        assert_eq!(body["sync"], "synced");

        let (_, body) = send(&app, "POST", "/api/roadmap/reload", None).await;
        assert_eq!(body["source"], "live");
        let first = &body["items"][0];
        assert_eq!(first["id"], "rm-1");
        assert_eq!(first["status"], "not-started");
    }

    #[tokio::test]
    async fn test_create_and_update() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/roadmap",
            Some(json!({"title": "Analyst briefing", "phase": "scale", "priority": "P0"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["item"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["item"]["status"], "not-started");

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/roadmap/{}", id),
            Some(json!({"status": "done"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["item"]["status"], "done");
        assert_eq!(body["item"]["title"], "Analyst briefing");
    }

    #[tokio::test]
    async fn test_get_item() {
        let (status, body) = send(&app(), "GET", "/api/roadmap/rm-3", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "rm-3");
    }

    #[tokio::test]
    async fn test_blank_titles_are_rejected() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/roadmap",
            Some(json!({"title": "  ", "phase": "scale", "priority": "P1"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, _) = send(&app, "PUT", "/api/roadmap/rm-1", Some(json!({"title": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cycle_unknown_item() {
        let (status, body) = send(&app(), "POST", "/api/roadmap/nope/cycle", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }
}
