//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod contacts;
mod pipeline;
mod roadmap;

use crate::config::Settings;
use crate::error::AppError;
use crate::pipeline::types::TypeFilter;
use crate::state::SharedState;
use axum::{
    http::{header, Method},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// `?type=` filter shared by the board routes
#[derive(Debug, Default, Deserialize)]
pub struct TypeQuery {
    #[serde(rename = "type")]
    pub record_type: Option<String>,
}

impl TypeQuery {
    pub fn filter(&self) -> Result<TypeFilter, AppError> {
        TypeFilter::parse(self.record_type.as_deref()).map_err(AppError::BadRequest)
    }
}

/// `?background=true` hands the write to a background task instead of
/// waiting for its outcome
#[derive(Debug, Default, Deserialize)]
pub struct PersistQuery {
    #[serde(default)]
    pub background: bool,
}

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    // Build CORS layer
    let cors = build_cors_layer(settings);

    // Build tracing/logging layer
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Build middleware stack
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id();

    api_routes().layer(middleware).with_state(state)
}

/// Routes without middleware
fn api_routes() -> Router<SharedState> {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Funnels
        .route("/api/funnels", get(pipeline::list_funnels))
        .route("/api/normalize", post(pipeline::normalize_label))

        // Deal boards
        .route("/api/deals", get(pipeline::get_default_board))
        .route("/api/deals/{container}", get(pipeline::get_board))
        .route("/api/deals/{container}/summary", get(pipeline::get_summary))
        .route("/api/deals/{container}/reload", post(pipeline::reload_board))
        .route(
            "/api/deals/{container}/records",
            get(pipeline::records_by_type).post(pipeline::create_record),
        )
        .route("/api/deals/{container}/records/{id}", get(pipeline::get_record))
        .route("/api/deals/{container}/records/{id}/advance", post(pipeline::advance_record))
        .route("/api/deals/{container}/records/{id}/stage", put(pipeline::set_stage))
        .route("/api/deals/{container}/unsynced", get(pipeline::list_unsynced))
        .route("/api/deals/{container}/resync", post(pipeline::resync))

        // Contacts
        .route("/api/contacts", get(contacts::get_board).post(contacts::create_contact))
        .route("/api/contacts/summary", get(contacts::get_summary))
        .route("/api/contacts/unsynced", get(contacts::list_unsynced))
        .route("/api/contacts/resync", post(contacts::resync))
        .route("/api/contacts/{id}", get(contacts::get_contact))
        .route("/api/contacts/{id}/advance", post(contacts::advance_contact))
        .route("/api/contacts/{id}/stage", put(contacts::set_stage))

        // Roadmap
        .route("/api/roadmap", get(roadmap::list_items).post(roadmap::create_item))
        .route("/api/roadmap/grouped", get(roadmap::grouped_items))
        .route("/api/roadmap/reload", post(roadmap::reload_items))
        .route("/api/roadmap/{id}", get(roadmap::get_item).put(roadmap::update_item))
        .route("/api/roadmap/{id}/cycle", post(roadmap::cycle_item))
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };

    cors.allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running fine.",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}
