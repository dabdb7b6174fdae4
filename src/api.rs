// src/api.rs
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::error;

use crate::aggregate::Aggregator;
use crate::update::Update;

#[derive(Clone)]
pub struct AppState {
    aggregator: Arc<Aggregator>,
}

impl AppState {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
        }
    }
}

/// Health + the aggregation endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/rescue-updates", get(rescue_updates))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Mount static descriptor files (OpenAPI etc.) under `/static`.
pub fn with_static_files(router: Router, dir: impl AsRef<Path>) -> Router {
    router.nest_service("/static", ServeDir::new(dir.as_ref()))
}

#[derive(Debug, Deserialize)]
pub struct UpdatesParams {
    query: String,
}

#[derive(Debug, Serialize)]
pub struct UpdatesResponse {
    pub updates: Vec<Update>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            ApiError::EmptyQuery => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Serialize(_) => {
                error!(error = %self, "rescue-updates failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": msg }))).into_response()
    }
}

async fn rescue_updates(
    State(state): State<AppState>,
    Query(params): Query<UpdatesParams>,
) -> Result<Response, ApiError> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(ApiError::EmptyQuery);
    }

    let updates = state.aggregator.aggregate(query).await;
    let body = serde_json::to_vec(&UpdatesResponse { updates })?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}
