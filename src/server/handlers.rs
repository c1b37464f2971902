//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::features::RawFeatures;
use crate::service::PredictionResult;
use crate::storage::{PredictionRecord, PredictionStore};

use super::error::{Result, ServerError};
use super::state::AppState;

/// Run a store call on the blocking pool
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn PredictionStore) -> crate::error::Result<T> + Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(ServerError::from)
}

// ============================================================================
// Predictions
// ============================================================================

/// Score one kick and queue it for logging
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RawFeatures>, JsonRejection>,
) -> Result<Json<PredictionResult>> {
    let Json(raw) = payload?;
    let service = state.service.as_ref().ok_or(ServerError::ModelNotLoaded)?;
    let result = service.predict(raw)?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

pub async fn list_predictions(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<PredictionRecord>>> {
    let records = with_store(&state, move |store| store.list(page.skip, page.limit)).await?;
    Ok(Json(records))
}

pub async fn get_prediction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<PredictionRecord>> {
    with_store(&state, move |store| store.get(id))
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Prediction {} not found", id)))
}

pub async fn delete_prediction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    if with_store(&state, move |store| store.delete(id)).await? {
        Ok(Json(json!({ "message": format!("Prediction {} deleted", id) })))
    } else {
        Err(ServerError::NotFound(format!("Prediction {} not found", id)))
    }
}

// ============================================================================
// Health
// ============================================================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let storage_reachable = with_store(&state, |store| store.ping()).await.is_ok();
    let uptime = Utc::now().signed_duration_since(state.started_at);
    let inference = state.service.as_ref().map(|s| s.engine().stats());
    Json(json!({
        "status": "healthy",
        "message": "API is running",
        "model_loaded": state.model_loaded(),
        "storage_reachable": storage_reachable,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime.num_seconds(),
        "inference": inference,
        "prediction_log": state.writer.stats(),
    }))
}

/// 200 when predictions can be served, 503 otherwise
pub async fn readiness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let storage_reachable = with_store(&state, |store| store.ping()).await.is_ok();
    let model_loaded = state.model_loaded();
    let ready = model_loaded && storage_reachable;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "ready": ready,
            "model_loaded": model_loaded,
            "storage_reachable": storage_reachable,
        })),
    )
}
