//! API-key gate for prediction routes

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::error::ServerError;
use super::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests whose `X-API-Key` does not match the configured key.
/// A server without a configured key rejects every protected request.
pub async fn api_key_layer(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(expected) = state.config.api_key.as_deref() else {
        tracing::warn!(path = %request.uri().path(), "rejected request, no API key configured");
        return Err(ServerError::Forbidden);
    };
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided != Some(expected) {
        tracing::debug!(path = %request.uri().path(), "rejected request with missing or invalid API key");
        return Err(ServerError::Forbidden);
    }
    Ok(next.run(request).await)
}
