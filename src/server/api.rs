//! API route definitions

use std::sync::Arc;
use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::monitoring::{profiling_layer, ProfilingInterceptor};

use super::{auth::api_key_layer, handlers, state::AppState};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": "Not found. Check /api/v1/health for API status.",
        })),
    )
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    match origin {
        Some(origin) if !origin.is_empty() && origin != "*" => match origin.parse::<axum::http::HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin(value)
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                tracing::warn!(origin, "invalid CORS_ORIGIN, allowing any origin");
                CorsLayer::permissive()
            }
        },
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/predict", post(handlers::predict))
        .route("/predictions", get(handlers::list_predictions))
        .route(
            "/predictions/:id",
            get(handlers::get_prediction).delete(handlers::delete_prediction),
        )
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), api_key_layer));

    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness))
        .merge(protected);

    let prefix = state.config.api_prefix.trim_end_matches('/');
    let app = if prefix.is_empty() {
        api_routes
    } else {
        Router::new()
            .nest(prefix, api_routes)
            .route("/health", get(handlers::health_check))
    };

    let interceptor = ProfilingInterceptor::new(state.config.profiling.clone());
    let cors = cors_layer(state.config.cors_origin.as_deref());

    app.fallback(handle_404)
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(interceptor, profiling_layer))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
