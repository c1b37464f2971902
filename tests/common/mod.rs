//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use serde_json::{json, Value};

use kickwatch::features::{Feature, FeatureVector, N_FEATURES};
use kickwatch::inference::{InferenceConfig, InferenceEngine, LogisticModel};
use kickwatch::monitoring::ProfilingConfig;
use kickwatch::server::{create_router, AppState, ServerConfig};
use kickwatch::service::{spawn_log_writer, AsyncLogWriter, LogWriterConfig, LogWriterHandle, PredictionService};
use kickwatch::storage::InMemoryStore;

pub const API_KEY: &str = "test-key";

/// Longer kicks are less likely to succeed
pub fn engine() -> Arc<InferenceEngine> {
    let mut coef = vec![0.0; N_FEATURES];
    coef[Feature::Distance.index()] = -0.06;
    coef[Feature::Angle.index()] = -0.02;
    coef[Feature::WindSpeed.index()] = -0.03;
    let model = LogisticModel::new(coef, 3.0).unwrap();
    Arc::new(InferenceEngine::new(InferenceConfig::default(), Arc::new(model)))
}

pub fn writer_config() -> LogWriterConfig {
    LogWriterConfig {
        queue_capacity: 256,
        shutdown_timeout_ms: 2000,
    }
}

pub fn kick(distance: f64) -> Value {
    json!({
        "time_norm": 0.5,
        "distance": distance,
        "angle": 25.0,
        "wind_speed": 8.0,
        "precipitation_probability": 0.2,
        "is_left_footed": false,
        "game_away": 1,
        "is_endgame": 0,
        "is_start": false,
        "is_left_side": 1,
        "has_previous_attempts": true
    })
}

/// Deterministic vector whose non-distance fields cycle with `i`
pub fn vector(i: usize, distance: f64) -> FeatureVector {
    let mut values = [0.0; N_FEATURES];
    values[Feature::TimeNorm.index()] = (i % 20) as f64 / 20.0;
    values[Feature::Distance.index()] = distance;
    values[Feature::Angle.index()] = (i % 90) as f64;
    values[Feature::WindSpeed.index()] = (i % 40) as f64;
    values[Feature::PrecipitationProbability.index()] = (i % 10) as f64 / 10.0;
    values[Feature::IsLeftFooted.index()] = (i % 2) as f64;
    values[Feature::GameAway.index()] = (i % 3 == 0) as u8 as f64;
    values[Feature::IsEndgame.index()] = (i % 4 == 0) as u8 as f64;
    values[Feature::IsStart.index()] = (i % 5 == 0) as u8 as f64;
    values[Feature::IsLeftSide.index()] = (i % 2 == 1) as u8 as f64;
    values[Feature::HasPreviousAttempts.index()] = (i % 7 < 3) as u8 as f64;
    FeatureVector::from_values(&values).unwrap()
}

pub struct TestApp {
    pub router: axum::Router,
    pub store: Arc<InMemoryStore>,
    pub writer: LogWriterHandle,
    _owner: AsyncLogWriter,
}

impl TestApp {
    pub async fn flush(&self) {
        self.writer.flush().await.unwrap();
    }
}

pub fn test_app(api_key: Option<&str>, profiling: ProfilingConfig, model_loaded: bool) -> TestApp {
    let config = ServerConfig::default()
        .with_api_prefix("/api/v1")
        .with_api_key(api_key.map(str::to_string));
    let config = ServerConfig { profiling, ..config };

    let store = Arc::new(InMemoryStore::new());
    let owner = spawn_log_writer(writer_config(), store.clone());
    let service = model_loaded.then(|| PredictionService::new(engine(), owner.handle()));
    let state = Arc::new(AppState::new(config, store.clone(), service, owner.handle()));

    TestApp {
        router: create_router(state),
        store,
        writer: owner.handle(),
        _owner: owner,
    }
}

pub fn get(uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn delete(uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, key: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
