//! Integration test: Server API endpoints

mod common;

use axum::http::StatusCode;
use kickwatch::monitoring::ProfilingConfig;
use kickwatch::storage::PredictionStore;
use serde_json::json;
use tower::ServiceExt;

use common::{body_json, delete, get, kick, post_json, test_app, API_KEY};

fn no_profiling() -> ProfilingConfig {
    ProfilingConfig::disabled()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app(Some(API_KEY), no_profiling(), true);
    let response = app.router.clone().oneshot(get("/api/v1/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["storage_reachable"], true);
    assert!(body["uptime_seconds"].as_i64().unwrap() >= 0);
    assert_eq!(body["inference"]["total_predictions"], 0);
    assert_eq!(body["prediction_log"]["written"], 0);
}

#[tokio::test]
async fn test_health_reports_counters() {
    let app = test_app(Some(API_KEY), no_profiling(), true);
    for distance in [20.0, 30.0] {
        app.router
            .clone()
            .oneshot(post_json("/api/v1/predict", Some(API_KEY), &kick(distance)))
            .await
            .unwrap();
    }
    app.flush().await;

    let response = app.router.clone().oneshot(get("/api/v1/health", None)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["inference"]["total_predictions"], 2);
    assert_eq!(body["prediction_log"]["enqueued"], 2);
    assert_eq!(body["prediction_log"]["written"], 2);
}

#[tokio::test]
async fn test_root_health_alias() {
    let app = test_app(None, no_profiling(), true);
    let response = app.router.clone().oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_predict_returns_probability_and_logs() {
    let app = test_app(Some(API_KEY), no_profiling(), true);
    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/v1/predict", Some(API_KEY), &kick(25.0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let p = body["prediction"].as_f64().unwrap();
    let c = body["confidence"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&p));
    assert_eq!(c, p.max(1.0 - p));

    app.flush().await;
    let records = app.store.list(0, 10).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].prediction, Some(p));
    assert_eq!(records[0].status_code, 200);
    assert_eq!(records[0].features.distance(), 25.0);
    assert!(records[0].features.game_away());
}

#[tokio::test]
async fn test_predict_out_of_range_is_422_and_not_logged() {
    let app = test_app(Some(API_KEY), no_profiling(), true);
    for distance in [1.0, 100.5] {
        let response = app
            .router
            .clone()
            .oneshot(post_json("/api/v1/predict", Some(API_KEY), &kick(distance)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"], true);
    }

    app.flush().await;
    assert_eq!(app.store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_predict_boundaries_accepted() {
    let app = test_app(Some(API_KEY), no_profiling(), true);
    for distance in [2.0, 100.0] {
        let response = app
            .router
            .clone()
            .oneshot(post_json("/api/v1/predict", Some(API_KEY), &kick(distance)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_predict_bad_payloads_are_422() {
    let app = test_app(Some(API_KEY), no_profiling(), true);

    let mut bad_flag = kick(30.0);
    bad_flag["is_start"] = json!(2);
    let mut missing = kick(30.0);
    missing.as_object_mut().unwrap().remove("angle");
    let mut wrong_type = kick(30.0);
    wrong_type["wind_speed"] = json!("calm");

    for body in [bad_flag, missing, wrong_type] {
        let response = app
            .router
            .clone()
            .oneshot(post_json("/api/v1/predict", Some(API_KEY), &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "body: {}", body);
    }
}

#[tokio::test]
async fn test_api_key_required() {
    let app = test_app(Some(API_KEY), no_profiling(), true);

    let missing = app
        .router
        .clone()
        .oneshot(post_json("/api/v1/predict", None, &kick(30.0)))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::FORBIDDEN);

    let wrong = app
        .router
        .clone()
        .oneshot(get("/api/v1/predictions", Some("nope")))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

    app.flush().await;
    assert_eq!(app.store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_unset_api_key_rejects_protected_routes() {
    let app = test_app(None, no_profiling(), true);

    for request in [
        post_json("/api/v1/predict", None, &kick(30.0)),
        post_json("/api/v1/predict", Some("anything"), &kick(30.0)),
        get("/api/v1/predictions", None),
        delete("/api/v1/predictions/1", Some("anything")),
    ] {
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    let response = app.router.clone().oneshot(get("/api/v1/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    app.flush().await;
    assert_eq!(app.store.count().unwrap(), 0);
}

#[tokio::test]
async fn test_list_get_delete_predictions() {
    let app = test_app(Some(API_KEY), no_profiling(), true);
    for distance in [20.0, 35.0, 50.0] {
        let response = app
            .router
            .clone()
            .oneshot(post_json("/api/v1/predict", Some(API_KEY), &kick(distance)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    app.flush().await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/predictions?skip=1&limit=1", Some(API_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    let page = page.as_array().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["id"], 2);
    assert_eq!(page[0]["distance"], 35.0);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/v1/predictions/1", Some(API_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], 1);

    let response = app
        .router
        .clone()
        .oneshot(delete("/api/v1/predictions/1", Some(API_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["message"].is_string());

    for request in [
        get("/api/v1/predictions/1", Some(API_KEY)),
        delete("/api/v1/predictions/1", Some(API_KEY)),
    ] {
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
    assert_eq!(app.store.count().unwrap(), 2);
}

#[tokio::test]
async fn test_model_not_loaded() {
    let app = test_app(Some(API_KEY), no_profiling(), false);

    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/v1/predict", Some(API_KEY), &kick(30.0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app.router.clone().oneshot(get("/api/v1/ready", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["model_loaded"], false);

    let response = app.router.clone().oneshot(get("/api/v1/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_ready_when_model_loaded() {
    let app = test_app(None, no_profiling(), true);
    let response = app.router.clone().oneshot(get("/api/v1/ready", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ready"], true);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = test_app(None, no_profiling(), true);
    let response = app.router.clone().oneshot(get("/api/v1/nope", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profiled_requests_write_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let profiling = ProfilingConfig::default()
        .with_enabled(true)
        .with_include_prefix(Some("/api".to_string()))
        .with_exclude_paths(vec!["/api/v1/health".to_string()])
        .with_profiles_dir(dir.path());
    let app = test_app(Some(API_KEY), profiling, true);

    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/v1/predict", Some(API_KEY), &kick(40.0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-process-time"));

    let response = app.router.clone().oneshot(get("/api/v1/health", None)).await.unwrap();
    assert!(!response.headers().contains_key("x-process-time"));

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("api_v1_predict_"));
    assert!(names[0].ends_with(".prof"));

    let artifact: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.path().join(&names[0])).unwrap()).unwrap();
    assert_eq!(artifact["outcome"], "completed");
    assert_eq!(artifact["status"], 200);
    assert_eq!(artifact["method"], "POST");
}

#[tokio::test]
async fn test_server_error_is_profiled_as_failed() {
    let dir = tempfile::tempdir().unwrap();
    let profiling = ProfilingConfig::default()
        .with_enabled(true)
        .with_include_prefix(Some("/api".to_string()))
        .with_profiles_dir(dir.path());
    let app = test_app(Some(API_KEY), profiling, false);

    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/v1/predict", Some(API_KEY), &kick(30.0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
    let artifact: serde_json::Value =
        serde_json::from_slice(&std::fs::read(entries[0].as_ref().unwrap().path()).unwrap()).unwrap();
    assert_eq!(artifact["outcome"], "failed");
    assert_eq!(artifact["status"], 503);
}
