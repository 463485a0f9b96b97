//! HTTP Server & Routing Integration Tests
//! Test File: http_server_tests.rs

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use mediarisk_fusion::db::{decisions, init_tables, DecisionSink, SqliteDecisionStore};
use mediarisk_fusion::fusion::WeightTables;
use mediarisk_fusion::{build_router, AppState};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_app_state() -> AppState {
    AppState::new(WeightTables::default(), None, Duration::from_secs(5))
}

async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_tables(&pool).await.unwrap();
    pool
}

async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// TC-HTTP-001: Health endpoint reports module identity
#[tokio::test]
async fn tc_http_001_health_check() {
    let app = build_router(test_app_state());

    let (status, json) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "mediarisk-fusion");
    assert_eq!(json["pipelines"], json!(["image", "video", "audio"]));
    assert!(json.get("last_error").is_none());
}

/// TC-HTTP-002: Weight tables are exposed per pipeline
#[tokio::test]
async fn tc_http_002_weights() {
    let app = build_router(test_app_state());

    let (status, json) = get_json(app.clone(), "/weights").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["image"]["transformer"], 0.35);
    assert_eq!(json["audio"]["local_audio"], 1.0);

    let (status, json) = get_json(app.clone(), "/weights/video").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["local_temporal"], 0.35);

    let (status, _) = get_json(app, "/weights/hologram").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

/// TC-HTTP-003: Full image ensemble fuses to SUSPICIOUS / HIGH
#[tokio::test]
async fn tc_http_003_analyze_full_ensemble() {
    // Given: three image signals
    let app = build_router(test_app_state());
    let body = json!({
        "signals": [
            {"modality": "remote_api", "risk_score": 62.0},
            {"modality": "transformer", "risk_score": 71.0},
            {"modality": "local_ensemble", "risk_score": 58.0}
        ]
    });

    // When: POST /analyze/image
    let (status, json) = post_json(app, "/analyze/image", body).await;

    // Then: weighted aggregate with high confidence
    assert_eq!(status, StatusCode::OK);
    let score = json["result"]["aggregate_score"].as_f64().unwrap();
    assert!((score - 63.75).abs() < 1e-9);
    assert_eq!(json["result"]["classification"], "SUSPICIOUS");
    assert_eq!(json["result"]["confidence"], "HIGH");
    assert_eq!(json["pipeline"], "image");
    assert!(json["analysis_id"].is_string());
    assert!(json["failures"].as_array().unwrap().is_empty());
}

/// TC-HTTP-004: A single signal with reported failures is MEDIUM confidence
#[tokio::test]
async fn tc_http_004_single_signal_with_failures() {
    let app = build_router(test_app_state());
    let body = json!({
        "signals": [{"modality": "transformer", "fake_probability": 0.8}],
        "failures": [
            {"modality": "remote_api", "reason": "HTTP 429"},
            {"modality": "local_ensemble", "reason": "model not loaded"}
        ]
    });

    let (status, json) = post_json(app, "/analyze/image", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"]["classification"], "MANIPULATED");
    assert_eq!(json["result"]["confidence"], "MEDIUM");
    assert_eq!(json["result"]["contributing_signals"], json!({"transformer": 80.0}));
    assert_eq!(json["failures"][0]["kind"], "failed");
    assert_eq!(json["failures"].as_array().unwrap().len(), 2);
    let fake = json["prediction"]["fake_probability"].as_f64().unwrap();
    assert!((fake - 0.8).abs() < 1e-9);
}

/// TC-HTTP-005: No usable signal is 503 NO_SIGNALS and shows up in health
#[tokio::test]
async fn tc_http_005_no_signals() {
    let state = test_app_state();
    let app = build_router(state.clone());
    let body = json!({
        "signals": [{"modality": "remote_api", "available": false}]
    });

    let (status, json) = post_json(app.clone(), "/analyze/image", body).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "NO_SIGNALS");

    let (_, health) = get_json(app, "/health").await;
    assert!(health["last_error"].as_str().unwrap().contains("No signals"));
}

/// TC-HTTP-006: Modality from another pipeline is rejected
#[tokio::test]
async fn tc_http_006_unknown_modality() {
    let app = build_router(test_app_state());
    let body = json!({
        "signals": [{"modality": "local_temporal", "risk_score": 50.0}]
    });

    let (status, json) = post_json(app, "/analyze/image", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "UNKNOWN_MODALITY");
}

/// TC-HTTP-007: Duplicate modality and unknown pipeline are bad requests
#[tokio::test]
async fn tc_http_007_bad_requests() {
    let app = build_router(test_app_state());

    let duplicate = json!({
        "signals": [
            {"modality": "local_audio", "risk_score": 10.0},
            {"modality": "local_audio", "risk_score": 90.0}
        ]
    });
    let (status, json) = post_json(app.clone(), "/analyze/audio", duplicate).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "DUPLICATE_MODALITY");

    let (status, json) = post_json(app, "/analyze/hologram", json!({"signals": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

/// TC-HTTP-008: Frame sequences go through temporal aggregation (max)
#[tokio::test]
async fn tc_http_008_frames_use_max() {
    let app = build_router(test_app_state());
    let body = json!({
        "frames": {"local_temporal": [10.0, 85.0, 20.0, 15.0]},
        "signals": [{"modality": "transformer", "risk_score": 85.0}]
    });

    let (status, json) = post_json(app, "/analyze/video/frames", body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["result"]["contributing_signals"]["local_temporal"], 85.0);
    let score = json["result"]["aggregate_score"].as_f64().unwrap();
    assert!((score - 85.0).abs() < 1e-9);
    assert_eq!(json["result"]["classification"], "MANIPULATED");
    assert_eq!(json["result"]["confidence"], "HIGH");
}

/// TC-HTTP-009: Empty frame sequence is a bad request
#[tokio::test]
async fn tc_http_009_empty_frames() {
    let app = build_router(test_app_state());
    let body = json!({"frames": {"local_temporal": []}});

    let (status, json) = post_json(app, "/analyze/video/frames", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "EMPTY_FRAME_SEQUENCE");
}

/// TC-HTTP-010: Liveness at standard and banking_kyc levels
#[tokio::test]
async fn tc_http_010_liveness_levels() {
    let app = build_router(test_app_state());
    let scores = json!({"texture": 0.1, "blur": 0.9, "color": 0.8, "moire": 0.9});

    let (status, json) = post_json(
        app.clone(),
        "/liveness",
        json!({"face_detected": true, "face_confidence": 0.9, "scores": scores}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["is_live"], true);
    assert_eq!(json["decision"], "LIVE");
    assert_eq!(json["security_level"], "standard");
    assert_eq!(json["confidence_level"], "HIGH");
    assert!((json["fused_score"].as_f64().unwrap() - 0.6615).abs() < 1e-9);
    assert!(json["attack_type"].is_null());

    let (status, json) = post_json(
        app,
        "/liveness",
        json!({
            "face_detected": true,
            "face_confidence": 0.9,
            "scores": scores,
            "security_level": "BANKING_KYC"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["is_live"], false);
    assert_eq!(json["decision"], "SPOOF_DETECTED");
    assert_eq!(json["attack_type"], "print");
    assert_eq!(json["threshold"], 0.8);
}

/// TC-HTTP-011: No face short-circuits; statistics are accepted
#[tokio::test]
async fn tc_http_011_liveness_no_face_and_statistics() {
    let app = build_router(test_app_state());

    let (status, json) =
        post_json(app.clone(), "/liveness", json!({"face_detected": false})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["decision"], "NO_FACE_DETECTED");
    assert_eq!(json["confidence_level"], "NONE");
    assert_eq!(json["is_live"], false);

    let (status, json) = post_json(
        app,
        "/liveness",
        json!({
            "face_detected": true,
            "statistics": {
                "mean_local_variance": 500.0,
                "laplacian_variance": 300.0,
                "saturation_std": 50.0,
                "hue_std": 30.0,
                "frequency_peak_ratio": 0.0
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // Every sub-score 1.0, face 0.8 (cascade default): 0.9 + 0.08
    assert!((json["fused_score"].as_f64().unwrap() - 0.98).abs() < 1e-9);
    assert_eq!(json["confidence_level"], "VERY_HIGH");
}

/// TC-HTTP-012: Liveness input validation
#[tokio::test]
async fn tc_http_012_liveness_validation() {
    let app = build_router(test_app_state());

    let (status, json) = post_json(
        app.clone(),
        "/liveness",
        json!({"face_detected": false, "security_level": "paranoid"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "INVALID_INPUT");

    let (status, _) = post_json(app, "/liveness", json!({"face_detected": true})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// TC-HTTP-013: Decisions reach the configured store
#[tokio::test]
async fn tc_http_013_decisions_persisted() {
    let pool = memory_pool().await;
    let sink: Arc<dyn DecisionSink> = Arc::new(SqliteDecisionStore::new(pool.clone()));
    let state = AppState::new(WeightTables::default(), Some(sink), Duration::from_secs(5));
    let app = build_router(state);

    let (status, _) = post_json(
        app.clone(),
        "/analyze/audio",
        json!({"signals": [{"modality": "local_audio", "risk_score": 12.0}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(app, "/liveness", json!({"face_detected": false})).await;
    assert_eq!(status, StatusCode::OK);

    // Persistence runs in a detached task
    let mut stored = (0, 0);
    for _ in 0..50 {
        stored = (
            decisions::count_decisions(&pool).await.unwrap(),
            decisions::count_liveness_decisions(&pool).await.unwrap(),
        );
        if stored == (1, 1) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(stored, (1, 1));
}

/// TC-HTTP-014: Logits are calibrated; weights outside (0, 1] are rejected
#[tokio::test]
async fn tc_http_014_logits_and_weight_range() {
    let app = build_router(test_app_state());

    let (status, json) = post_json(
        app.clone(),
        "/analyze/audio",
        json!({"signals": [{"modality": "local_audio", "logits": [0.0, 0.0]}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!((json["result"]["aggregate_score"].as_f64().unwrap() - 50.0).abs() < 1e-9);

    let (status, json) = post_json(
        app,
        "/analyze/audio",
        json!({"signals": [{"modality": "local_audio", "risk_score": 40.0, "weight": 0.0}]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}
