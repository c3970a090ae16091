//! Synthesis API Tests
//!
//! Drives `POST /api/tts` through the router with a stub engine and stub
//! mastering, checking responses, metrics accounting and scratch file cleanup.

mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use fixtures::{CopyMastering, FailingMastering, STUB_WAV, StubEngine, StubLoader, test_state};
use xtts_gateway::{AppState, routes};

fn router(state: Arc<AppState>) -> Router {
    routes::api::create_api_router().with_state(state)
}

fn tts_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/tts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_empty_text_is_rejected() {
    let (state, _dir) = test_state(Arc::new(StubLoader::new()), Arc::new(CopyMastering::default()));

    let response = router(state.clone())
        .oneshot(tts_request(json!({ "text": "" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let header_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["error"], "No text provided");
    let request_id = body["request_id"].as_str().unwrap();
    assert_eq!(request_id.len(), 8);
    assert_eq!(request_id, header_id);

    let snapshot = state.metrics.snapshot();
    assert_eq!(snapshot.requests_total, 1);
    assert_eq!(snapshot.errors_total, 1);
    assert_eq!(snapshot.requests_inflight, 0);
}

#[tokio::test]
async fn test_whitespace_text_is_rejected() {
    let (state, _dir) = test_state(Arc::new(StubLoader::new()), Arc::new(CopyMastering::default()));

    let response = router(state.clone())
        .oneshot(tts_request(json!({ "text": "   \n\t" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.metrics.snapshot().errors_total, 1);
}

#[tokio::test]
async fn test_malformed_body_counts_as_missing_text() {
    let loader = Arc::new(StubLoader::new());
    let (state, _dir) = test_state(loader.clone(), Arc::new(CopyMastering::default()));

    let request = Request::builder()
        .method("POST")
        .uri("/api/tts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = router(state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "No text provided");

    let request = Request::builder()
        .method("POST")
        .uri("/api/tts")
        .body(Body::empty())
        .unwrap();
    let response = router(state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Validation happens before the engine is touched
    assert_eq!(loader.attempts(), 0);
    assert_eq!(state.metrics.snapshot().errors_total, 2);
}

#[tokio::test]
async fn test_wrong_field_type_is_rejected() {
    let loader = Arc::new(StubLoader::new());
    let (state, _dir) = test_state(loader.clone(), Arc::new(CopyMastering::default()));

    let response = router(state.clone())
        .oneshot(tts_request(json!({ "text": "hi", "speaker": ["kelly"] })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Invalid request body"), "{error}");
    assert_ne!(error, "No text provided");

    assert_eq!(loader.attempts(), 0);
    assert_eq!(state.metrics.snapshot().errors_total, 1);
}

#[tokio::test]
async fn test_unknown_speaker() {
    let (state, _dir) = test_state(Arc::new(StubLoader::new()), Arc::new(CopyMastering::default()));

    let response = router(state.clone())
        .oneshot(tts_request(json!({ "text": "hi", "speaker": "bob" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "reference wav not found for bob");
    assert!(!body["request_id"].as_str().unwrap().is_empty());
    assert_eq!(state.metrics.snapshot().errors_total, 1);
}

#[tokio::test]
async fn test_missing_reference_file() {
    let (state, _dir) = test_state(Arc::new(StubLoader::new()), Arc::new(CopyMastering::default()));

    // ken is configured but its clip is not on disk
    let response = router(state)
        .oneshot(tts_request(json!({ "text": "hi", "speaker": "ken" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "reference wav not found for ken");
}

#[tokio::test]
async fn test_successful_synthesis() {
    let loader = Arc::new(StubLoader::new());
    let mastering = Arc::new(CopyMastering::default());
    let (state, _dir) = test_state(loader.clone(), mastering.clone());

    let response = router(state.clone())
        .oneshot(tts_request(
            json!({ "text": "Hello there", "speaker": "kelly", "language": "en" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "audio/mpeg"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"kelly_speech.mp3\""
    );
    assert!(response.headers().contains_key("x-request-id"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], STUB_WAV);

    let snapshot = state.metrics.snapshot();
    assert_eq!(snapshot.requests_total, 1);
    assert_eq!(snapshot.errors_total, 0);
    assert_eq!(snapshot.requests_inflight, 0);
    assert_eq!(snapshot.requests_by_speaker.get("kelly"), Some(&1));
    assert_eq!(snapshot.latency_ms_count, 1);

    let requests = loader.engine.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].text, "Hello there");
    assert_eq!(requests[0].language, "en");

    // Scratch files are gone once the response is built
    let seen = mastering.seen.lock().clone();
    assert_eq!(seen.len(), 1);
    let (wav, mp3) = &seen[0];
    assert_eq!(wav.extension().unwrap(), "wav");
    assert_eq!(mp3.extension().unwrap(), "mp3");
    assert!(!wav.exists());
    assert!(!mp3.exists());
}

#[tokio::test]
async fn test_speaker_alias_and_case() {
    let (state, dir) = test_state(Arc::new(StubLoader::new()), Arc::new(CopyMastering::default()));
    std::fs::write(dir.path().join("reference_ken_mono16k.wav"), b"RIFF ken").unwrap();

    let response = router(state.clone())
        .oneshot(tts_request(
            json!({ "text": "hi", "speaker_id": " KEN ", "language_id": "DE" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"ken_speech.mp3\""
    );
    assert_eq!(
        state.metrics.snapshot().requests_by_speaker.get("ken"),
        Some(&1)
    );
}

#[tokio::test]
async fn test_mastering_failure_cleans_up() {
    let mastering = Arc::new(FailingMastering::default());
    let (state, _dir) = test_state(Arc::new(StubLoader::new()), mastering.clone());

    let response = router(state.clone())
        .oneshot(tts_request(json!({ "text": "hi" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("invalid filter"));

    let seen = mastering.seen.lock().clone();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].0.exists());
    assert!(!seen[0].1.exists());

    let snapshot = state.metrics.snapshot();
    assert_eq!(snapshot.errors_total, 1);
    assert!(snapshot.requests_by_speaker.is_empty());
}

#[tokio::test]
async fn test_synthesis_failure() {
    let loader = Arc::new(StubLoader::with_engine(StubEngine {
        fail: true,
        ..Default::default()
    }));
    let mastering = Arc::new(CopyMastering::default());
    let (state, _dir) = test_state(loader.clone(), mastering.clone());

    let response = router(state.clone())
        .oneshot(tts_request(json!({ "text": "hi" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("stub refused"));
    assert_eq!(state.metrics.snapshot().errors_total, 1);

    // Mastering never ran and the scratch wav was removed
    assert!(mastering.seen.lock().is_empty());
    let requests = loader.engine.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].output.extension().unwrap(), "wav");
    assert!(!requests[0].output.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abandoned_request_cleans_up() {
    let loader = Arc::new(StubLoader::with_engine(StubEngine::slow(
        Duration::from_millis(300),
    )));
    let mastering = Arc::new(CopyMastering::default());
    let (state, _dir) = test_state(loader.clone(), mastering.clone());

    // Client gives up while the engine is still writing
    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        router(state.clone()).oneshot(tts_request(json!({ "text": "hi" }))),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(600)).await;

    let requests = loader.engine.requests();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].output.exists());

    let seen = mastering.seen.lock().clone();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].0.exists());
    assert!(!seen[0].1.exists());

    let snapshot = state.metrics.snapshot();
    assert_eq!(snapshot.requests_total, 1);
    assert_eq!(snapshot.requests_inflight, 0);
}

#[tokio::test]
async fn test_construction_failure_is_retried() {
    let loader = Arc::new(StubLoader::new().failing_first(1));
    let (state, _dir) = test_state(loader.clone(), Arc::new(CopyMastering::default()));

    let response = router(state.clone())
        .oneshot(tts_request(json!({ "text": "hi" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!state.engine.is_ready());

    let response = router(state.clone())
        .oneshot(tts_request(json!({ "text": "hi" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.engine.is_ready());

    assert_eq!(loader.attempts(), 2);
    assert_eq!(state.engine.constructions(), 1);

    let snapshot = state.metrics.snapshot();
    assert_eq!(snapshot.requests_total, 2);
    assert_eq!(snapshot.errors_total, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_restore_inflight() {
    let loader = Arc::new(StubLoader::new().with_delay(Duration::from_millis(50)));
    let (state, _dir) = test_state(loader.clone(), Arc::new(CopyMastering::default()));

    let requests = 16;
    let mut handles = Vec::new();
    for i in 0..requests {
        let app = router(state.clone());
        // Every third request is invalid
        let body = if i % 3 == 0 {
            json!({ "text": "" })
        } else {
            json!({ "text": format!("sentence {i}") })
        };
        handles.push(tokio::spawn(async move {
            app.oneshot(tts_request(body)).await.unwrap().status()
        }));
    }

    let statuses = futures::future::join_all(handles).await;
    let failures = statuses
        .into_iter()
        .map(|status| status.unwrap())
        .filter(|status| !status.is_success())
        .count() as u64;

    let snapshot = state.metrics.snapshot();
    assert_eq!(snapshot.requests_total, requests);
    assert_eq!(snapshot.requests_inflight, 0);
    assert_eq!(snapshot.errors_total, failures);
    assert!(snapshot.errors_total <= snapshot.requests_total);
    assert_eq!(snapshot.latency_ms_count, requests);
    assert_eq!(state.engine.constructions(), 1);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (state, _dir) = test_state(Arc::new(StubLoader::new()), Arc::new(CopyMastering::default()));
    let app = router(state.clone());

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("tts_requests_total 0\n"));
    assert!(text.contains("tts_latency_ms_avg 0.00\n"));

    app.clone()
        .oneshot(tts_request(json!({ "text": "hi" })))
        .await
        .unwrap();
    app.clone()
        .oneshot(tts_request(json!({ "text": "" })))
        .await
        .unwrap();

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("tts_requests_total 2\n"));
    assert!(text.contains("tts_errors_total 1\n"));
    assert!(text.contains("tts_requests_inflight 0\n"));
    assert!(text.contains("tts_requests_by_speaker{speaker=\"kelly\"} 1\n"));
}
