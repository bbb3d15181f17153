//! Runs the real router on a loopback port with a scripted engine and talks
//! to it over HTTP, exactly as the `ocr-client` binary does.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::*;
use metrics_exporter_prometheus::PrometheusBuilder;
use ocr_dispatch::app_state::AppState;
use ocr_dispatch::models::batch::{ResultDisposition, SlotState};
use ocr_dispatch::models::recognition::RecognizeResponse;
use ocr_dispatch::routes;
use ocr_dispatch::services::batch_tracker::BatchTracker;
use ocr_dispatch::services::client::HttpJobSink;
use reqwest::multipart;
use tokio::sync::mpsc;

/// Start the service on an ephemeral port and return its base URL.
async fn spawn_server(workers: usize) -> String {
    let probe = Arc::new(EngineProbe::default());
    let state = AppState::new(pool(workers, scripted_factory(&probe)));
    let prometheus = Arc::new(PrometheusBuilder::new().build_recorder().handle());
    let app = routes::router(state, prometheus, 1024 * 1024);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server error");
    });

    format!("http://{}", addr)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_health_reports_pool_shape() {
    let base_url = spawn_server(3).await;

    let response = reqwest::get(format!("{}/health", base_url)).await.unwrap();
    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["workers"], 3);
    assert_eq!(body["queue_depth"], 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_recognize_endpoint_round_trip() {
    let base_url = spawn_server(2).await;

    let form = multipart::Form::new()
        .text("batch_id", "4")
        .text("image_index", "2")
        .text("filename", "receipt.png")
        .part("image", multipart::Part::bytes(payload("TOTAL 12.50", 5)));

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/recognize", base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let body: RecognizeResponse = response.json().await.unwrap();
    assert_eq!(body.batch_id, 4);
    assert_eq!(body.image_index, 2);
    assert_eq!(body.filename, "receipt.png");
    assert_eq!(body.text, "TOTAL 12.50");
    assert!(body.success);
    assert!(body.processing_time_ms >= 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_recognize_rejects_missing_image() {
    let base_url = spawn_server(1).await;

    let form = multipart::Form::new()
        .text("batch_id", "1")
        .text("image_index", "0")
        .text("filename", "nothing.png");

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/recognize", base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_recognize_rejects_invalid_fields() {
    let base_url = spawn_server(1).await;

    let form = multipart::Form::new()
        .text("batch_id", "1")
        .text("image_index", "-3")
        .text("filename", "")
        .part("image", multipart::Part::bytes(payload("x", 0)));

    let response = reqwest::Client::new()
        .post(format!("{}/api/v1/recognize", base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tracker_over_http() {
    let base_url = spawn_server(2).await;
    let (results_tx, mut results_rx) = mpsc::unbounded_channel();
    let sink = HttpJobSink::new(&base_url, results_tx).unwrap();
    let mut tracker = BatchTracker::new(sink);

    tracker.submit("slow.png", payload("slow", 60));
    tracker.submit("fast.png", payload("fast", 1));
    tracker.submit("broken.png", payload(FAIL, 1));

    while !tracker.is_complete() {
        let result = tokio::time::timeout(Duration::from_secs(10), results_rx.recv())
            .await
            .expect("results should arrive")
            .unwrap();
        assert_eq!(tracker.on_result(result), ResultDisposition::Accepted);
    }

    assert!(matches!(&tracker.slot(0).unwrap().state, SlotState::Succeeded { text, .. } if text == "slow"));
    assert!(matches!(&tracker.slot(1).unwrap().state, SlotState::Succeeded { text, .. } if text == "fast"));
    assert!(matches!(&tracker.slot(2).unwrap().state, SlotState::Failed { .. }));
}

#[tokio::test]
async fn test_unreachable_server_becomes_failed_slot() {
    let (results_tx, mut results_rx) = mpsc::unbounded_channel();
    // Port 9 (discard) on loopback: nothing listens there in CI.
    let sink = HttpJobSink::new("http://127.0.0.1:9", results_tx).unwrap();
    let mut tracker = BatchTracker::new(sink);

    tracker.submit("lost.png", tiny_png());

    let result = tokio::time::timeout(Duration::from_secs(10), results_rx.recv())
        .await
        .expect("transport failure should be reported")
        .unwrap();
    assert!(!result.ok);
    assert!(!result.error_message.is_empty());

    assert_eq!(tracker.on_result(result), ResultDisposition::Accepted);
    assert!(matches!(&tracker.slot(0).unwrap().state, SlotState::Failed { .. }));
}
