use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// GET /metrics — Prometheus text exposition of the pool counters.
pub async fn prometheus_metrics(
    State(handle): State<Arc<PrometheusHandle>>,
) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for everything the worker pool records.
pub fn describe() {
    metrics::describe_counter!("ocr_jobs_submitted_total", "Total recognition jobs submitted");
    metrics::describe_counter!("ocr_jobs_completed_total", "Total recognition jobs that succeeded");
    metrics::describe_counter!("ocr_jobs_failed_total", "Total recognition jobs that failed");
    metrics::describe_histogram!(
        "ocr_processing_seconds",
        "Time spent inside the recognition engine per job"
    );
    metrics::describe_gauge!("ocr_queue_depth", "Jobs waiting for a free worker");
}
