use axum::http::{StatusCode, header::CONTENT_TYPE};
use axum::response::IntoResponse;
use prometheus::{Encoder, TextEncoder};

// Prometheus text exposition
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, [(CONTENT_TYPE, "text/plain")], Vec::new());
    }
    (StatusCode::OK, [(CONTENT_TYPE, prometheus::TEXT_FORMAT)], buffer)
}
