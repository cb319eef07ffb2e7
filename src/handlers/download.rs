use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, Uri};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use crate::error::{ApiError, GatewayError};
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::DownloadParams;
use crate::state::AppState;

// Peer IP, or the first X-Forwarded-For hop when the proxy in front is trusted
fn client_id(state: &AppState, peer: &SocketAddr, headers: &HeaderMap) -> String {
    if state.trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.ip().to_string()
}

// GET /?url=...&nocache=...
pub async fn download_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    uri: Uri,
    query: Result<Query<DownloadParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();

    let Query(params) = query
        .map_err(|e| GatewayError::InvalidInput(e.body_text()).at(uri.path()))?;

    let client = client_id(&state, &peer, &headers);
    let result = state
        .gateway
        .handle(&client, params.url.as_deref(), params.nocache)
        .await;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    result
        .map(|download| Json(download.into_body()))
        .map_err(|e| e.at(uri.path()))
}
