use axum::Json;
use axum::extract::State;
use std::sync::Arc;
use crate::models::{CacheInfo, PingResponse, RateLimitInfo};
use crate::state::AppState;

// health handler
pub async fn ping_handler(State(state): State<Arc<AppState>>) -> Json<PingResponse> {
    let limiter = state.rate_limiter();
    let cache = state.cache();

    Json(PingResponse {
        status: "ok",
        message: "Media download gateway running",
        timestamp: chrono::Utc::now().to_rfc3339(),
        rate_limit: RateLimitInfo {
            limit: limiter.limit(),
            window_seconds: limiter.window_secs() as u64,
        },
        cache: CacheInfo {
            ttl_seconds: cache.ttl_secs() as u64,
            size: cache.len(),
        },
    })
}
