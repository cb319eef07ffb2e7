use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use crate::models::StatsResponse;
use crate::state::AppState;

fn to_rfc3339(epoch_secs: f64) -> Option<String> {
    let secs = epoch_secs.floor();
    let nanos = ((epoch_secs - secs) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(secs as i64, nanos).map(|t| t.to_rfc3339())
}

// GET /stats
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let snapshot = state.rate_limiter().snapshot();
    let cache = state.cache();
    let oldest = cache.oldest_stored_at();

    Json(StatsResponse {
        active_clients: snapshot.active_clients,
        recent_requests: snapshot.recent_requests,
        cache_items: cache.len(),
        oldest_cache_timestamp: oldest,
        oldest_cache_entry: oldest.and_then(to_rfc3339),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
