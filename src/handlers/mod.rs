mod download;
mod metrics;
mod ping;
mod stats;

use axum::http::Uri;
use crate::error::{ApiError, GatewayError};

pub use download::download_handler;
pub use metrics::metrics_handler;
pub use ping::ping_handler;
pub use stats::stats_handler;

// unknown routes get the same JSON error shape
pub async fn fallback_handler(uri: Uri) -> ApiError {
    GatewayError::NotFound.at(uri.path())
}
