pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod janitor;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod upstream;

use axum::http::{HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use crate::error::GatewayError;
use crate::state::AppState;

// Routes only, no middleware; handy for tests
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::download_handler))
        .route("/ping", get(handlers::ping_handler))
        .route("/stats", get(handlers::stats_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .fallback(handlers::fallback_handler)
        .with_state(state)
}

pub fn cors_layer(origins: &str) -> CorsLayer {
    let allow_origin = if origins.trim() == "*" {
        AllowOrigin::from(AnyOrigin)
    } else {
        let list: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();
        AllowOrigin::list(list)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
}

// the panic layer never sees the request, so the body carries no path
fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    GatewayError::Internal("handler panicked".into())
        .pathless()
        .into_response()
}

// Full application: routes plus tracing, panic and CORS layers
pub fn app(state: Arc<AppState>, cors_origins: &str) -> Router {
    routes(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn boom() -> &'static str {
        panic!("handler blew up")
    }

    #[tokio::test]
    async fn panicking_handler_renders_internal_error_without_path() {
        let app = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(panic_response));

        let response = app
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("path").is_none());
    }
}
