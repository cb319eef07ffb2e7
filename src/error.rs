use axum::Json;
use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Connect,
    Read,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::Connect => write!(f, "connect"),
            TimeoutPhase::Read => write!(f, "read"),
        }
    }
}

// Every failure a request can end in.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Rate limit exceeded. Try again in {retry_after} seconds.")]
    Throttled { retry_after: u64 },

    #[error("Upstream API timed out ({0} phase)")]
    UpstreamTimeout(TimeoutPhase),

    #[error("External API error: {message}")]
    UpstreamStatus {
        status: u16,
        message: String,
        body: Value,
    },

    #[error("Could not reach upstream API: {0}")]
    UpstreamTransport(String),

    #[error("Upstream API returned an unreadable response: {0}")]
    UpstreamMalformed(String),

    #[error("Not Found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::UpstreamStatus { .. }
            | GatewayError::UpstreamTransport(_)
            | GatewayError::UpstreamMalformed(_) => StatusCode::BAD_GATEWAY,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidInput(_) => "invalid_input",
            GatewayError::Throttled { .. } => "throttled",
            GatewayError::UpstreamTimeout(_) => "upstream_timeout",
            GatewayError::UpstreamStatus { .. } => "upstream_status_error",
            GatewayError::UpstreamTransport(_) => "upstream_transport_error",
            GatewayError::UpstreamMalformed(_) => "upstream_malformed_response",
            GatewayError::NotFound => "not_found",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    // Attach the request path, producing something axum can render
    pub fn at(self, path: impl Into<String>) -> ApiError {
        ApiError {
            error: self,
            path: Some(path.into()),
        }
    }

    // For failures raised outside routing, where the path is unknown
    pub fn pathless(self) -> ApiError {
        ApiError {
            error: self,
            path: None,
        }
    }
}

// JSON error body
#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'static str,
    message: String,
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream_body: Option<&'a Value>,
}

// A `GatewayError` bound to the path it happened on, if known
#[derive(Debug)]
pub struct ApiError {
    pub error: GatewayError,
    pub path: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();

        // internal details stay in the logs
        let message = match &self.error {
            GatewayError::Internal(detail) => {
                tracing::error!(path = ?self.path, detail = %detail, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let (retry_after, upstream_status, upstream_body) = match &self.error {
            GatewayError::Throttled { retry_after } => (Some(*retry_after), None, None),
            GatewayError::UpstreamStatus { status, body, .. } => (None, Some(*status), Some(body)),
            _ => (None, None, None),
        };

        let body = ErrorBody {
            error: self.error.code(),
            message,
            status_code: status.as_u16(),
            path: self.path.as_deref(),
            retry_after,
            upstream_status,
            upstream_body,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn render(err: GatewayError) -> (StatusCode, Option<String>, Value) {
        render_api(err.at("/")).await
    }

    async fn render_api(err: ApiError) -> (StatusCode, Option<String>, Value) {
        let response = err.into_response();
        let status = response.status();
        let retry = response
            .headers()
            .get(RETRY_AFTER)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, retry, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn throttled_carries_retry_after() {
        let (status, header, body) = render(GatewayError::Throttled { retry_after: 58 }).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(header.as_deref(), Some("58"));
        assert_eq!(body["error"], "throttled");
        assert_eq!(body["retry_after"], 58);
        assert_eq!(body["status_code"], 429);
        assert_eq!(body["path"], "/");
    }

    #[tokio::test]
    async fn upstream_status_carries_status_and_body() {
        let (status, _, body) = render(GatewayError::UpstreamStatus {
            status: 403,
            message: "bad key".into(),
            body: json!({"error": "bad key"}),
        })
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "upstream_status_error");
        assert_eq!(body["upstream_status"], 403);
        assert_eq!(body["upstream_body"], json!({"error": "bad key"}));
        assert_eq!(body["message"], "External API error: bad key");
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let (status, _, body) = render(GatewayError::Internal("db password=x".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("retry_after").is_none());
    }

    #[tokio::test]
    async fn pathless_errors_omit_path() {
        let (status, _, body) = render_api(GatewayError::Internal("x".into()).pathless()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.get("path").is_none());
        assert_eq!(body["error"], "internal_error");
    }

    #[test]
    fn status_table() {
        assert_eq!(GatewayError::InvalidInput("x".into()).status_code(), 400);
        assert_eq!(GatewayError::UpstreamTimeout(TimeoutPhase::Read).status_code(), 504);
        assert_eq!(GatewayError::UpstreamTransport("x".into()).status_code(), 502);
        assert_eq!(GatewayError::UpstreamMalformed("x".into()).status_code(), 502);
        assert_eq!(GatewayError::NotFound.status_code(), 404);
    }
}
