use reqwest::Url;
use reqwest::header::{ACCEPT_ENCODING, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;
use crate::error::{GatewayError, TimeoutPhase};

const UPSTREAM_USER_AGENT: &str = "okhttp/4.12.0";
const API_KEY_HEADER: &str = "x-api-key";
const MAX_ERROR_BODY: usize = 1024;

// Everything needed to build the outbound client
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub user_id: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

// Client for the third-party download API.
// One GET per call, no retries. Failures come back already classified into
// the gateway error taxonomy.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: Url,
    user_id: String,
}

impl UpstreamClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, GatewayError> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| GatewayError::Internal(format!("invalid upstream url: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(UPSTREAM_USER_AGENT));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        if let Some(key) = &settings.api_key {
            let mut value = HeaderValue::from_str(key)
                .map_err(|_| GatewayError::Internal("api key is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            user_id: settings.user_id.clone(),
        })
    }

    // target url goes percent-encoded into the `url` query parameter
    fn request_url(&self, target: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("url", target)
            .append_pair("user_id", &self.user_id);
        url
    }

    pub async fn fetch(&self, target: &str) -> Result<Value, GatewayError> {
        let res = self
            .client
            .get(self.request_url(target))
            .send()
            .await
            .map_err(classify)?;

        let status = res.status();
        let body = res.bytes().await.map_err(classify)?;

        if !status.is_success() {
            let (message, upstream_body) = describe_error_body(&body);
            return Err(GatewayError::UpstreamStatus {
                status: status.as_u16(),
                message,
                body: upstream_body,
            });
        }

        serde_json::from_slice(&body).map_err(|e| GatewayError::UpstreamMalformed(e.to_string()))
    }
}

fn classify(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        let phase = if err.is_connect() {
            TimeoutPhase::Connect
        } else {
            TimeoutPhase::Read
        };
        return GatewayError::UpstreamTimeout(phase);
    }
    // a request we failed to build is our fault; anything else happened on the wire
    if err.is_builder() {
        return GatewayError::Internal(err.without_url().to_string());
    }
    GatewayError::UpstreamTransport(err.without_url().to_string())
}

// Pull a readable message out of an error body; keep the body as JSON when it
// parses and fits in MAX_ERROR_BODY, otherwise echo a truncated string
fn describe_error_body(body: &[u8]) -> (String, Value) {
    if let Ok(json) = serde_json::from_slice::<Value>(body) {
        let serialized = json.to_string();
        let message = ["message", "error", "detail"]
            .iter()
            .find_map(|field| json.get(*field).and_then(Value::as_str))
            .map(truncate)
            .unwrap_or_else(|| truncate(&serialized));
        if serialized.len() > MAX_ERROR_BODY {
            return (message, Value::String(truncate(&serialized)));
        }
        return (message, json);
    }
    let text = truncate(&String::from_utf8_lossy(body));
    (text.clone(), Value::String(text))
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_ERROR_BODY {
        return text.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
