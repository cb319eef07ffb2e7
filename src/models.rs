use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};

// Query parameters for GET /
#[derive(Deserialize, Debug, Default)]
pub struct DownloadParams {
    pub url: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub nocache: bool,
}

// accepts true/false, 1/0, yes/no, on/off
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(de::Error::custom(format!(
            "invalid boolean value for nocache: {:?}",
            other
        ))),
    }
}

// `_cache` object attached to every successful download
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CacheMeta {
    pub hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<u64>,
    pub ttl_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored: Option<bool>,
}

// What the gateway hands back for one successful request
#[derive(Debug, Clone)]
pub struct Download {
    pub payload: Value,
    pub cache: CacheMeta,
}

impl Download {
    // Objects get `_cache` inserted; anything else is wrapped under `data`
    pub fn into_body(self) -> Value {
        let meta = serde_json::to_value(&self.cache).unwrap_or(Value::Null);
        match self.payload {
            Value::Object(mut map) => {
                map.insert("_cache".to_string(), meta);
                Value::Object(map)
            }
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map.insert("_cache".to_string(), meta);
                Value::Object(map)
            }
        }
    }
}

#[derive(Serialize)]
pub struct RateLimitInfo {
    pub limit: usize,
    pub window_seconds: u64,
}

#[derive(Serialize)]
pub struct CacheInfo {
    pub ttl_seconds: u64,
    pub size: usize,
}

// GET /ping
#[derive(Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
    pub rate_limit: RateLimitInfo,
    pub cache: CacheInfo,
}

// GET /stats
#[derive(Serialize)]
pub struct StatsResponse {
    pub active_clients: usize,
    pub recent_requests: usize,
    pub cache_items: usize,
    pub oldest_cache_timestamp: Option<f64>,
    pub oldest_cache_entry: Option<String>,
    pub uptime_seconds: u64,
}
