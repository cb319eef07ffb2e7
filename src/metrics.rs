use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec, register_gauge,
    register_histogram,
};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("media_gateway_requests_total", "Total number of download requests").unwrap();
    pub static ref THROTTLED_TOTAL: Counter =
        register_counter!("media_gateway_throttled_total", "Requests rejected by the rate limiter").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("media_gateway_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("media_gateway_cache_misses_total", "Total cache misses").unwrap();
    pub static ref UPSTREAM_ERRORS: CounterVec = register_counter_vec!(
        "media_gateway_upstream_errors_total",
        "Failed upstream calls by error kind",
        &["kind"]
    )
    .unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "media_gateway_request_latency_seconds",
        "Download request latency in seconds"
    )
    .unwrap();
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("media_gateway_cache_size", "Current number of items in cache").unwrap();
    pub static ref ACTIVE_CLIENTS: Gauge =
        register_gauge!("media_gateway_rate_limit_clients", "Clients tracked by the rate limiter").unwrap();
}
