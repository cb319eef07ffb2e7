use std::sync::Arc;
use crate::cache::{CacheKey, Lookup, ResponseCache};
use crate::error::GatewayError;
use crate::metrics::{ACTIVE_CLIENTS, CACHE_HITS, CACHE_MISSES, CACHE_SIZE, THROTTLED_TOTAL, UPSTREAM_ERRORS};
use crate::models::{CacheMeta, Download};
use crate::rate_limit::{Decision, RateLimiter};
use crate::upstream::UpstreamClient;

const SCHEMES: [&str; 2] = ["http://", "https://"];

// One download request, start to finish:
// validate, rate limit, cache lookup, upstream call, cache store.
pub struct Gateway {
    pub rate_limiter: Arc<RateLimiter>,
    pub cache: Arc<ResponseCache>,
    upstream: UpstreamClient,
}

// Trimmed URL with a recognised scheme and something after it
pub fn validate_url(url: Option<&str>) -> Result<&str, GatewayError> {
    let url = url.map(str::trim).unwrap_or_default();
    if url.is_empty() {
        return Err(GatewayError::InvalidInput("Missing 'url' parameter".into()));
    }

    let lower = url.to_ascii_lowercase();
    let rest = SCHEMES
        .iter()
        .find(|scheme| lower.starts_with(*scheme))
        .map(|scheme| &url[scheme.len()..]);

    match rest {
        Some(rest) if !rest.is_empty() => Ok(url),
        Some(_) => Err(GatewayError::InvalidInput("'url' has no host".into())),
        None => Err(GatewayError::InvalidInput(
            "'url' must start with http:// or https://".into(),
        )),
    }
}

impl Gateway {
    pub fn new(
        rate_limiter: Arc<RateLimiter>,
        cache: Arc<ResponseCache>,
        upstream: UpstreamClient,
    ) -> Self {
        Self {
            rate_limiter,
            cache,
            upstream,
        }
    }

    pub async fn handle(
        &self,
        client_id: &str,
        url: Option<&str>,
        bypass_cache: bool,
    ) -> Result<Download, GatewayError> {
        let url = validate_url(url)?;

        let decision = self.rate_limiter.check(client_id);
        ACTIVE_CLIENTS.set(self.rate_limiter.tracked_clients() as f64);
        if let Decision::Reject { retry_after } = decision {
            THROTTLED_TOTAL.inc();
            // round up so waiting the advertised time is always enough
            let retry_after = (retry_after.ceil() as u64).max(1);
            tracing::warn!(client = %client_id, retry_after, "rate limit exceeded");
            return Err(GatewayError::Throttled { retry_after });
        }

        let key = CacheKey::from_url(url);
        let ttl_seconds = self.cache.ttl_secs() as u64;

        if !bypass_cache {
            if let Lookup::Hit { payload, age } = self.cache.lookup(&key) {
                CACHE_HITS.inc();
                tracing::info!(key = %key.fingerprint(), age, "cache hit");
                return Ok(Download {
                    payload,
                    cache: CacheMeta {
                        hit: true,
                        age_seconds: Some(age.floor() as u64),
                        ttl_seconds,
                        stored: None,
                    },
                });
            }
        }
        CACHE_MISSES.inc();
        tracing::info!(key = %key.fingerprint(), bypass = bypass_cache, "cache miss, calling upstream");

        let payload = match self.upstream.fetch(url).await {
            Ok(payload) => payload,
            Err(e) => {
                UPSTREAM_ERRORS.with_label_values(&[e.code()]).inc();
                tracing::warn!(key = %key.fingerprint(), error = %e, "upstream call failed");
                return Err(e);
            }
        };

        self.cache.store(key, payload.clone());
        CACHE_SIZE.set(self.cache.len() as f64);

        Ok(Download {
            payload,
            cache: CacheMeta {
                hit: false,
                age_seconds: None,
                ttl_seconds,
                stored: Some(true),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::upstream::UpstreamSettings;
    use serde_json::json;
    use std::time::Duration;

    // port 9 (discard) is closed on test machines, so any upstream call fails fast
    fn gateway(limit: u32) -> (Gateway, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000.0));
        let upstream = UpstreamClient::new(&UpstreamSettings {
            base_url: "http://127.0.0.1:9/fetch".to_string(),
            api_key: None,
            user_id: "h2".to_string(),
            connect_timeout: Duration::from_millis(200),
            request_timeout: Duration::from_millis(500),
        })
        .unwrap();
        let gateway = Gateway::new(
            Arc::new(RateLimiter::new(limit, 60, clock.clone())),
            Arc::new(ResponseCache::new(300, clock.clone())),
            upstream,
        );
        (gateway, clock)
    }

    #[test]
    fn url_validation() {
        assert!(matches!(validate_url(None), Err(GatewayError::InvalidInput(_))));
        assert!(matches!(validate_url(Some("  ")), Err(GatewayError::InvalidInput(_))));
        assert!(matches!(validate_url(Some("ftp://x")), Err(GatewayError::InvalidInput(_))));
        assert!(matches!(validate_url(Some("https://")), Err(GatewayError::InvalidInput(_))));
        assert_eq!(validate_url(Some(" https://x.com/a ")).unwrap(), "https://x.com/a");
        assert_eq!(validate_url(Some("HTTP://x.com")).unwrap(), "HTTP://x.com");
    }

    #[tokio::test]
    async fn invalid_url_does_not_consume_quota() {
        let (gateway, _clock) = gateway(1);
        assert!(gateway.handle("A", Some("ftp://x"), false).await.is_err());
        assert_eq!(gateway.rate_limiter.snapshot().recent_requests, 0);
    }

    #[tokio::test]
    async fn cache_hit_skips_upstream() {
        let (gateway, clock) = gateway(5);
        let url = "https://www.tiktok.com/@a/video/1";
        gateway.cache.store(CacheKey::from_url(url), json!({"x": 1}));
        clock.advance(100.0);

        let download = gateway.handle("A", Some(url), false).await.unwrap();
        assert_eq!(download.payload, json!({"x": 1}));
        assert_eq!(
            download.cache,
            CacheMeta { hit: true, age_seconds: Some(100), ttl_seconds: 300, stored: None }
        );
    }

    #[tokio::test]
    async fn bypass_goes_upstream_even_with_fresh_entry() {
        let (gateway, _clock) = gateway(5);
        let url = "https://www.tiktok.com/@a/video/1";
        gateway.cache.store(CacheKey::from_url(url), json!({"x": 1}));

        let err = gateway.handle("A", Some(url), true).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::UpstreamTransport(_) | GatewayError::UpstreamTimeout(_)
        ));
    }

    #[tokio::test]
    async fn throttles_before_cache() {
        let (gateway, clock) = gateway(2);
        let url = "https://x.com/a";
        gateway.cache.store(CacheKey::from_url(url), json!({}));

        gateway.handle("A", Some(url), false).await.unwrap();
        clock.advance(1.0);
        gateway.handle("A", Some(url), false).await.unwrap();
        clock.advance(1.0);
        match gateway.handle("A", Some(url), false).await {
            Err(GatewayError::Throttled { retry_after }) => assert_eq!(retry_after, 58),
            other => panic!("expected throttled, got {:?}", other.map(|d| d.payload)),
        }
    }
}
