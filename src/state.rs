use std::sync::Arc;
use std::time::Instant;
use crate::cache::ResponseCache;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::rate_limit::RateLimiter;
use crate::upstream::UpstreamClient;

// app's shared state
pub struct AppState {
    pub gateway: Gateway,
    pub trust_forwarded_for: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, GatewayError> {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit,
            config.rate_window,
            clock.clone(),
        ));
        let cache = Arc::new(ResponseCache::new(config.cache_ttl, clock));
        let upstream = UpstreamClient::new(&config.upstream())?;

        Ok(Self::with_gateway(
            Gateway::new(rate_limiter, cache, upstream),
            config.trust_forwarded_for,
        ))
    }

    pub fn with_gateway(gateway: Gateway, trust_forwarded_for: bool) -> Self {
        Self {
            gateway,
            trust_forwarded_for,
            started_at: Instant::now(),
        }
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.gateway.rate_limiter
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.gateway.cache
    }
}
