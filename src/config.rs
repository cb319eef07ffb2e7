use clap::Parser;
use std::time::Duration;
use thiserror::Error;
use crate::upstream::UpstreamSettings;

pub const DEFAULT_UPSTREAM_URL: &str =
    "https://utdqxiuahh.execute-api.ap-south-1.amazonaws.com/pro/fetch";

// CLI argument structure, every option can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "media-gateway")]
#[command(about = "Rate limited, caching gateway for a media download API")]
pub struct Config {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // Rate limit max requests per window
    #[arg(long, env = "RATE_LIMIT", default_value_t = 5)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "RATE_WINDOW", default_value_t = 60)]
    pub rate_window: u64,

    // Cache TTL in seconds
    #[arg(short, long, env = "CACHE_TTL", default_value_t = 300)]
    pub cache_ttl: u64,

    // How often expired cache entries are swept, in seconds
    #[arg(long, env = "CACHE_SWEEP_INTERVAL", default_value_t = 60)]
    pub cache_sweep_interval: u64,

    // Upstream fetch endpoint
    #[arg(long, env = "UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub upstream_url: String,

    // Shared secret forwarded as x-api-key
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    // Upstream user identifier
    #[arg(long, env = "USER_ID", default_value = "h2")]
    pub user_id: String,

    // Upstream connect timeout in seconds
    #[arg(long, env = "UPSTREAM_CONNECT_TIMEOUT", default_value_t = 10)]
    pub connect_timeout: u64,

    // Upstream total request timeout in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT", default_value_t = 60)]
    pub request_timeout: u64,

    // Take the client address from X-Forwarded-For (only behind a trusted proxy)
    #[arg(long, env = "TRUST_FORWARDED_FOR", default_value_t = false)]
    pub trust_forwarded_for: bool,

    // "*" or comma-separated list of allowed origins
    #[arg(long, env = "CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,
}

// Startup configuration problems
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be at least 1")]
    Zero(&'static str),

    #[error("UPSTREAM_CONNECT_TIMEOUT ({connect}s) must be shorter than UPSTREAM_TIMEOUT ({total}s)")]
    ConnectNotShorter { connect: u64, total: u64 },
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("RATE_LIMIT", self.rate_limit as u64),
            ("RATE_WINDOW", self.rate_window),
            ("CACHE_TTL", self.cache_ttl),
            ("CACHE_SWEEP_INTERVAL", self.cache_sweep_interval),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero(*name));
        }
        if self.connect_timeout >= self.request_timeout {
            return Err(ConfigError::ConnectNotShorter {
                connect: self.connect_timeout,
                total: self.request_timeout,
            });
        }
        Ok(())
    }

    // twice the window, so a sweep never runs while every entry is still live
    pub fn rate_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.rate_window * 2)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_interval)
    }

    pub fn upstream(&self) -> UpstreamSettings {
        UpstreamSettings {
            base_url: self.upstream_url.clone(),
            api_key: self.api_key.clone(),
            user_id: self.user_id.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            request_timeout: Duration::from_secs(self.request_timeout),
        }
    }
}
