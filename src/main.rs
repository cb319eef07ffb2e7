use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use media_gateway::clock::SystemClock;
use media_gateway::config::Config;
use media_gateway::janitor::Janitor;
use media_gateway::state::AppState;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // parse cli arguments / environment
    let config = Config::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "media_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate().context("invalid configuration")?;

    let state = Arc::new(
        AppState::new(&config, Arc::new(SystemClock::new())).context("failed to build state")?,
    );

    let janitor = Janitor::spawn(
        state.rate_limiter().clone(),
        state.cache().clone(),
        config.rate_sweep_interval(),
        config.cache_sweep_interval(),
    );

    let app = media_gateway::app(state, &config.cors_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("Gateway running on http://{}", addr);
    tracing::info!("Forwarding to {}", config.upstream_url);
    tracing::info!("Cache TTL: {} seconds", config.cache_ttl);
    tracing::info!(
        "Rate limit: {} requests per {} seconds",
        config.rate_limit,
        config.rate_window
    );
    if config.api_key.is_none() {
        tracing::warn!("API_KEY is not set, upstream calls will be unauthenticated");
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    janitor.shutdown().await;
    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
