use bi_subscriptions::{router, AppState, Config, HttpSource, SubscriptionCache, SystemClock};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    if config.source.accept_invalid_certs {
        warn!(url = %config.source.url, "TLS certificate validation is disabled for the report endpoint");
    }

    let source = HttpSource::new(&config.source)?;
    let cache = SubscriptionCache::new(Arc::new(source), Arc::new(SystemClock), config.cache_ttl);
    let state = AppState::new(cache, config.default_range());

    let addr = config.listen_addr();
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
