use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use botwatch::application::actors::live_feed::{spawn_broadcaster, LiveFeed};
use botwatch::application::handlers::{router, AppState};
use botwatch::application::services::monitor_service::MonitorService;
use botwatch::config::MonitorConfig;
use botwatch::persistence::init_database;
use botwatch::persistence::repository::SqliteMarketRepository;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "botwatch=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("botwatch starting...");

    let config = Arc::new(MonitorConfig::from_env()?);
    info!(
        "Configuration '{}' loaded: {} coins enabled",
        config.name,
        config.enabled_symbols().len()
    );

    let pool = init_database(&config.database).await?;
    let repository = Arc::new(SqliteMarketRepository::new(pool.clone()));
    let service = Arc::new(MonitorService::new(repository, config.clone()));
    let feed = Arc::new(LiveFeed::new());

    let broadcaster = spawn_broadcaster(
        feed.clone(),
        service.clone(),
        config.server.feed_interval(),
    );

    let app = router(AppState::new(service, feed));

    let addr: SocketAddr = config.server.bind_addr.parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    // Set up graceful shutdown
    let shutdown_signal = async move {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Server started successfully. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Server shutting down gracefully...");
    broadcaster.abort();
    pool.close().await;

    info!("Shutdown complete");
    Ok(())
}
