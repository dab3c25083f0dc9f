use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::task::TaskTracker;

use user_address_api::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;

    user_address_api::init_tracing(&config.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting user-address-api");

    let pool = user_address_api::connect_database(&config.database_url, 10).await?;

    let addr = SocketAddr::new(config.host, config.port);
    let background = TaskTracker::new();
    let app = user_address_api::build_app(pool, config, background.clone())?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    background.close();
    if !background.is_empty() {
        tracing::info!(tasks = background.len(), "Waiting for background tasks");
    }
    if tokio::time::timeout(Duration::from_secs(30), background.wait()).await.is_err() {
        tracing::warn!(tasks = background.len(), "Background tasks still running at exit");
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Ctrl+C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
