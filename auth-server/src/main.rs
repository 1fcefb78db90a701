//! auth-server binary

use std::net::SocketAddr;
use std::time::Duration;

use auth_server::{AppState, Config, create_router};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Rate limiter and blacklist maintenance interval
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    init_tracing(config.log_json);

    tracing::info!("Starting auth-server (env: {})", config.environment);

    let state = AppState::new(&config).await?;
    spawn_maintenance(&state);

    let app = create_router(state);

    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!("auth-server HTTP listening on {http_addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("auth-server stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "auth_server=info,tower_http=info".into());

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

/// Periodic rate limiter cleanup and blacklist purge
fn spawn_maintenance(state: &AppState) {
    let rate_limiter = state.rate_limiter.clone();
    let jwt = state.jwt.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            interval.tick().await;
            rate_limiter.cleanup().await;

            match jwt.blacklist().purge_expired(shared::util::now_secs()).await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(purged = n, "Expired revocations purged"),
                Err(e) => tracing::warn!(error = %e, "Blacklist purge failed"),
            }
        }
    });
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
