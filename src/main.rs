// Inkpost Server - blog backend over HTTP

use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use inkpost::{app_state::AppState, blog_interface::create_blog_router, config::Config};

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("inkpost=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;
    spawn_maintenance(&app_state);

    let app = create_blog_router(app_state);

    // Start server
    let addr = config.server_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Inkpost server listening on http://{}", listener.local_addr()?);
    info!("Public base URL: {}", config.server.public_base_url);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop expired sessions and unused upload tokens
fn spawn_maintenance(state: &AppState) {
    let auth = state.auth.clone();
    let blobs = state.blobs.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            interval.tick().await;
            let sessions = auth.cleanup_expired_sessions().await;
            let uploads = blobs.cleanup_expired_uploads().await;
            debug!(sessions, uploads, "expired credentials cleaned up");
        }
    });
}
