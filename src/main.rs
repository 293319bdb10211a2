use std::sync::Arc;

use halo::config::ServerConfig;
use halo::context::AppState;
use halo::handlers;
use halo::server::Server;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("halo=info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env()?;
    let state = Arc::new(AppState::from_config(&config));
    let router = handlers::routes(state);

    let server = Server::bind(&config.addr)
        .await?
        .idle_timeout(config.idle_timeout);
    tracing::info!(files = %config.files_dir.display(), "serving files");

    tokio::select! {
        res = server.run(router) => res?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
