//! resetgate binary entrypoint.

use resetgate::config::Config;
use resetgate::janitor::Janitor;
use resetgate::{server, state};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let addr = config.bind_addr.clone();
    let janitor_interval = config.janitor_interval;

    let state = state::build_state(config);
    let janitor = Janitor::start(janitor_interval, state.sweep_targets());
    tracing::info!("starting resetgate on {}", addr);

    let result = server::run(state, &addr, shutdown_signal()).await;
    janitor.shutdown().await;
    result?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
