// Binary price market host - main entry point
// Accepts Ed25519-signed instructions over HTTP and runs them against the market program

use std::net::SocketAddr;

use binary_price_market::app_state::{AppState, HostConfig, SharedState};
use binary_price_market::config::MarketConfig;
use binary_price_market::handlers::router;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "binary_price_market=info".into()),
        )
        .init();

    let market_config = MarketConfig::from_env();
    let host = HostConfig::from_env();

    let state: SharedState = AppState::new(market_config, &host).shared();
    let shutdown_state = state.clone();

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], host.port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, dev_mode = host.dev_mode, "market host listening");
    tracing::info!("endpoints: POST /rpc/submit, GET /markets, GET /markets/:address, GET /markets/:address/bets, GET /events, GET /health");
    if host.dev_mode {
        tracing::info!("dev endpoints: POST /dev/mints, POST /dev/faucet, POST /dev/prices");
    }

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install ctrl-c handler");
            return;
        }

        tracing::info!("shutdown signal received, saving state");
        match shutdown_state.lock() {
            Ok(app_state) => {
                if let Err(e) = app_state.save_to_disk() {
                    tracing::error!(error = %e, "failed to save state");
                }
            }
            Err(_) => tracing::error!("state lock poisoned, skipping save"),
        }
        std::process::exit(0);
    });

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server error");
    }
}
