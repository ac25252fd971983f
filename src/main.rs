use anyhow::Context;
use paynow_relay::api::{create_router, AppState};
use paynow_relay::config::Config;
use paynow_relay::payments::types::PaymentEvent;
use paynow_relay::payments::{BroadcastEventSink, InMemoryTransactionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::info!("Starting Paynow relay");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Gateway: {}", config.paynow.initiate_url);
    tracing::info!("Result URL: {}", config.merchant.result_url);

    let events = BroadcastEventSink::default();

    let mut settled = events.subscribe();
    tokio::spawn(async move {
        loop {
            match settled.recv().await {
                Ok(PaymentEvent::Settled {
                    reference, outcome, ..
                }) => {
                    tracing::info!(
                        "Settlement event: reference={}, outcome={:?}",
                        reference,
                        outcome
                    );
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Settlement log lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let store = Arc::new(InMemoryTransactionStore::with_config(config.store.clone()));

    let pruned = store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = pruned.prune().await;
            if removed > 0 {
                tracing::info!("Expired {} stale transactions", removed);
            }
        }
    });

    let state = AppState::from_config(config.clone(), store, events)
        .context("Failed to initialise payment gateway")?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("HOST and PORT must form a valid socket address")?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
