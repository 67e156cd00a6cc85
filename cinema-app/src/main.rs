use anyhow::Context;
use cinema_app::{seed, worker, AppState};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinema_app=debug,cinema_order=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cinema_store::app_config::Config::load().context("Failed to load config")?;
    tracing::info!(
        "Starting cinema booking service, data in {}, holds expire after {}s",
        config.storage.data_dir.display(),
        config.business_rules.seat_hold_seconds
    );

    let (state, _summary) = AppState::build(config).await?;

    if seed::ensure_demo_data(&state.gateway, state.config.business_rules.default_seat_price_cents).await? {
        tracing::info!("Empty store, demo data written");
    }

    worker::log_availability(&state.manager, &state.gateway).await;

    // Sweep at a tenth of the hold TTL, at least once a second
    let every = (state.config.business_rules.seat_hold_ttl() / 10).max(Duration::from_secs(1));
    tokio::spawn(worker::start_hold_sweeper(state.manager.clone(), every));

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    tracing::info!("Shutting down");
    Ok(())
}
