use anyhow::Result;
use clap::Parser;
use secwatch::{
    cli::Args,
    config::Config,
    connection::ConnectionManager,
    dispatcher::EventDispatcher,
    monitoring::setup_metrics,
    store::DashboardStore,
    sync,
    tracing_setup::setup_tracing,
    ui::{StatusOptions, StatusView},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing(&args.log_level, args.json_logs)?;

    info!("Starting secwatch v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::from_args(&args)?);

    if config.metrics.enabled {
        setup_metrics(config.metrics.port).await?;
    }

    let dispatcher = EventDispatcher::new();
    let store = Arc::new(DashboardStore::new());
    let _store_sync = sync::attach(&dispatcher, &store);
    let _status_view = StatusView::attach(
        &dispatcher,
        StatusOptions {
            colored: config.logging.colored,
            quiet: config.logging.quiet,
        },
    );

    let manager = ConnectionManager::new(config.clone(), dispatcher.clone());
    manager.connect();

    info!("Press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;

    manager.disconnect();

    let health = manager.health();
    info!(
        frames = health.frames_received,
        notifications = store.notifications().len(),
        "secwatch stopped"
    );
    Ok(())
}
