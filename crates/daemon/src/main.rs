mod config;
mod report;

use anyhow::{Context, Result};
use commentsync_sync::{ChannelSupervisor, Feed, FeedOptions, RetryPolicy, WsConnector};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("warn,commentsync_daemon=info,commentsync_sync=info")
            }),
        )
        .init();

    if let Err(e) = run().await {
        error!("Daemon fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    info!("commentsync-daemon starting");

    let cfg = config::load_config()?;
    let client = config::build_client(&cfg)?;
    info!("Comment API at {}", client.base_url());

    let feed = Feed::new(client, FeedOptions::from_config(&cfg));
    match feed.refresh().await {
        Ok(comments) => info!("Loaded first page: {} comments", comments.len()),
        // Not fatal: the realtime channel or the next resync may succeed.
        Err(e) => warn!("Initial load failed: {e}"),
    }

    let supervisor = if cfg.realtime.enabled {
        let supervisor = ChannelSupervisor::new(
            WsConnector::new(cfg.server.ws_url.clone()),
            feed.clone(),
            RetryPolicy::from_settings(&cfg.realtime),
            feed.metrics_handle(),
        );
        info!("Following realtime channel at {}", cfg.server.ws_url);
        supervisor.connect();
        Some(supervisor)
    } else {
        info!("Realtime channel disabled; the feed is only loaded once");
        None
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let report_handle = tokio::spawn(report::run_feed_report(
        feed.clone(),
        supervisor.as_ref().map(ChannelSupervisor::subscribe),
        shutdown_rx,
    ));

    wait_for_shutdown().await?;

    info!("Shutdown signal received, stopping...");
    if let Some(supervisor) = &supervisor {
        supervisor.shutdown();
    }
    let _ = shutdown_tx.send(true);
    let _ = report_handle.await;

    let metrics = serde_json::to_string(&feed.metrics())?;
    info!("Sync metrics: {metrics}");
    info!("commentsync-daemon stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).context("Failed to register SIGTERM")?;
        let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT")?;
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to register Ctrl+C handler")?;
        info!("Received Ctrl+C");
    }
    Ok(())
}
