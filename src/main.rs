//! Kube Sweeper Service
//!
//! Watches Jobs and Pods through the cluster store, deletes the ones past
//! their retention thresholds, and serves deletion counters on an HTTP
//! metrics endpoint.

use anyhow::{Context, Result};
use clap::Parser;
use kube_sweeper::config::SweeperConfig;
use kube_sweeper::metrics::{self, SweeperMetrics};
use kube_sweeper::ownership::OwnershipStrategy;
use kube_sweeper::reconcile::Sweeper;
use kube_sweeper::store::{ClusterStore, InMemoryStore};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "sweeper.toml")]
    config: String,

    /// Log intended deletions without issuing them
    #[arg(long)]
    dry_run: bool,

    /// Restrict cleanup to a single namespace
    #[arg(long)]
    namespace: Option<String>,
}

/// Waits for a shutdown signal (SIGINT or SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => log::info!("Received SIGINT"),
            _ = sigterm.recv() => log::info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        log::info!("Received Ctrl+C");
    }

    Ok(())
}

fn log_options(config: &SweeperConfig) {
    log::info!(
        "Provided options: \
         namespace: {:?}, dry-run: {}, delete-successful-after: {}, \
         delete-failed-after: {}, delete-pending-after: {}, \
         delete-orphaned-after: {}, delete-evicted-after: {}, \
         ignore-owned-by-cronjobs: {}, respect-annotations: {}, \
         label-selector: {:?}",
        config.namespace,
        config.dry_run,
        humantime::format_duration(config.delete_successful_after),
        humantime::format_duration(config.delete_failed_after),
        humantime::format_duration(config.delete_pending_after),
        humantime::format_duration(config.delete_orphaned_after),
        humantime::format_duration(config.delete_evicted_after),
        config.ignore_owned_by_cronjob,
        config.respect_annotations,
        config.label_selector,
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = SweeperConfig::load(std::path::Path::new(&args.config))
        .context("Failed to load configuration")?;
    if args.dry_run {
        config.dry_run = true;
    }
    if let Some(namespace) = args.namespace {
        config.namespace = namespace;
    }

    log::info!("Starting Kube Sweeper");
    log_options(&config);

    if config.thresholds().is_noop() {
        log::warn!(
            "All retention thresholds are zero; no cleanup will be performed until at least one is set"
        );
    }
    if config.dry_run {
        log::info!("Dry-run mode: deletions will be logged but not issued");
    }

    // In-process store backend. A real cluster client implements the same
    // ClusterStore trait and is wired in here.
    let store = Arc::new(InMemoryStore::new());

    let version = store
        .server_version()
        .await
        .context("Failed to probe server version")?;
    let strategy = OwnershipStrategy::from_version(&version);
    log::info!(
        "Server version {}.{}, using {strategy:?} ownership strategy",
        version.major,
        version.minor
    );

    let metrics = SweeperMetrics::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = Arc::new(Sweeper::new(
        store.clone(),
        config.clone(),
        strategy,
        metrics.clone(),
    ));
    let sweeper_task = {
        let sweeper = sweeper.clone();
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { sweeper.run(shutdown_rx).await })
    };

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind metrics listener on {}", config.listen_addr))?;
    log::info!("Serving metrics on http://{}/metrics", config.listen_addr);

    let http_task = {
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(listener, metrics::router(metrics))
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                })
                .await
        })
    };

    wait_for_shutdown_signal().await?;

    log::info!("Received shutdown signal, stopping sweeper");
    shutdown_tx
        .send(true)
        .context("Failed to signal shutdown")?;

    sweeper_task.await.context("Sweeper task panicked")?;
    http_task
        .await
        .context("Metrics server task panicked")?
        .context("Metrics server failed")?;

    log::info!("Kube Sweeper stopped");

    Ok(())
}
