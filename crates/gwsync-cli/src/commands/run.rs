//! Run command implementation
//!
//! Wires one cache, one publish coordinator and the three pollers over a
//! catalog snapshot. With `--once` each poller runs a single cycle in
//! dependency order; otherwise every poller is scheduled on the configured
//! interval until Ctrl-C.

use anyhow::{Context, Result, bail};
use gwsync_core::{
    CatalogCache, CatalogSnapshot, DiscoveryFilter, Pollable, ProductPoller, ProxyPoller,
    PublishCoordinator, SnapshotCatalog, SpecPoller, SyncConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::cli::RunArgs;
use crate::journal::JournalPublisher;
use crate::parser::OpenApiParser;

/// The three pollers sharing one cache and one coordinator.
struct Pollers {
    specs: Arc<SpecPoller>,
    products: Arc<ProductPoller>,
    proxies: Arc<ProxyPoller>,
}

impl Pollers {
    fn build(
        config: &SyncConfig,
        client: Arc<SnapshotCatalog>,
        publisher: Arc<JournalPublisher>,
    ) -> Self {
        let cache = Arc::new(CatalogCache::new());
        let coordinator = Arc::new(PublishCoordinator::new(
            publisher,
            config.publish.gateway_type.clone(),
        ));

        let mut specs = SpecPoller::new(client.clone(), cache.clone(), config.poll.pool());
        if config.specs.parse_endpoints {
            specs = specs.with_parser(Arc::new(OpenApiParser));
        }

        let products = ProductPoller::new(
            client.clone(),
            cache.clone(),
            coordinator.clone(),
            specs.first_run(),
            config.poll.pool(),
        )
        .with_filter(DiscoveryFilter::new(&config.filter.require));

        let proxies = ProxyPoller::new(
            client,
            cache,
            coordinator,
            specs.first_run(),
            config.poll.pool(),
            config.specs.match_on_url,
        );

        Self {
            specs: Arc::new(specs),
            products: Arc::new(products),
            proxies: Arc::new(proxies),
        }
    }

    /// Pollers in the order a single pass must run them.
    fn ordered(&self) -> [Arc<dyn Pollable>; 3] {
        [
            self.specs.clone(),
            self.products.clone(),
            self.proxies.clone(),
        ]
    }
}

/// Execute the run command.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    let snapshot = CatalogSnapshot::load(&args.snapshot)
        .with_context(|| format!("loading snapshot from {}", args.snapshot.display()))?;
    let client = Arc::new(SnapshotCatalog::new(snapshot));
    let publisher = Arc::new(JournalPublisher::open(args.journal.as_deref()).await?);
    let pollers = Pollers::build(&config, client.clone(), publisher.clone());

    info!(
        interval_secs = config.poll.interval_secs,
        workers = config.poll.workers,
        once = args.once,
        "starting pollers"
    );

    if args.once {
        let result = run_once(&pollers).await;
        let published = publisher.published_since_open();
        for description in &published {
            println!("{}", description.id);
        }
        info!(published = published.len(), "single pass finished");
        return result;
    }

    run_forever(&pollers, client, &args.snapshot, config.poll.interval()).await
}

async fn run_once(pollers: &Pollers) -> Result<()> {
    let mut failed = Vec::new();
    for poller in pollers.ordered() {
        if !poller.ready() {
            warn!(poller = poller.name(), "poller not ready, skipping");
            failed.push(poller.name());
            continue;
        }
        if let Err(e) = poller.execute().await {
            error!(poller = poller.name(), error = %e, "poll cycle failed");
            failed.push(poller.name());
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        bail!("poll cycle did not complete for: {}", failed.join(", "))
    }
}

async fn run_forever(
    pollers: &Pollers,
    client: Arc<SnapshotCatalog>,
    snapshot: &Path,
    interval: Duration,
) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut handles: Vec<JoinHandle<()>> = pollers
        .ordered()
        .into_iter()
        .map(|poller| tokio::spawn(schedule(poller, interval, shutdown_rx.clone())))
        .collect();
    handles.push(tokio::spawn(reload_snapshot(
        client,
        snapshot.to_path_buf(),
        interval,
        shutdown_rx,
    )));

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown requested");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "scheduler task ended abnormally");
        }
    }
    Ok(())
}

/// Invoke `poller` every `interval` until shutdown.
///
/// Each cycle runs in its own task so a slow cycle never delays the next tick.
/// The poller's own overlap guard turns a tick that lands on a running cycle
/// into a no-op. Cycles still in flight at shutdown are awaited before
/// returning.
async fn schedule(
    poller: Arc<dyn Pollable>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cycles = JoinSet::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            Some(finished) = cycles.join_next(), if !cycles.is_empty() => {
                if let Err(e) = finished {
                    warn!(poller = poller.name(), error = %e, "poll cycle task ended abnormally");
                }
                continue;
            }
            _ = shutdown.changed() => break,
        }

        if let Err(e) = poller.status() {
            warn!(poller = poller.name(), error = %e, "poller unhealthy");
            continue;
        }
        if !poller.ready() {
            debug!(poller = poller.name(), "waiting for dependencies");
            continue;
        }

        let cycle = Arc::clone(&poller);
        cycles.spawn(async move {
            if let Err(e) = cycle.execute().await {
                error!(poller = cycle.name(), error = %e, "poll cycle failed");
            }
        });
    }

    if !cycles.is_empty() {
        debug!(poller = poller.name(), in_flight = cycles.len(), "waiting for running cycles");
    }
    while let Some(finished) = cycles.join_next().await {
        if let Err(e) = finished {
            warn!(poller = poller.name(), error = %e, "poll cycle task ended abnormally");
        }
    }
    debug!(poller = poller.name(), "scheduler stopped");
}

/// Re-read the snapshot file every `interval`, keeping the last good one.
async fn reload_snapshot(
    client: Arc<SnapshotCatalog>,
    path: PathBuf,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and the snapshot is already loaded.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        match CatalogSnapshot::load(&path) {
            Ok(snapshot) => {
                client.replace(snapshot);
                debug!(snapshot = %path.display(), "snapshot reloaded");
            },
            Err(e) => warn!(snapshot = %path.display(), error = %e, "snapshot reload failed"),
        }
    }
}
