//! Listing loop - wires the file system into the engine and keeps it live

use crate::cli::Cli;
use crate::console::ConsoleSurface;
use anyhow::{Context, Result};
use app_core::{
    ColumnKind, ConsumerRequest, FsEnrichmentProvider, InternalId, ListingConfig, ListingEngine,
    RequestOutcome,
};
use app_fs::{FsEnumerator, FsWatcher, Locator};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

type Engine = ListingEngine<FsEnumerator, FsEnrichmentProvider, ConsoleSurface>;

const PUMP_INTERVAL: Duration = Duration::from_millis(100);
const OPEN_TIMEOUT: Duration = Duration::from_secs(60);

pub fn run(cli: Cli, config: ListingConfig, shutdown: Arc<AtomicBool>) -> Result<()> {
    let start = match &cli.path {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("Cannot determine the current directory")?,
    };
    let start = std::fs::canonicalize(&start)
        .with_context(|| format!("Cannot open {}", start.display()))?;

    let provider = FsEnrichmentProvider::new(
        config.enrichment.thumbnail_size,
        config.enrichment.show_folder_sizes,
    );
    let mut engine: Engine = ListingEngine::new(
        Arc::new(FsEnumerator),
        Arc::new(provider),
        ConsoleSurface::new(cli.json),
        &config,
    )?;

    let notifications = engine.notification_sender();
    let mut watcher = FsWatcher::new(move |event| {
        notifications.send(event);
    })?;

    open(&mut engine, &mut watcher, Locator::new(&start))
        .with_context(|| format!("Cannot list {}", start.display()))?;
    let mut requested = HashSet::new();
    request_enrichment(&mut engine, &mut requested);

    let deadline = cli.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    tracing::info!(deadline = ?cli.duration, "Listing is live");

    while !shutdown.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::info!("Duration elapsed");
            break;
        }
        if engine.pump_timeout(PUMP_INTERVAL) > 0 {
            request_enrichment(&mut engine, &mut requested);
        }

        for request in engine.take_requests() {
            match request {
                ConsumerRequest::Navigate(target) => {
                    tracing::info!("Displayed folder is gone, moving to {}", target);
                    if let Err(e) = open(&mut engine, &mut watcher, target.clone()) {
                        tracing::warn!("Fallback to {} failed: {:#}", target, e);
                    }
                    requested.clear();
                    request_enrichment(&mut engine, &mut requested);
                }
                ConsumerRequest::ContainerMoved(target) => {
                    tracing::info!("Displayed folder moved to {}", target);
                    if let Err(e) = watcher.watch(&target) {
                        tracing::warn!("Cannot watch {}: {}", target, e);
                    }
                }
            }
        }
    }

    let stats = engine.cache_stats();
    tracing::info!(
        hits = stats.hits,
        misses = stats.misses,
        entries = stats.entries,
        "Enrichment cache"
    );
    Ok(())
}

/// Navigate to `target`, wait for the listing and start watching it
fn open(engine: &mut Engine, watcher: &mut FsWatcher, target: Locator) -> Result<()> {
    engine.navigate(target.clone());
    engine.wait_for_navigation(OPEN_TIMEOUT)?;
    watcher.watch(&target)?;
    Ok(())
}

/// Ask for icons of visible items not asked for yet, and the size text of folders
fn request_enrichment(engine: &mut Engine, requested: &mut HashSet<InternalId>) {
    let ids: Vec<InternalId> = engine
        .view()
        .order()
        .iter()
        .copied()
        .filter(|id| !requested.contains(id))
        .collect();
    let mut queued = 0usize;
    for id in ids {
        requested.insert(id);
        if matches!(engine.request_icon(id), RequestOutcome::Queued(_)) {
            queued += 1;
        }
        let is_container = engine
            .registry()
            .get(id)
            .is_some_and(|entry| entry.is_container());
        if is_container && engine.view().columns().is_visible(ColumnKind::Size) {
            engine.request_column(id, ColumnKind::Size);
        }
    }
    if queued > 0 {
        tracing::debug!(queued, "Enrichment requested");
    }
}
