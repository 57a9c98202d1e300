//! EnrichmentScheduler - dispatches enrichment work and filters results
//!
//! Lives on the model thread. Every request gets a generation number;
//! only the latest generation for an `(item, kind)` pair is accepted back.
//! `begin_epoch` purges every queue and forgets all outstanding requests.

use super::{
    CacheKey, CacheStats, EnrichmentCache, EnrichmentKind, EnrichmentProvider, EnrichmentResult,
    Payload, PoolKind, RequestOutcome, WorkerPool,
};
use crate::config::EnrichmentConfig;
use crate::entry::{Epoch, InternalId};
use crate::error::EngineError;
use crate::registry::ItemRegistry;
use app_fs::Locator;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

type ResultSink = Arc<dyn Fn(EnrichmentResult) + Send + Sync>;

pub struct EnrichmentScheduler<P: EnrichmentProvider> {
    provider: Arc<P>,
    cache: Arc<EnrichmentCache>,
    sink: ResultSink,
    pending: HashMap<(InternalId, EnrichmentKind), u64>,
    next_generation: u64,
    epoch: Epoch,
    icon_pool: WorkerPool,
    thumbnail_pool: WorkerPool,
    column_pool: WorkerPool,
    info_tip_pool: WorkerPool,
}

impl<P: EnrichmentProvider> EnrichmentScheduler<P> {
    /// Start one pool per enrichment kind. Results are handed to `sink` on
    /// the worker thread.
    pub fn new<F>(provider: Arc<P>, config: &EnrichmentConfig, sink: F) -> Result<Self, EngineError>
    where
        F: Fn(EnrichmentResult) + Send + Sync + 'static,
    {
        let pool = |name: &str, threads: usize| {
            WorkerPool::new(name, threads).map_err(|e| EngineError::WorkerSpawn(format!("{}: {}", name, e)))
        };

        Ok(Self {
            provider,
            cache: Arc::new(EnrichmentCache::new(config.cache_capacity)),
            sink: Arc::new(sink),
            pending: HashMap::new(),
            next_generation: 0,
            epoch: Epoch::default(),
            icon_pool: pool("enrich-icon", config.icon_threads)?,
            thumbnail_pool: pool("enrich-thumb", config.thumbnail_threads)?,
            column_pool: pool("enrich-column", config.column_threads)?,
            info_tip_pool: pool("enrich-tip", config.info_tip_threads)?,
        })
    }

    /// Request one attribute of an item.
    ///
    /// A cache hit resolves on the calling thread and supersedes any
    /// request still in flight for the same item and kind.
    pub fn request(&mut self, registry: &ItemRegistry, id: InternalId, kind: EnrichmentKind) -> RequestOutcome {
        let Some(snapshot) = registry.snapshot(id) else {
            return RequestOutcome::Skipped;
        };
        let key = CacheKey::new(&snapshot, kind);
        if let Some(payload) = self.cache.get(&key) {
            self.pending.remove(&(id, kind));
            return RequestOutcome::Resolved(payload);
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let epoch = self.epoch;
        let provider = self.provider.clone();
        let cache = self.cache.clone();
        let sink = self.sink.clone();

        let submitted = self.pool(kind.pool()).submit(move || {
            // A panicking provider still answers, or the request stays pending
            let outcome = catch_unwind(AssertUnwindSafe(|| kind.run(provider.as_ref(), &snapshot)));
            let payload = match outcome {
                Ok(Ok(payload)) => {
                    cache.insert(key, payload.clone());
                    payload
                }
                Ok(Err(e)) => {
                    tracing::debug!(item = %snapshot.locator, ?kind, error = %e, "Enrichment unavailable");
                    Payload::Unavailable
                }
                Err(_) => {
                    tracing::warn!(item = %snapshot.locator, ?kind, "Enrichment provider panicked");
                    Payload::Unavailable
                }
            };
            sink(EnrichmentResult {
                target: snapshot.id,
                epoch,
                kind,
                generation,
                payload,
            });
        });

        if !submitted {
            tracing::warn!(%id, ?kind, "Enrichment pool closed; request dropped");
            return RequestOutcome::Skipped;
        }
        self.pending.insert((id, kind), generation);
        RequestOutcome::Queued(generation)
    }

    /// Whether a delivered result is still wanted. Consumes the pending
    /// generation on success, so a result is accepted at most once.
    pub fn accept(&mut self, result: &EnrichmentResult) -> bool {
        if result.epoch != self.epoch {
            tracing::debug!(
                target_id = %result.target,
                stale = result.epoch.0,
                current = self.epoch.0,
                "Stale enrichment result dropped"
            );
            return false;
        }
        let slot = (result.target, result.kind);
        match self.pending.get(&slot) {
            Some(&latest) if latest == result.generation => {
                self.pending.remove(&slot);
                true
            }
            _ => {
                tracing::debug!(
                    target_id = %result.target,
                    kind = ?result.kind,
                    generation = result.generation,
                    "Superseded enrichment result dropped"
                );
                false
            }
        }
    }

    /// Cancel everything queued for the previous container
    pub fn begin_epoch(&mut self, epoch: Epoch) {
        self.epoch = epoch;
        let purged = self.icon_pool.purge()
            + self.thumbnail_pool.purge()
            + self.column_pool.purge()
            + self.info_tip_pool.purge();
        let forgotten = self.pending.len();
        self.pending.clear();
        tracing::debug!(epoch = epoch.0, purged, forgotten, "Enrichment reset");
    }

    /// Forget outstanding requests for an item that left the registry
    pub fn forget(&mut self, id: InternalId) {
        self.pending.retain(|(target, _), _| *target != id);
    }

    /// Drop cached payloads for a locator whose item changed
    pub fn invalidate(&self, locator: &Locator) {
        let dropped = self.cache.invalidate_locator(locator.id());
        if dropped > 0 {
            tracing::debug!(%locator, dropped, "Enrichment cache invalidated");
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn pool(&self, kind: PoolKind) -> &WorkerPool {
        match kind {
            PoolKind::Icon => &self.icon_pool,
            PoolKind::Thumbnail => &self.thumbnail_pool,
            PoolKind::Column => &self.column_pool,
            PoolKind::InfoTip => &self.info_tip_pool,
        }
    }
}

impl<P: EnrichmentProvider> Drop for EnrichmentScheduler<P> {
    fn drop(&mut self) {
        self.provider.shutdown();
    }
}
