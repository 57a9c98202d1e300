//! ListingEngine - the model thread
//!
//! Owns the registry, view, scheduler, reconciler and navigation state, and
//! is the only place any of them is mutated. Workers (enumeration,
//! enrichment, the change source) talk to it through one inbound channel
//! that `pump` drains.

use crate::columns::ColumnKind;
use crate::config::{ContainerPlacement, FolderSettings, GroupMode, ListingConfig, SortDirection, SortMode};
use crate::enrichment::{
    CacheStats, EnrichmentKind, EnrichmentProvider, EnrichmentResult, EnrichmentScheduler, Payload,
    RequestOutcome, WorkerPool,
};
use crate::entry::{Epoch, InternalId};
use crate::error::EngineError;
use crate::navigation::{NavigationController, NavigationKind, NavigationRequest};
use crate::presentation::{DisplayFields, PresentationSurface, SurfaceEvent};
use crate::reconciler::{ChangeReconciler, ModelOp, StampedChange};
use crate::registry::ItemRegistry;
use crate::view::ViewEngine;
use app_fs::{ChangeEvent, Enumerator, Locator, RawEntry};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How an enumeration ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Complete,
    /// Stopped early; what was read so far is still committed
    Incomplete(String),
}

/// Messages from the enumeration worker
#[derive(Debug)]
pub enum EnumerationMsg {
    /// The container opened
    Started(NavigationRequest),
    Batch { request: u64, entries: Vec<RawEntry> },
    Finished { request: u64, completion: Completion },
    /// The container could not be opened at all
    Failed { request: NavigationRequest, error: EngineError },
}

#[derive(Debug)]
pub(crate) enum Inbound {
    Enumeration(EnumerationMsg),
    Enriched(EnrichmentResult),
    Change(StampedChange),
}

/// Handle for pushing change notifications into the engine from any thread.
///
/// Each event is stamped with the epoch current at the moment it is sent.
#[derive(Clone)]
pub struct NotificationSender {
    tx: Sender<Inbound>,
    epoch: Arc<AtomicU64>,
}

impl NotificationSender {
    /// False once the engine is gone
    pub fn send(&self, event: ChangeEvent) -> bool {
        let epoch = Epoch(self.epoch.load(Ordering::SeqCst));
        self.tx.send(Inbound::Change(StampedChange { epoch, event })).is_ok()
    }
}

/// Things the engine wants the consumer to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerRequest {
    /// The displayed container is gone; navigate here
    Navigate(Locator),
    /// The displayed container moved; re-arm change monitoring here
    ContainerMoved(Locator),
}

pub struct ListingEngine<E, P, S>
where
    E: Enumerator,
    P: EnrichmentProvider,
    S: PresentationSurface,
{
    enumerator: Arc<E>,
    surface: S,
    registry: ItemRegistry,
    view: ViewEngine,
    scheduler: EnrichmentScheduler<P>,
    reconciler: ChangeReconciler,
    navigation: NavigationController,
    enumeration: WorkerPool,
    inbox_tx: Sender<Inbound>,
    inbox: Receiver<Inbound>,
    epoch_signal: Arc<AtomicU64>,
    /// Request whose entries are being staged
    loading: Option<NavigationRequest>,
    /// Current-epoch changes that arrived while staging
    deferred: Vec<StampedChange>,
    requests: Vec<ConsumerRequest>,
    batch_size: usize,
    last_error: Option<EngineError>,
}

impl<E, P, S> ListingEngine<E, P, S>
where
    E: Enumerator,
    P: EnrichmentProvider,
    S: PresentationSurface,
{
    pub fn new(enumerator: Arc<E>, provider: Arc<P>, surface: S, config: &ListingConfig) -> Result<Self, EngineError> {
        let (inbox_tx, inbox) = unbounded();
        let results = inbox_tx.clone();
        let scheduler = EnrichmentScheduler::new(provider, &config.enrichment, move |result| {
            let _ = results.send(Inbound::Enriched(result));
        })?;
        let view = ViewEngine::new(&config.folder, &config.columns.visible)?;
        let enumeration =
            WorkerPool::new("enumerate", 1).map_err(|e| EngineError::WorkerSpawn(format!("enumerate: {}", e)))?;

        Ok(Self {
            enumerator,
            surface,
            registry: ItemRegistry::new(),
            view,
            scheduler,
            reconciler: ChangeReconciler::new(),
            navigation: NavigationController::new(),
            enumeration,
            inbox_tx,
            inbox,
            epoch_signal: Arc::new(AtomicU64::new(0)),
            loading: None,
            deferred: Vec::new(),
            requests: Vec::new(),
            batch_size: config.enrichment.enumeration_batch.max(1),
            last_error: None,
        })
    }

    pub fn notification_sender(&self) -> NotificationSender {
        NotificationSender {
            tx: self.inbox_tx.clone(),
            epoch: self.epoch_signal.clone(),
        }
    }

    // ===== Navigation =====

    pub fn navigate(&mut self, target: impl Into<Locator>) -> NavigationRequest {
        let request = self.navigation.begin(target.into(), NavigationKind::Normal);
        self.start(request.clone());
        request
    }

    /// Open a container item of the current listing
    pub fn navigate_into(&mut self, id: InternalId) -> Option<NavigationRequest> {
        if !self.registry.get(id)?.is_container() {
            return None;
        }
        let target = self.registry.full_locator(id)?;
        Some(self.navigate(target))
    }

    pub fn go_back(&mut self) -> Option<NavigationRequest> {
        let request = self.navigation.go_back()?;
        self.start(request.clone());
        Some(request)
    }

    pub fn go_forward(&mut self) -> Option<NavigationRequest> {
        let request = self.navigation.go_forward()?;
        self.start(request.clone());
        Some(request)
    }

    pub fn go_up(&mut self) -> Option<NavigationRequest> {
        let request = self.navigation.go_up()?;
        self.start(request.clone());
        Some(request)
    }

    pub fn refresh(&mut self) -> Option<NavigationRequest> {
        let request = self.navigation.refresh()?;
        self.start(request.clone());
        Some(request)
    }

    /// Act on a consumer request the default way
    pub fn follow(&mut self, request: &ConsumerRequest) -> Option<NavigationRequest> {
        match request {
            ConsumerRequest::Navigate(target) => {
                let request = self.navigation.begin(target.clone(), NavigationKind::Fallback);
                self.start(request.clone());
                Some(request)
            }
            ConsumerRequest::ContainerMoved(_) => None,
        }
    }

    pub fn take_requests(&mut self) -> Vec<ConsumerRequest> {
        std::mem::take(&mut self.requests)
    }

    fn start(&mut self, request: NavigationRequest) {
        self.last_error = None;
        self.enumeration.purge();
        let enumerator = self.enumerator.clone();
        let tx = self.inbox_tx.clone();
        let latest = self.navigation.latest_signal();
        let batch_size = self.batch_size;
        self.enumeration
            .submit(move || enumerate_container(enumerator.as_ref(), request, &tx, &latest, batch_size));
    }

    // ===== Enrichment =====

    pub fn request_icon(&mut self, id: InternalId) -> RequestOutcome {
        self.request(id, EnrichmentKind::Icon)
    }

    pub fn request_thumbnail(&mut self, id: InternalId) -> RequestOutcome {
        self.request(id, EnrichmentKind::Thumbnail)
    }

    pub fn request_column(&mut self, id: InternalId, column: ColumnKind) -> RequestOutcome {
        self.request(id, EnrichmentKind::Column(column))
    }

    pub fn request_info_tip(&mut self, id: InternalId) -> RequestOutcome {
        self.request(id, EnrichmentKind::InfoTip)
    }

    fn request(&mut self, id: InternalId, kind: EnrichmentKind) -> RequestOutcome {
        let outcome = self.scheduler.request(&self.registry, id, kind);
        if let RequestOutcome::Resolved(payload) = &outcome {
            self.apply_field(id, kind, payload.clone());
        }
        outcome
    }

    fn apply_field(&mut self, id: InternalId, kind: EnrichmentKind, payload: Payload) {
        let Some(entry) = self.registry.get_mut(id) else {
            return;
        };
        entry.apply_payload(kind, payload.clone());
        self.surface.deliver(SurfaceEvent::FieldReady { id, kind, payload });
    }

    // ===== View settings =====

    pub fn set_sort(&mut self, mode: SortMode, direction: SortDirection) {
        self.view.set_comparator(mode, direction, &mut self.registry);
        self.publish_reorder();
    }

    pub fn set_group(&mut self, mode: GroupMode, direction: SortDirection) {
        self.view.set_group_key_fn(mode, direction, &mut self.registry);
        self.publish_reorder();
    }

    pub fn set_filter(&mut self, pattern: Option<&str>, case_sensitive: bool) -> Result<(), EngineError> {
        self.view.set_filter(pattern, case_sensitive, &mut self.registry)?;
        self.publish_reorder();
        Ok(())
    }

    pub fn set_show_hidden(&mut self, show: bool) {
        self.view.set_show_hidden(show, &mut self.registry);
        self.publish_reorder();
    }

    pub fn set_show_system(&mut self, show: bool) {
        self.view.set_show_system(show, &mut self.registry);
        self.publish_reorder();
    }

    pub fn set_container_placement(&mut self, placement: ContainerPlacement) {
        self.view.set_container_placement(placement, &mut self.registry);
        self.publish_reorder();
    }

    /// Returns true when hiding the column changed the sort
    pub fn set_column_visible(&mut self, column: ColumnKind, visible: bool) -> bool {
        let resorted = self.view.set_column_visible(column, visible, &mut self.registry);
        if resorted {
            self.publish_reorder();
        }
        resorted
    }

    pub fn apply_settings(&mut self, settings: &FolderSettings) -> Result<(), EngineError> {
        self.view.apply_settings(settings, &mut self.registry)?;
        self.publish_reorder();
        Ok(())
    }

    // ===== Message loop =====

    /// Handle everything already queued. Returns the number of messages.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.inbox.try_recv() {
            self.handle(message);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for a message, then handle everything queued
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.inbox.recv_timeout(timeout) {
            Ok(message) => {
                self.handle(message);
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Pump until no navigation is loading, no enrichment is outstanding and
    /// the inbox is empty. False on timeout.
    pub fn run_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.pump();
            if !self.navigation.is_loading() && self.scheduler.pending_count() == 0 && self.inbox.is_empty() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.pump_timeout((deadline - now).min(Duration::from_millis(50)));
        }
    }

    /// Pump until the latest navigation finished. Returns its error if the
    /// container could not be opened.
    pub fn wait_for_navigation(&mut self, timeout: Duration) -> Result<(), EngineError> {
        let deadline = Instant::now() + timeout;
        while self.navigation.is_loading() {
            let now = Instant::now();
            if now >= deadline {
                return Err(EngineError::Timeout("navigation".into()));
            }
            self.pump_timeout(deadline - now);
        }
        match self.last_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn handle(&mut self, message: Inbound) {
        match message {
            Inbound::Enumeration(msg) => self.on_enumeration(msg),
            Inbound::Enriched(result) => self.on_enriched(result),
            Inbound::Change(change) => self.on_change(change),
        }
    }

    fn on_enumeration(&mut self, msg: EnumerationMsg) {
        match msg {
            EnumerationMsg::Started(request) => {
                if !self.navigation.opened(&request) {
                    tracing::debug!(request = request.id, "Superseded enumeration ignored");
                    return;
                }
                let epoch = self.registry.begin_epoch(request.target.clone());
                self.epoch_signal.store(epoch.0, Ordering::SeqCst);
                self.scheduler.begin_epoch(epoch);
                self.view.clear();
                self.deferred.clear();
                self.loading = Some(request);
            }
            EnumerationMsg::Batch { request, entries } => {
                if self.loading.as_ref().map(|r| r.id) != Some(request) {
                    return;
                }
                for raw in entries {
                    self.registry.stage(raw);
                }
            }
            EnumerationMsg::Finished { request, completion } => {
                let Some(loading) = self.loading.take_if(|r| r.id == request) else {
                    return;
                };
                self.commit(&loading, completion);
            }
            EnumerationMsg::Failed { request, error } => {
                if !self.navigation.fail(&request) {
                    return;
                }
                tracing::warn!(target = %request.target, error = %error, "Container could not be opened");
                self.surface.deliver(SurfaceEvent::NavigationFailed {
                    error: error.user_message(),
                });
                self.last_error = Some(error);
            }
        }
    }

    fn commit(&mut self, request: &NavigationRequest, completion: Completion) {
        let ids = self.registry.commit_staged();
        self.view.rebuild(&mut self.registry);
        self.publish_listing();

        if let Completion::Incomplete(reason) = completion {
            tracing::warn!(target = %request.target, %reason, committed = ids.len(), "Enumeration incomplete");
            self.surface.deliver(SurfaceEvent::EnumerationIncomplete { reason });
        } else {
            tracing::info!(target = %request.target, items = ids.len(), epoch = self.registry.epoch().0, "Listing committed");
        }
        self.navigation.finished(request);

        for change in std::mem::take(&mut self.deferred) {
            self.on_change(change);
        }
    }

    fn on_enriched(&mut self, result: EnrichmentResult) {
        if !self.registry.contains(result.target) {
            tracing::debug!(target_id = %result.target, "Enrichment for removed item dropped");
            return;
        }
        if self.scheduler.accept(&result) {
            self.apply_field(result.target, result.kind, result.payload);
        }
    }

    fn on_change(&mut self, change: StampedChange) {
        if self.registry.is_staging() && change.epoch == self.registry.epoch() {
            self.deferred.push(change);
            return;
        }
        let ops = self
            .reconciler
            .reconcile(&change, &self.registry, self.enumerator.as_ref());
        for op in ops {
            self.apply_op(op);
        }
    }

    fn apply_op(&mut self, op: ModelOp) {
        match op {
            ModelOp::Add(raw) => {
                if let Some(id) = self.registry.find_by_locator(&raw.locator) {
                    return self.apply_op(ModelOp::UpdateMetadata {
                        id,
                        attributes: raw.attributes,
                    });
                }
                let id = self.registry.add(raw);
                if let Some(index) = self.view.insert(&mut self.registry, id) {
                    if let Some(fields) = self.fields(id) {
                        self.surface.deliver(SurfaceEvent::Inserted { id, index, fields });
                    }
                }
                self.publish_groups_if_changed();
            }
            ModelOp::Remove(id) => {
                self.invalidate_cache(id);
                let index = self.view.remove(&mut self.registry, id);
                self.registry.remove(id);
                self.scheduler.forget(id);
                if index.is_some() {
                    self.surface.deliver(SurfaceEvent::Removed { id });
                }
                self.publish_groups_if_changed();
            }
            ModelOp::Rename { id, entry } => {
                self.invalidate_cache(id);
                if self.registry.rename(id, entry) {
                    self.scheduler.forget(id);
                    self.refresh_entry(id);
                }
            }
            ModelOp::UpdateMetadata { id, attributes } => {
                self.invalidate_cache(id);
                if self.registry.update_metadata(self.registry.epoch(), id, attributes) {
                    if let Some(entry) = self.registry.get_mut(id) {
                        entry.clear_enrichment();
                    }
                    self.scheduler.forget(id);
                    self.refresh_entry(id);
                }
            }
            ModelOp::ReplaceContainer(container) => {
                self.registry.set_container(container.clone());
                self.navigation.container_moved(container.clone());
                self.requests.push(ConsumerRequest::ContainerMoved(container));
            }
            ModelOp::Refresh => {
                self.refresh();
            }
            ModelOp::FallbackNavigate(target) => {
                self.requests.push(ConsumerRequest::Navigate(target));
            }
        }
    }

    fn invalidate_cache(&self, id: InternalId) {
        if let Some(locator) = self.registry.full_locator(id) {
            self.scheduler.invalidate(&locator);
        }
    }

    /// Re-place a changed entry and tell the surface how it moved
    fn refresh_entry(&mut self, id: InternalId) {
        let placement = self.view.refresh_item(&mut self.registry, id);
        let Some(fields) = self.fields(id) else {
            return;
        };
        let event = match (placement.before, placement.after) {
            (Some(from), Some(to)) if from == to => Some(SurfaceEvent::Updated { id, fields }),
            (Some(from), Some(to)) => Some(SurfaceEvent::Moved { id, from, to, fields }),
            (None, Some(index)) => Some(SurfaceEvent::Inserted { id, index, fields }),
            (Some(_), None) => Some(SurfaceEvent::Removed { id }),
            (None, None) => None,
        };
        if let Some(event) = event {
            self.surface.deliver(event);
        }
        self.publish_groups_if_changed();
    }

    fn fields(&self, id: InternalId) -> Option<DisplayFields> {
        self.registry.get(id).map(DisplayFields::from)
    }

    fn visible_items(&self) -> Vec<(InternalId, DisplayFields)> {
        self.view
            .order()
            .iter()
            .filter_map(|&id| self.fields(id).map(|f| (id, f)))
            .collect()
    }

    fn publish_listing(&mut self) {
        self.view.take_groups_changed();
        let event = SurfaceEvent::Listing {
            epoch: self.registry.epoch(),
            items: self.visible_items(),
            groups: self.view.groups(),
        };
        self.surface.deliver(event);
    }

    /// Settings changed mid-enumeration reach the surface with the committed
    /// `Listing`; until then it keeps showing the previous container.
    fn publish_reorder(&mut self) {
        if self.registry.is_staging() {
            return;
        }
        let items = self.visible_items();
        self.surface.deliver(SurfaceEvent::Reordered { items });
        self.publish_groups_if_changed();
    }

    fn publish_groups_if_changed(&mut self) {
        if self.view.take_groups_changed() {
            let groups = self.view.groups();
            self.surface.deliver(SurfaceEvent::GroupsChanged { groups });
        }
    }

    // ===== Accessors =====

    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    pub fn view(&self) -> &ViewEngine {
        &self.view
    }

    pub fn navigation(&self) -> &NavigationController {
        &self.navigation
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn epoch(&self) -> Epoch {
        self.registry.epoch()
    }

    pub fn current_container(&self) -> Option<&Locator> {
        self.registry.container()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.scheduler.cache_stats()
    }
}

/// Runs on the enumeration worker
fn enumerate_container<E: Enumerator + ?Sized>(
    enumerator: &E,
    request: NavigationRequest,
    tx: &Sender<Inbound>,
    latest: &AtomicU64,
    batch_size: usize,
) {
    let id = request.id;
    let superseded = || latest.load(Ordering::SeqCst) != id;
    if superseded() {
        return;
    }
    let send = |msg: EnumerationMsg| tx.send(Inbound::Enumeration(msg)).is_ok();

    let stream = match enumerator.enumerate(&request.target) {
        Ok(stream) => stream,
        Err(e) => {
            send(EnumerationMsg::Failed {
                request,
                error: e.into(),
            });
            return;
        }
    };
    if !send(EnumerationMsg::Started(request)) {
        return;
    }

    let mut batch = Vec::with_capacity(batch_size);
    let mut completion = Completion::Complete;
    for item in stream {
        if superseded() {
            completion = Completion::Incomplete("cancelled by a newer navigation".into());
            break;
        }
        match item {
            Ok(raw) => {
                batch.push(raw);
                if batch.len() >= batch_size {
                    let entries = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                    send(EnumerationMsg::Batch { request: id, entries });
                }
            }
            Err(e) => {
                completion = Completion::Incomplete(e.to_string());
                break;
            }
        }
    }
    if !batch.is_empty() {
        send(EnumerationMsg::Batch { request: id, entries: batch });
    }
    send(EnumerationMsg::Finished { request: id, completion });
}
