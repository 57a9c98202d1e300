//! Fakes shared by the unit tests

use crate::columns::ColumnKind;
use crate::enrichment::{EnrichmentProvider, Icon, Thumbnail};
use crate::entry::{InternalId, ItemSnapshot};
use crate::error::EnrichError;
use crate::registry::ItemRegistry;
use app_fs::{EntryStream, Enumerator, ItemAttributes, Locator, MemoryEnumerator, RawEntry};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Provider answering from the item name. Optionally each call waits for a
/// token on a gate channel first.
pub(crate) struct FakeProvider {
    calls: AtomicUsize,
    gate: Option<Receiver<()>>,
    failing: Vec<String>,
    panicking: Vec<String>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            gate: None,
            failing: Vec::new(),
            panicking: Vec::new(),
        }
    }

    /// Every call blocks until a `()` is sent on the returned sender
    pub fn gated() -> (Arc<Self>, Sender<()>) {
        let (tx, rx) = unbounded();
        let provider = Self {
            gate: Some(rx),
            ..Self::new()
        };
        (Arc::new(provider), tx)
    }

    /// Calls for this display name fail
    pub fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    /// Calls for this display name panic
    pub fn panicking(mut self, name: &str) -> Self {
        self.panicking.push(name.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn wait_for_calls(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.calls() < count && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(self.calls() >= count, "provider saw {} calls, wanted {}", self.calls(), count);
    }

    fn enter(&self, item: &ItemSnapshot) -> Result<(), EnrichError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _ = gate.recv_timeout(Duration::from_secs(5));
        }
        if self.panicking.contains(&item.display_name) {
            panic!("provider blew up on {}", item.display_name);
        }
        if self.failing.contains(&item.display_name) {
            return Err(EnrichError::NotFound(item.display_name.clone()));
        }
        Ok(())
    }
}

impl EnrichmentProvider for FakeProvider {
    fn icon(&self, item: &ItemSnapshot) -> Result<Icon, EnrichError> {
        self.enter(item)?;
        Ok(Icon {
            glyph: item.display_name.chars().next().unwrap_or('?'),
            color: "#ffffff".to_string(),
        })
    }

    fn thumbnail(&self, item: &ItemSnapshot) -> Result<Thumbnail, EnrichError> {
        self.enter(item)?;
        Err(EnrichError::Unsupported(item.display_name.clone()))
    }

    fn column_text(&self, item: &ItemSnapshot, column: ColumnKind) -> Result<String, EnrichError> {
        self.enter(item)?;
        Ok(format!("{}:{:?}", item.display_name, column))
    }

    fn info_tip(&self, item: &ItemSnapshot) -> Result<String, EnrichError> {
        self.enter(item)?;
        Ok(format!("tip:{}", item.display_name))
    }
}

/// Committed registry for container `/d` holding one 1-byte file per name
pub(crate) fn registry_with(names: &[&str]) -> (ItemRegistry, Vec<InternalId>) {
    let mut reg = ItemRegistry::new();
    reg.begin_epoch(Locator::new("/d"));
    for name in names {
        reg.stage(RawEntry::new(Locator::new(format!("/d/{}", name)), ItemAttributes::file(1)));
    }
    let ids = reg.commit_staged();
    (reg, ids)
}

/// Enumerator whose streams block before their first item until a `()`
/// arrives on the returned sender
pub(crate) struct GatedEnumerator {
    inner: MemoryEnumerator,
    gate: Receiver<()>,
}

impl GatedEnumerator {
    pub fn new(inner: MemoryEnumerator) -> (Self, Sender<()>) {
        let (tx, rx) = unbounded();
        (Self { inner, gate: rx }, tx)
    }
}

impl Enumerator for GatedEnumerator {
    fn enumerate(&self, container: &Locator) -> app_fs::Result<EntryStream> {
        let stream = self.inner.enumerate(container)?;
        let gate = self.gate.clone();
        let wait = std::iter::once_with(move || {
            let _ = gate.recv_timeout(Duration::from_secs(5));
        });
        Ok(Box::new(wait.filter_map(|()| None::<app_fs::Result<RawEntry>>).chain(stream)))
    }

    fn resolve(&self, locator: &Locator) -> app_fs::Result<RawEntry> {
        self.inner.resolve(locator)
    }

    fn exists(&self, locator: &Locator) -> bool {
        self.inner.exists(locator)
    }
}
