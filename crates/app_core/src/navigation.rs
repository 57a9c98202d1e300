//! NavigationController - which container is shown, which one is loading
//!
//! History only changes once the target container actually opened, so a
//! failed navigation leaves back/forward exactly as they were.

use app_fs::Locator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    Normal,
    Back,
    Forward,
    Up,
    Refresh,
    /// Issued after the displayed container disappeared
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    pub id: u64,
    pub target: Locator,
    pub kind: NavigationKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationPhase {
    Idle,
    Loading(NavigationRequest),
    Ready,
}

pub struct NavigationController {
    current: Option<Locator>,
    history: Vec<Locator>,
    forward: Vec<Locator>,
    phase: NavigationPhase,
    next_request: u64,
    /// Id of the newest request; enumeration workers poll it to stop early
    latest: Arc<AtomicU64>,
}

impl NavigationController {
    pub fn new() -> Self {
        Self {
            current: None,
            history: Vec::new(),
            forward: Vec::new(),
            phase: NavigationPhase::Idle,
            next_request: 0,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start loading `target`. Supersedes any request still loading.
    pub fn begin(&mut self, target: Locator, kind: NavigationKind) -> NavigationRequest {
        self.next_request += 1;
        let request = NavigationRequest {
            id: self.next_request,
            target,
            kind,
        };
        self.latest.store(request.id, Ordering::SeqCst);
        if let NavigationPhase::Loading(old) = &self.phase {
            tracing::debug!(superseded = old.id, "Navigation superseded");
        }
        tracing::info!(request = request.id, target = %request.target, ?kind, "Navigation started");
        self.phase = NavigationPhase::Loading(request.clone());
        request
    }

    pub fn go_back(&mut self) -> Option<NavigationRequest> {
        let target = self.history.last()?.clone();
        Some(self.begin(target, NavigationKind::Back))
    }

    pub fn go_forward(&mut self) -> Option<NavigationRequest> {
        let target = self.forward.last()?.clone();
        Some(self.begin(target, NavigationKind::Forward))
    }

    pub fn go_up(&mut self) -> Option<NavigationRequest> {
        let target = self.current.as_ref()?.parent()?;
        Some(self.begin(target, NavigationKind::Up))
    }

    pub fn refresh(&mut self) -> Option<NavigationRequest> {
        let target = self.current.clone()?;
        Some(self.begin(target, NavigationKind::Refresh))
    }

    /// The target of `request` opened. Applies the history change for its
    /// kind and makes it current. False for a superseded request.
    pub fn opened(&mut self, request: &NavigationRequest) -> bool {
        if !self.is_current(request) {
            return false;
        }
        let previous = self.current.take();
        match request.kind {
            NavigationKind::Normal | NavigationKind::Up | NavigationKind::Fallback => {
                if let Some(prev) = previous {
                    if prev != request.target {
                        self.history.push(prev);
                    }
                }
                self.forward.clear();
            }
            NavigationKind::Back => {
                self.history.pop();
                self.forward.extend(previous);
            }
            NavigationKind::Forward => {
                self.forward.pop();
                self.history.extend(previous);
            }
            NavigationKind::Refresh => {}
        }
        self.current = Some(request.target.clone());
        true
    }

    /// Enumeration for `request` finished, fully or partially
    pub fn finished(&mut self, request: &NavigationRequest) -> bool {
        if !self.is_current(request) {
            return false;
        }
        self.phase = NavigationPhase::Ready;
        true
    }

    /// `request` could not open its target. The previous container stays.
    pub fn fail(&mut self, request: &NavigationRequest) -> bool {
        if !self.is_current(request) {
            return false;
        }
        tracing::info!(request = request.id, target = %request.target, "Navigation failed");
        self.phase = if self.current.is_some() {
            NavigationPhase::Ready
        } else {
            NavigationPhase::Idle
        };
        true
    }

    pub fn is_current(&self, request: &NavigationRequest) -> bool {
        matches!(&self.phase, NavigationPhase::Loading(r) if r.id == request.id)
    }

    /// The displayed container moved; history entries below it move along
    pub fn container_moved(&mut self, to: Locator) {
        let Some(from) = self.current.clone() else {
            return;
        };
        for entry in self.history.iter_mut().chain(self.forward.iter_mut()) {
            if let Some(moved) = entry.rebase(&from, &to) {
                *entry = moved;
            }
        }
        self.current = Some(to);
    }

    /// Shared id of the newest request
    pub fn latest_signal(&self) -> Arc<AtomicU64> {
        self.latest.clone()
    }

    pub fn current(&self) -> Option<&Locator> {
        self.current.as_ref()
    }

    pub fn phase(&self) -> &NavigationPhase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, NavigationPhase::Loading(_))
    }

    pub fn can_go_back(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn can_go_forward(&self) -> bool {
        !self.forward.is_empty()
    }

    pub fn history(&self) -> &[Locator] {
        &self.history
    }
}

impl Default for NavigationController {
    fn default() -> Self {
        Self::new()
    }
}
