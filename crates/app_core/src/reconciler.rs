//! ChangeReconciler - turns change notifications into model operations
//!
//! Pure decision logic: reads the registry and the enumerator, never mutates
//! either. The listing engine applies the returned `ModelOp`s.

use crate::entry::{Epoch, InternalId};
use crate::registry::ItemRegistry;
use app_fs::{ChangeEvent, ChangeKind, Enumerator, ItemAttributes, Locator, RawEntry};

/// A change notification tagged with the epoch current when it was queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedChange {
    pub epoch: Epoch,
    pub event: ChangeEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelOp {
    Add(RawEntry),
    Remove(InternalId),
    Rename { id: InternalId, entry: RawEntry },
    UpdateMetadata { id: InternalId, attributes: ItemAttributes },
    /// The container moved; substitute its locator, keep every entry
    ReplaceContainer(Locator),
    /// Contents changed in an unspecified way; re-enumerate
    Refresh,
    /// The container is gone; navigate here instead
    FallbackNavigate(Locator),
}

#[derive(Debug, Default)]
pub struct ChangeReconciler {
    /// Epoch in which a fallback was already requested
    fallback_epoch: Option<Epoch>,
}

impl ChangeReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconcile<E>(&mut self, change: &StampedChange, registry: &ItemRegistry, enumerator: &E) -> Vec<ModelOp>
    where
        E: Enumerator + ?Sized,
    {
        if change.epoch != registry.epoch() {
            tracing::debug!(
                stale = change.epoch.0,
                current = registry.epoch().0,
                event = ?change.event.kind,
                "Stale change dropped"
            );
            return Vec::new();
        }
        let Some(container) = registry.container().cloned() else {
            return Vec::new();
        };

        let event = &change.event;
        let before = &event.before;
        match event.kind {
            ChangeKind::Created => created(before, &container, registry, enumerator),
            ChangeKind::Removed => self.removed(before, &container, registry, enumerator),
            ChangeKind::Renamed => match &event.after {
                Some(after) => self.renamed(before, after, &container, registry, enumerator),
                None => self.removed(before, &container, registry, enumerator),
            },
            ChangeKind::Modified => modified(before, registry, enumerator),
            ChangeKind::ContentsChanged => {
                if *before == container || before.is_child_of(&container) {
                    vec![ModelOp::Refresh]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn removed<E>(&mut self, before: &Locator, container: &Locator, registry: &ItemRegistry, enumerator: &E) -> Vec<ModelOp>
    where
        E: Enumerator + ?Sized,
    {
        if before.is_same_or_ancestor_of(container) {
            return self.invalidated(container, registry.epoch(), enumerator);
        }
        registry
            .find_by_locator(before)
            .map(ModelOp::Remove)
            .into_iter()
            .collect()
    }

    fn renamed<E>(
        &mut self,
        before: &Locator,
        after: &Locator,
        container: &Locator,
        registry: &ItemRegistry,
        enumerator: &E,
    ) -> Vec<ModelOp>
    where
        E: Enumerator + ?Sized,
    {
        if before.is_same_or_ancestor_of(container) {
            return match container.rebase(before, after) {
                Some(moved) if enumerator.exists(&moved) => {
                    tracing::info!(from = %container, to = %moved, "Container moved");
                    vec![ModelOp::ReplaceContainer(moved)]
                }
                _ => self.invalidated(container, registry.epoch(), enumerator),
            };
        }

        let into_container = after.is_child_of(container);
        match (registry.find_by_locator(before), into_container) {
            (Some(id), true) => {
                let mut ops = Vec::new();
                // Renamed over an existing item
                if let Some(existing) = registry.find_by_locator(after) {
                    if existing != id {
                        ops.push(ModelOp::Remove(existing));
                    }
                }
                let entry = enumerator.resolve(after).unwrap_or_else(|_| {
                    let attributes = registry.get(id).map(|e| e.attributes.clone()).unwrap_or_default();
                    RawEntry::new(after.clone(), attributes)
                });
                ops.push(ModelOp::Rename { id, entry });
                ops
            }
            (Some(id), false) => vec![ModelOp::Remove(id)],
            (None, true) => created(after, container, registry, enumerator),
            (None, false) => Vec::new(),
        }
    }

    /// Walk up to the nearest existing ancestor. At most one fallback is
    /// requested per epoch.
    fn invalidated<E>(&mut self, container: &Locator, epoch: Epoch, enumerator: &E) -> Vec<ModelOp>
    where
        E: Enumerator + ?Sized,
    {
        if self.fallback_epoch == Some(epoch) {
            tracing::debug!(%container, "Fallback already requested for this epoch");
            return Vec::new();
        }
        self.fallback_epoch = Some(epoch);

        let target = container
            .ancestors()
            .find(|a| enumerator.exists(a))
            .unwrap_or_else(|| container.root());
        tracing::info!(%container, fallback = %target, "Container invalidated");
        vec![ModelOp::FallbackNavigate(target)]
    }
}

fn created<E>(locator: &Locator, container: &Locator, registry: &ItemRegistry, enumerator: &E) -> Vec<ModelOp>
where
    E: Enumerator + ?Sized,
{
    if !locator.is_child_of(container) {
        return Vec::new();
    }
    match enumerator.resolve(locator) {
        Ok(raw) => match registry.find_by_locator(locator) {
            Some(id) => vec![ModelOp::UpdateMetadata {
                id,
                attributes: raw.attributes,
            }],
            None => vec![ModelOp::Add(raw)],
        },
        Err(e) => {
            // Already gone again; a later rename from this name adds it
            tracing::debug!(%locator, error = %e, "Created item could not be resolved");
            Vec::new()
        }
    }
}

fn modified<E>(locator: &Locator, registry: &ItemRegistry, enumerator: &E) -> Vec<ModelOp>
where
    E: Enumerator + ?Sized,
{
    let Some(id) = registry.find_by_locator(locator) else {
        return Vec::new();
    };
    match enumerator.resolve(locator) {
        Ok(raw) => vec![ModelOp::UpdateMetadata {
            id,
            attributes: raw.attributes,
        }],
        Err(e) => {
            tracing::debug!(%locator, error = %e, "Modified item could not be resolved");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use app_fs::MemoryEnumerator;

    struct Fixture {
        fs: MemoryEnumerator,
        reg: ItemRegistry,
        rec: ChangeReconciler,
    }

    impl Fixture {
        /// `/data/docs` holding a.txt and b.txt
        fn new() -> Self {
            let fs = MemoryEnumerator::new();
            fs.insert_file("/data/docs/a.txt", 1);
            fs.insert_file("/data/docs/b.txt", 2);

            let mut reg = ItemRegistry::new();
            let container = Locator::new("/data/docs");
            reg.begin_epoch(container.clone());
            for raw in fs.enumerate(&container).unwrap() {
                reg.stage(raw.unwrap());
            }
            reg.commit_staged();
            Self {
                fs,
                reg,
                rec: ChangeReconciler::new(),
            }
        }

        fn apply(&mut self, event: ChangeEvent) -> Vec<ModelOp> {
            let change = StampedChange {
                epoch: self.reg.epoch(),
                event,
            };
            self.rec.reconcile(&change, &self.reg, &self.fs)
        }

        fn id(&self, path: &str) -> InternalId {
            self.reg.find_by_locator(&Locator::new(path)).unwrap()
        }
    }

    #[test]
    fn test_created_child_added_once() {
        let mut fx = Fixture::new();
        fx.fs.insert_file("/data/docs/c.txt", 3);
        let ops = fx.apply(ChangeEvent::created("/data/docs/c.txt"));
        assert!(matches!(&ops[..], [ModelOp::Add(raw)] if raw.display_name == "c.txt"));

        // Known name: metadata refresh instead of a duplicate
        let ops = fx.apply(ChangeEvent::created("/data/docs/a.txt"));
        assert!(matches!(&ops[..], [ModelOp::UpdateMetadata { .. }]));

        assert!(fx.apply(ChangeEvent::created("/data/other.txt")).is_empty());
        assert!(fx.apply(ChangeEvent::created("/data/docs/ghost.txt")).is_empty());
    }

    #[test]
    fn test_rename_in_place_keeps_identity() {
        let mut fx = Fixture::new();
        let a = fx.id("/data/docs/a.txt");
        fx.fs.rename("/data/docs/a.txt", "/data/docs/a2.txt");

        let ops = fx.apply(ChangeEvent::renamed("/data/docs/a.txt", "/data/docs/a2.txt"));
        match &ops[..] {
            [ModelOp::Rename { id, entry }] => {
                assert_eq!(*id, a);
                assert_eq!(entry.display_name, "a2.txt");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rename_over_existing_removes_target() {
        let mut fx = Fixture::new();
        let (a, b) = (fx.id("/data/docs/a.txt"), fx.id("/data/docs/b.txt"));
        let ops = fx.apply(ChangeEvent::renamed("/data/docs/a.txt", "/data/docs/b.txt"));
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0], ModelOp::Remove(b));
        assert!(matches!(&ops[1], ModelOp::Rename { id, .. } if *id == a));
    }

    #[test]
    fn test_rename_across_container_boundary() {
        let mut fx = Fixture::new();
        let a = fx.id("/data/docs/a.txt");
        assert_eq!(
            fx.apply(ChangeEvent::renamed("/data/docs/a.txt", "/data/a.txt")),
            vec![ModelOp::Remove(a)]
        );

        fx.fs.insert_file("/data/docs/in.txt", 4);
        let ops = fx.apply(ChangeEvent::renamed("/data/in.txt", "/data/docs/in.txt"));
        assert!(matches!(&ops[..], [ModelOp::Add(raw)] if raw.display_name == "in.txt"));

        // Old name never seen (its create could not be resolved)
        fx.fs.insert_file("/data/docs/final.txt", 4);
        let ops = fx.apply(ChangeEvent::renamed("/data/docs/~tmp", "/data/docs/final.txt"));
        assert!(matches!(&ops[..], [ModelOp::Add(raw)] if raw.display_name == "final.txt"));
    }

    #[test]
    fn test_container_removed_single_fallback() {
        let mut fx = Fixture::new();
        fx.fs.remove("/data/docs");

        let ops = fx.apply(ChangeEvent::removed("/data/docs"));
        assert_eq!(ops, vec![ModelOp::FallbackNavigate(Locator::new("/data"))]);
        assert!(fx.apply(ChangeEvent::removed("/data/docs")).is_empty());
    }

    #[test]
    fn test_ancestor_removed_falls_back_to_root() {
        let mut fx = Fixture::new();
        fx.fs.remove("/data");
        let ops = fx.apply(ChangeEvent::removed("/data"));
        assert_eq!(ops, vec![ModelOp::FallbackNavigate(Locator::new("/"))]);
    }

    #[test]
    fn test_container_rename_substitutes() {
        let mut fx = Fixture::new();
        fx.fs.rename("/data", "/archive");
        let ops = fx.apply(ChangeEvent::renamed("/data", "/archive"));
        assert_eq!(ops, vec![ModelOp::ReplaceContainer(Locator::new("/archive/docs"))]);
    }

    #[test]
    fn test_container_rename_to_missing_invalidates() {
        let mut fx = Fixture::new();
        fx.fs.remove("/data/docs");
        let ops = fx.apply(ChangeEvent::renamed("/data/docs", "/data/gone"));
        assert_eq!(ops, vec![ModelOp::FallbackNavigate(Locator::new("/data"))]);
    }

    #[test]
    fn test_modified_and_contents_changed() {
        let mut fx = Fixture::new();
        let a = fx.id("/data/docs/a.txt");
        fx.fs.set_attributes("/data/docs/a.txt", ItemAttributes::file(99));

        let ops = fx.apply(ChangeEvent::modified("/data/docs/a.txt"));
        assert_eq!(
            ops,
            vec![ModelOp::UpdateMetadata {
                id: a,
                attributes: ItemAttributes::file(99)
            }]
        );
        assert_eq!(fx.apply(ChangeEvent::contents_changed("/data/docs")), vec![ModelOp::Refresh]);
        assert!(fx.apply(ChangeEvent::contents_changed("/elsewhere")).is_empty());
    }

    #[test]
    fn test_stale_epoch_dropped() {
        let mut fx = Fixture::new();
        let stale = StampedChange {
            epoch: Epoch(fx.reg.epoch().0 - 1),
            event: ChangeEvent::removed("/data/docs/a.txt"),
        };
        assert!(fx.rec.reconcile(&stale, &fx.reg, &fx.fs).is_empty());
    }
}
