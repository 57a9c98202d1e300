//! Locator-keyed enrichment cache shared by the model thread and workers

use super::{EnrichmentKind, Payload};
use crate::entry::ItemSnapshot;
use app_fs::ItemAttributes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use xxhash_rust::xxh3::xxh3_64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    locator: u64,
    kind: EnrichmentKind,
    /// Changes whenever size or timestamps change, so stale payloads miss
    fingerprint: u64,
}

impl CacheKey {
    pub fn new(item: &ItemSnapshot, kind: EnrichmentKind) -> Self {
        Self {
            locator: item.locator.id(),
            kind,
            fingerprint: fingerprint(&item.attributes),
        }
    }
}

fn fingerprint(attributes: &ItemAttributes) -> u64 {
    let mut bytes = Vec::with_capacity(18);
    bytes.extend_from_slice(&attributes.size.to_le_bytes());
    let modified = attributes
        .modified
        .and_then(|m| m.timestamp_nanos_opt())
        .unwrap_or(i64::MIN);
    bytes.extend_from_slice(&modified.to_le_bytes());
    bytes.push(attributes.is_container as u8);
    bytes.push(attributes.is_metadata_valid as u8);
    xxh3_64(&bytes)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct EnrichmentCache {
    entries: DashMap<CacheKey, Payload>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EnrichmentCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Payload> {
        match self.entries.get(key) {
            Some(payload) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(payload.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a successful payload. Failures are never cached.
    pub fn insert(&self, key: CacheKey, payload: Payload) {
        if matches!(payload, Payload::Unavailable) {
            return;
        }
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.evict();
        }
        self.entries.insert(key, payload);
    }

    /// Drop every payload cached for the locator with this id
    pub fn invalidate_locator(&self, locator_id: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.locator != locator_id);
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    // DashMap keeps no recency order, so a fifth of arbitrary entries go
    fn evict(&self) {
        let count = (self.capacity / 5).max(1);
        let victims: Vec<CacheKey> = self.entries.iter().take(count).map(|e| *e.key()).collect();
        for key in victims {
            self.entries.remove(&key);
        }
        tracing::debug!(evicted = count, "Enrichment cache full");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnKind;
    use crate::entry::InternalId;
    use app_fs::Locator;

    fn item(path: &str, size: u64) -> ItemSnapshot {
        ItemSnapshot {
            id: InternalId(1),
            locator: Locator::new(path),
            display_name: path.rsplit('/').next().unwrap_or(path).to_string(),
            attributes: ItemAttributes::file(size),
        }
    }

    #[test]
    fn test_metadata_change_misses() {
        let cache = EnrichmentCache::new(16);
        let kind = EnrichmentKind::Column(ColumnKind::Size);
        cache.insert(CacheKey::new(&item("/d/a", 1), kind), Payload::Text("1 B".into()));

        assert_eq!(
            cache.get(&CacheKey::new(&item("/d/a", 1), kind)),
            Some(Payload::Text("1 B".into()))
        );
        assert_eq!(cache.get(&CacheKey::new(&item("/d/a", 2), kind)), None);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, entries: 1 });
    }

    #[test]
    fn test_unavailable_not_cached() {
        let cache = EnrichmentCache::new(16);
        cache.insert(CacheKey::new(&item("/d/a", 1), EnrichmentKind::Icon), Payload::Unavailable);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_and_capacity() {
        let cache = EnrichmentCache::new(5);
        for i in 0..5 {
            let path = format!("/d/{}", i);
            cache.insert(CacheKey::new(&item(&path, 1), EnrichmentKind::InfoTip), Payload::Text(path));
        }
        assert_eq!(cache.len(), 5);
        cache.insert(CacheKey::new(&item("/d/x", 1), EnrichmentKind::InfoTip), Payload::Text("x".into()));
        assert!(cache.len() <= 5);

        let x = Locator::new("/d/x");
        assert_eq!(cache.invalidate_locator(x.id()), 1);
        assert_eq!(cache.get(&CacheKey::new(&item("/d/x", 1), EnrichmentKind::InfoTip)), None);
    }
}
