//! Loop-Suppression Cache: a bounded, TTL-expiring memo of
//! `(ElementRef, valueHash)` used to break OPC UA ⇄ AAS feedback loops
//! (spec §3, §4.5, §4.6). Shared between Monitor and Controller; the spec
//! does not guarantee single-writer-per-key, so access is mutex-protected
//! rather than sharded, mirroring the teacher's `Arc<RwLock<...>>` state
//! pattern in `health/mod.rs`.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::model::ElementRef;

type Key = (ElementRef, Vec<u8>);

struct Inner {
    entries: HashMap<Key, Instant>,
    /// Insertion order, oldest first, for LRU eviction. May contain stale
    /// duplicate keys after a refresh; `entries` is the source of truth.
    order: VecDeque<Key>,
}

pub struct LoopSuppressionCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
}

pub const DEFAULT_CAPACITY: usize = 2048;

impl LoopSuppressionCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
            capacity,
            ttl,
        }
    }

    /// Insert `(element_ref, hash)` after a successful write, evicting the
    /// least-recently-inserted entry if the cache is at capacity (spec §3
    /// invariant: never more than `capacity` entries).
    pub async fn insert(&self, element_ref: ElementRef, hash: Vec<u8>) {
        let key = (element_ref, hash);
        let mut inner = self.inner.lock().await;

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            while let Some(oldest) = inner.order.pop_front() {
                if inner.entries.remove(&oldest).is_some() {
                    break;
                }
            }
        }

        inner.entries.insert(key.clone(), Instant::now());
        inner.order.push_back(key);
    }

    /// Returns true if `(element_ref, hash)` is present and unexpired.
    /// An expired hit is evicted on the spot (spec §3: "evicts... by TTL
    /// during lookup"), not just reported as a non-match.
    pub async fn contains(&self, element_ref: &ElementRef, hash: &[u8]) -> bool {
        let key = (element_ref.clone(), hash.to_vec());
        let mut inner = self.inner.lock().await;
        match inner.entries.get(&key) {
            Some(inserted_at) if inserted_at.elapsed() < self.ttl => true,
            Some(_) => {
                inner.entries.remove(&key);
                false
            }
            None => false,
        }
    }

    /// Current entry count, exposed for the `bridge_loop_suppression_cache_size`
    /// gauge.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn er(path: &str) -> ElementRef {
        ElementRef::new("urn:sm", path)
    }

    #[tokio::test]
    async fn insert_then_contains() {
        let cache = LoopSuppressionCache::new(10, Duration::from_secs(60));
        cache.insert(er("Temperature"), vec![1, 2, 3]).await;
        assert!(cache.contains(&er("Temperature"), &[1, 2, 3]).await);
        assert!(!cache.contains(&er("Temperature"), &[9, 9, 9]).await);
        assert!(!cache.contains(&er("Other"), &[1, 2, 3]).await);
    }

    #[tokio::test]
    async fn bounded_by_capacity_lru_eviction() {
        let cache = LoopSuppressionCache::new(2, Duration::from_secs(60));
        cache.insert(er("A"), vec![1]).await;
        cache.insert(er("B"), vec![1]).await;
        cache.insert(er("C"), vec![1]).await;

        assert_eq!(cache.len().await, 2);
        assert!(!cache.contains(&er("A"), &[1]).await);
        assert!(cache.contains(&er("B"), &[1]).await);
        assert!(cache.contains(&er("C"), &[1]).await);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_not_honored_as_matches() {
        let cache = LoopSuppressionCache::new(10, Duration::from_millis(50));
        cache.insert(er("Temperature"), vec![1]).await;
        assert!(cache.contains(&er("Temperature"), &[1]).await);

        tokio::time::advance(Duration::from_millis(60)).await;

        assert!(!cache.contains(&er("Temperature"), &[1]).await);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_lookup_evicts_the_entry() {
        let cache = LoopSuppressionCache::new(10, Duration::from_millis(50));
        cache.insert(er("Temperature"), vec![1]).await;
        assert_eq!(cache.len().await, 1);

        tokio::time::advance(Duration::from_millis(60)).await;

        assert!(!cache.contains(&er("Temperature"), &[1]).await);
        assert_eq!(cache.len().await, 0);
    }
}
