//! In-process result cache for summaries and insights.
//!
//! `BoundedCache` is an LRU map with a TTL. `Memo` wraps any `ResultCache` and
//! makes concurrent computations of the same key share one call.

use parking_lot::Mutex;
use pivot_core::{ResultCache, Result};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_CAPACITY: usize = 500;
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

struct Entry {
    value: String,
    inserted_at: Instant,
}

struct Inner {
    entries: HashMap<String, Entry>,
    /// Least recently used at the front.
    order: VecDeque<String>,
}

/// Capacity 0 stores nothing.
pub struct BoundedCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
}

impl BoundedCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity.min(1024)),
                order: VecDeque::new(),
            }),
            capacity,
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BoundedCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl Inner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn forget(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

impl ResultCache for BoundedCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        let expired = inner.entries.get(key)?.inserted_at.elapsed() >= self.ttl;
        if expired {
            inner.forget(key);
            return None;
        }
        inner.touch(key);
        inner.entries.get(key).map(|e| e.value.clone())
    }

    fn set(&self, key: &str, value: String) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(key) {
            inner.touch(key);
        } else {
            while inner.entries.len() >= self.capacity {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                inner.entries.remove(&oldest);
            }
            inner.order.push_back(key.to_string());
        }
        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }
}

/// Cache lookup plus single-flight computation per key.
#[derive(Clone)]
pub struct Memo {
    cache: Arc<dyn ResultCache>,
    inflight: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl Memo {
    pub fn new(cache: Arc<dyn ResultCache>) -> Self {
        Self {
            cache,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Cached value, or the result of `compute` (stored on success). The bool is
    /// true when the value came from the cache. Errors are never cached.
    pub async fn get_or_try_compute<F, Fut>(&self, key: &str, compute: F) -> Result<(String, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        if let Some(v) = self.cache.get(key) {
            return Ok((v, true));
        }

        let slot = InflightSlot {
            inflight: &self.inflight,
            key,
            lock: self
                .inflight
                .lock()
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone(),
        };
        let _guard = slot.lock.lock().await;

        // Someone else may have filled it while we waited.
        if let Some(v) = self.cache.get(key) {
            return Ok((v, true));
        }

        let v = compute().await?;
        self.cache.set(key, v.clone());
        Ok((v, false))
    }
}

/// Holds a key's single-flight lock; removes the map entry on drop (including when the
/// caller's future is cancelled) once no other caller references it.
struct InflightSlot<'a> {
    inflight: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    key: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock();
        let ours = inflight
            .get(self.key)
            .is_some_and(|l| Arc::ptr_eq(l, &self.lock));
        // Our clone plus the map's: nobody else is waiting.
        if ours && Arc::strong_count(&self.lock) <= 2 {
            inflight.remove(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pivot_core::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn hit_and_miss() {
        let c = BoundedCache::new(10, Duration::from_secs(60));
        assert!(c.get("a").is_none());
        c.set("a", "1".into());
        assert_eq!(c.get("a").as_deref(), Some("1"));
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn evicts_least_recently_used() {
        let c = BoundedCache::new(2, Duration::from_secs(60));
        c.set("a", "1".into());
        c.set("b", "2".into());
        assert!(c.get("a").is_some());
        c.set("c", "3".into());
        assert!(c.get("b").is_none());
        assert!(c.get("a").is_some());
        assert!(c.get("c").is_some());
    }

    #[test]
    fn expired_entries_miss() {
        let c = BoundedCache::new(4, Duration::from_millis(0));
        c.set("a", "1".into());
        assert!(c.get("a").is_none());
        assert!(c.is_empty());
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let c = BoundedCache::new(0, Duration::from_secs(60));
        c.set("a", "1".into());
        assert!(c.get("a").is_none());
    }

    #[tokio::test]
    async fn second_call_is_cached() {
        let memo = Memo::new(Arc::new(BoundedCache::default()));
        let (v, cached) = memo
            .get_or_try_compute("k", || async { Ok("x".to_string()) })
            .await
            .unwrap();
        assert_eq!((v.as_str(), cached), ("x", false));
        let (v, cached) = memo
            .get_or_try_compute("k", || async { Err(Error::MissingTopic) })
            .await
            .unwrap();
        assert_eq!(v, "x");
        assert!(cached);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = Arc::new(BoundedCache::default());
        let memo = Memo::new(cache.clone());
        let r = memo
            .get_or_try_compute("k", || async { Err(Error::MissingTopic) })
            .await;
        assert!(r.is_err());
        assert!(cache.get("k").is_none());
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_computation() {
        let memo = Memo::new(Arc::new(BoundedCache::default()));
        let calls = Arc::new(AtomicUsize::new(0));
        let run = |memo: Memo, calls: Arc<AtomicUsize>| async move {
            memo.get_or_try_compute("k", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok("v".to_string())
            })
            .await
        };
        let (a, b) = tokio::join!(
            run(memo.clone(), calls.clone()),
            run(memo.clone(), calls.clone())
        );
        assert_eq!(a.unwrap().0, "v");
        assert_eq!(b.unwrap().0, "v");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_computation_frees_its_key() {
        let memo = Memo::new(Arc::new(BoundedCache::default()));
        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            memo.get_or_try_compute("k", std::future::pending::<Result<String>>),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(memo.inflight.lock().is_empty());

        let (v, cached) = memo
            .get_or_try_compute("k", || async { Ok("fresh".to_string()) })
            .await
            .unwrap();
        assert_eq!((v.as_str(), cached), ("fresh", false));
        assert!(memo.inflight.lock().is_empty());
    }
}
