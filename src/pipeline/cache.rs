//! Coalescing TTL cache keyed by (token_mint, window_seconds)
//!
//! At most one computation per key is in flight. The first caller becomes the leader and
//! runs the computation on a spawned task; callers arriving meanwhile wait on a watch
//! channel for the leader's outcome. The spawned task finishes even if the leader's caller
//! is dropped, so waiters and the cache still get the value.
//!
//! Entries expire after the TTL or on `invalidate`. Every slot carries a generation;
//! a computation only stores its value if its pending slot is still in place, so results
//! that started before an invalidation never overwrite it.

use crate::pipeline::error::IntelligenceError;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

pub type CacheKey = (String, u64);

type Outcome<V> = Option<Result<Arc<V>, IntelligenceError>>;

/// Values decide for themselves whether they may be stored
pub trait Cacheable {
    fn is_cacheable(&self) -> bool {
        true
    }
}

enum Slot<V> {
    Ready {
        value: Arc<V>,
        expires_at: Instant,
    },
    Pending {
        rx: watch::Receiver<Outcome<V>>,
        generation: u64,
    },
}

struct Inner<V> {
    slots: HashMap<CacheKey, Slot<V>>,
    next_generation: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    invalidations: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Callers that waited on another caller's computation
    pub coalesced: u64,
    pub invalidations: u64,
    pub entries: usize,
    pub in_flight: usize,
}

enum Action<V> {
    Wait(watch::Receiver<Outcome<V>>, u64),
    Lead(watch::Sender<Outcome<V>>, u64),
}

pub struct AnalysisCache<V> {
    ttl: Duration,
    inner: Arc<Mutex<Inner<V>>>,
    counters: Arc<Counters>,
}

impl<V> AnalysisCache<V>
where
    V: Cacheable + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(Mutex::new(Inner {
                slots: HashMap::new(),
                next_generation: 0,
            })),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value, the outcome of an in-flight computation, or a new computation
    pub async fn get_or_compute<Fut>(
        &self,
        key: CacheKey,
        compute: Fut,
    ) -> Result<Arc<V>, IntelligenceError>
    where
        Fut: Future<Output = Result<V, IntelligenceError>> + Send + 'static,
    {
        let action = {
            let mut inner = lock(&self.inner);
            let now = Instant::now();

            let existing = match inner.slots.get(&key) {
                Some(Slot::Ready { value, expires_at }) if *expires_at > now => {
                    Some(Ok(Arc::clone(value)))
                }
                Some(Slot::Pending { rx, generation }) => Some(Err((rx.clone(), *generation))),
                _ => None,
            };

            match existing {
                Some(Ok(value)) => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    log::debug!("🎯 Cache hit for {} ({}s)", key.0, key.1);
                    return Ok(value);
                }
                Some(Err((rx, generation))) => {
                    self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    log::debug!("⏸️  Joining in-flight analysis for {} ({}s)", key.0, key.1);
                    Action::Wait(rx, generation)
                }
                None => {
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    inner.slots.retain(|_, slot| match slot {
                        Slot::Ready { expires_at, .. } => *expires_at > now,
                        Slot::Pending { .. } => true,
                    });

                    inner.next_generation += 1;
                    let generation = inner.next_generation;
                    let (tx, rx) = watch::channel(None);
                    inner.slots.insert(key.clone(), Slot::Pending { rx, generation });
                    Action::Lead(tx, generation)
                }
            }
        };

        match action {
            Action::Wait(rx, generation) => self.wait(&key, rx, generation).await,
            Action::Lead(tx, generation) => self.lead(key, tx, generation, compute).await,
        }
    }

    async fn wait(
        &self,
        key: &CacheKey,
        mut rx: watch::Receiver<Outcome<V>>,
        generation: u64,
    ) -> Result<Arc<V>, IntelligenceError> {
        let outcome = match rx.wait_for(|outcome| outcome.is_some()).await {
            Ok(guard) => (*guard).clone(),
            Err(_) => None,
        };

        match outcome {
            Some(result) => result,
            None => {
                // Leader task died without publishing
                remove_pending(&self.inner, key, generation);
                Err(IntelligenceError::Internal(format!(
                    "in-flight analysis for {} was aborted",
                    key.0
                )))
            }
        }
    }

    async fn lead<Fut>(
        &self,
        key: CacheKey,
        tx: watch::Sender<Outcome<V>>,
        generation: u64,
        compute: Fut,
    ) -> Result<Arc<V>, IntelligenceError>
    where
        Fut: Future<Output = Result<V, IntelligenceError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let ttl = self.ttl;
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            let outcome = compute.await.map(Arc::new);

            {
                let mut guard = lock(&inner);
                let still_current = matches!(
                    guard.slots.get(&task_key),
                    Some(Slot::Pending { generation: g, .. }) if *g == generation
                );
                if still_current {
                    match &outcome {
                        Ok(value) if value.is_cacheable() => {
                            guard.slots.insert(
                                task_key.clone(),
                                Slot::Ready {
                                    value: Arc::clone(value),
                                    expires_at: Instant::now() + ttl,
                                },
                            );
                        }
                        _ => {
                            guard.slots.remove(&task_key);
                        }
                    }
                }
            }

            tx.send_replace(Some(outcome.clone()));
            outcome
        });

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("❌ Analysis task for {} failed: {}", key.0, e);
                remove_pending(&self.inner, &key, generation);
                Err(IntelligenceError::Internal(e.to_string()))
            }
        }
    }

    /// Drop every entry (ready or in flight) for a mint; returns how many were removed
    pub fn invalidate(&self, token_mint: &str) -> usize {
        let mut inner = lock(&self.inner);
        let before = inner.slots.len();
        inner.slots.retain(|(mint, _), _| mint != token_mint);
        let removed = before - inner.slots.len();
        if removed > 0 {
            self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
            log::debug!("🧹 Invalidated {} cache entries for {}", removed, token_mint);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let inner = lock(&self.inner);
        let now = Instant::now();
        let mut entries = 0;
        let mut in_flight = 0;
        for slot in inner.slots.values() {
            match slot {
                Slot::Ready { expires_at, .. } if *expires_at > now => entries += 1,
                Slot::Ready { .. } => {}
                Slot::Pending { .. } => in_flight += 1,
            }
        }

        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            entries,
            in_flight,
        }
    }
}

fn lock<V>(inner: &Mutex<Inner<V>>) -> MutexGuard<'_, Inner<V>> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn remove_pending<V>(inner: &Mutex<Inner<V>>, key: &CacheKey, generation: u64) {
    let mut guard = lock(inner);
    let stale = matches!(
        guard.slots.get(key),
        Some(Slot::Pending { generation: g, .. }) if *g == generation
    );
    if stale {
        guard.slots.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, PartialEq)]
    struct Value {
        n: usize,
        cacheable: bool,
    }

    impl Cacheable for Value {
        fn is_cacheable(&self) -> bool {
            self.cacheable
        }
    }

    fn key(mint: &str) -> CacheKey {
        (mint.to_string(), 300)
    }

    fn counted(
        calls: &Arc<AtomicUsize>,
        cacheable: bool,
        delay: Duration,
    ) -> impl Future<Output = Result<Value, IntelligenceError>> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(delay).await;
            Ok(Value { n, cacheable })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_then_expiry() {
        let cache = AnalysisCache::new(Duration::from_secs(30));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache.get_or_compute(key("a"), counted(&calls, true, Duration::ZERO)).await.unwrap();
        tokio::time::advance(Duration::from_secs(29)).await;
        let second = cache.get_or_compute(key("a"), counted(&calls, true, Duration::ZERO)).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let third = cache.get_or_compute(key("a"), counted(&calls, true, Duration::ZERO)).await.unwrap();
        assert_eq!(third.n, 2);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_computation() {
        let cache = Arc::new(AnalysisCache::new(Duration::from_secs(30)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = Arc::clone(&cache);
            let fut = counted(&calls, true, Duration::from_millis(100));
            handles.push(tokio::spawn(async move { cache.get_or_compute(key("a"), fut).await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().n, 1);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.coalesced + stats.hits, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncacheable_value_reaches_waiters_but_is_not_stored() {
        let cache = Arc::new(AnalysisCache::new(Duration::from_secs(30)));
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let cache = Arc::clone(&cache);
            let fut = counted(&calls, false, Duration::from_millis(50));
            tokio::spawn(async move { cache.get_or_compute(key("a"), fut).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let waiter = cache
            .get_or_compute(key("a"), counted(&calls, false, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(waiter.n, 1);
        assert_eq!(leader.await.unwrap().unwrap().n, 1);

        assert_eq!(cache.stats().entries, 0);
        let again = cache
            .get_or_compute(key("a"), counted(&calls, false, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(again.n, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_leader_still_populates_cache() {
        let cache = Arc::new(AnalysisCache::new(Duration::from_secs(30)));
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let cache = Arc::clone(&cache);
            let fut = counted(&calls, true, Duration::from_millis(100));
            tokio::spawn(async move { cache.get_or_compute(key("a"), fut).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let value = cache
            .get_or_compute(key("a"), counted(&calls, true, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(value.n, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_beats_in_flight_store() {
        let cache = Arc::new(AnalysisCache::new(Duration::from_secs(30)));
        let calls = Arc::new(AtomicUsize::new(0));

        let leader = {
            let cache = Arc::clone(&cache);
            let fut = counted(&calls, true, Duration::from_millis(100));
            tokio::spawn(async move { cache.get_or_compute(key("a"), fut).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.invalidate("a"), 1);
        assert_eq!(leader.await.unwrap().unwrap().n, 1);

        assert_eq!(cache.stats().entries, 0);
        let fresh = cache
            .get_or_compute(key("a"), counted(&calls, true, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(fresh.n, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_shared_and_not_cached() {
        let cache: AnalysisCache<Value> = AnalysisCache::new(Duration::from_secs(30));
        let err = cache
            .get_or_compute(key("a"), async {
                Err(IntelligenceError::InvalidInput("negative amount".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IntelligenceError::InvalidInput(_)));

        let stats = cache.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let cache = AnalysisCache::new(Duration::from_secs(30));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.get_or_compute(key("a"), counted(&calls, true, Duration::ZERO)).await.unwrap();
        cache.get_or_compute(key("b"), counted(&calls, true, Duration::ZERO)).await.unwrap();
        cache
            .get_or_compute(("a".to_string(), 60), counted(&calls, true, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        assert_eq!(cache.invalidate("a"), 2);
        assert_eq!(cache.stats().entries, 1);
    }
}
