//! Time-bounded, single-flight cache of the classified dataset.
//!
//! The entry is replaced wholesale on every successful refresh. Refreshes
//! are serialized by one async mutex: a caller that has to wait for it and
//! finds that a refresh completed in the meantime takes that refresh's
//! outcome instead of fetching again.
//!
//! A failed refresh never discards the previous entry. Plain reads keep
//! being served from it, stale or not; only forced refreshes and reads of
//! an empty cache see the error.

use crate::error::{Error, Result};
use crate::types::Dataset;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

/// Loader produces a fresh dataset: fetch, normalize, classify.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self) -> Result<Dataset>;
}

/// CacheEntry is the current snapshot and when it was fetched
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub dataset: Arc<Dataset>,
    pub fetched_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_fresh(&self) -> bool {
        self.age() < self.ttl
    }
}

/// Outcome of the most recent refresh, shared with callers that queued
/// behind it.
struct Attempt {
    generation: u64,
    outcome: std::result::Result<Arc<Dataset>, String>,
}

/// IssueCache holds the canonical dataset behind a TTL
pub struct IssueCache<L> {
    loader: L,
    ttl: Duration,
    entry: RwLock<Option<CacheEntry>>,
    refresh: Mutex<Option<Attempt>>,
    completed: AtomicU64,
}

impl<L: Loader> IssueCache<L> {
    pub fn new(loader: L, ttl: Duration) -> Self {
        IssueCache {
            loader,
            ttl,
            entry: RwLock::new(None),
            refresh: Mutex::new(None),
            completed: AtomicU64::new(0),
        }
    }

    /// Return the cached dataset while it is younger than the TTL, else
    /// refresh. `force_refresh` skips the freshness check.
    ///
    /// A failed refresh leaves the previous entry in place. A plain read
    /// then gets that entry; a forced refresh gets the error, as does every
    /// caller when there is no entry to fall back to.
    pub async fn get(&self, force_refresh: bool) -> Result<Arc<Dataset>> {
        let seen = self.completed.load(Ordering::Acquire);

        if !force_refresh {
            if let Some(entry) = self.entry.read().await.as_ref().filter(|e| e.is_fresh()) {
                debug!("cache hit, age {:?}", entry.age());
                return Ok(Arc::clone(&entry.dataset));
            }
        }

        let mut last = self.refresh.lock().await;
        if let Some(attempt) = last.as_ref().filter(|a| a.generation > seen) {
            debug!("joined refresh #{}", attempt.generation);
            let outcome = attempt.outcome.clone().map_err(Error::SourceUnavailable);
            drop(last);
            return self.or_previous(outcome, force_refresh).await;
        }

        info!("refreshing dataset (forced: {})", force_refresh);
        let outcome = self.loader.load().await.map(Arc::new);
        match &outcome {
            Ok(dataset) => {
                info!(
                    "dataset refreshed: {} issues, {} skipped records",
                    dataset.len(),
                    dataset.diagnostics.len()
                );
                if dataset.is_empty() {
                    warn!("refresh returned no issues");
                }
                *self.entry.write().await = Some(CacheEntry {
                    dataset: Arc::clone(dataset),
                    fetched_at: Instant::now(),
                    ttl: self.ttl,
                });
            }
            Err(err) => error!("refresh failed, keeping previous snapshot: {}", err),
        }

        let generation = self.completed.load(Ordering::Acquire) + 1;
        *last = Some(Attempt {
            generation,
            outcome: outcome.as_ref().map(Arc::clone).map_err(|e| e.to_string()),
        });
        self.completed.store(generation, Ordering::Release);
        drop(last);
        self.or_previous(outcome, force_refresh).await
    }

    /// Replace a failed outcome with the previous entry for plain reads.
    async fn or_previous(&self, outcome: Result<Arc<Dataset>>, force_refresh: bool) -> Result<Arc<Dataset>> {
        match outcome {
            Err(err) if !force_refresh => match self.entry.read().await.as_ref() {
                Some(entry) => {
                    warn!("serving snapshot aged {:?} after failed refresh: {}", entry.age(), err);
                    Ok(Arc::clone(&entry.dataset))
                }
                None => Err(err),
            },
            other => other,
        }
    }

    /// Drop the current entry; the next `get` fetches.
    pub async fn invalidate(&self) {
        debug!("cache invalidated");
        *self.entry.write().await = None;
    }

    /// The current entry regardless of age, without fetching.
    pub async fn entry(&self) -> Option<CacheEntry> {
        self.entry.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{at, issue};
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    struct CountingLoader {
        calls: AtomicUsize,
        fail: AtomicBool,
        delay: Duration,
    }

    impl CountingLoader {
        fn new(delay: Duration) -> Self {
            CountingLoader {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
                delay,
            }
        }
    }

    #[async_trait]
    impl Loader for Arc<CountingLoader> {
        async fn load(&self) -> Result<Dataset> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::SourceUnavailable("tracker down".to_string()));
            }
            Ok(Dataset {
                issues: (0..n).map(|i| issue(&format!("A-{i}"), "2024-01-01")).collect(),
                fetched_at: at("2024-01-02"),
                diagnostics: Vec::new(),
            })
        }
    }

    fn cache(delay: Duration, ttl: Duration) -> (Arc<CountingLoader>, IssueCache<Arc<CountingLoader>>) {
        let loader = Arc::new(CountingLoader::new(delay));
        (Arc::clone(&loader), IssueCache::new(loader, ttl))
    }

    #[tokio::test]
    async fn serves_within_ttl() {
        let (loader, cache) = cache(Duration::ZERO, Duration::from_secs(60));
        let first = cache.get(false).await.unwrap();
        let second = cache.get(false).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refetches_after_ttl() {
        let (loader, cache) = cache(Duration::ZERO, Duration::from_secs(60));
        cache.get(false).await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        cache.get(false).await.unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let refreshed = cache.get(false).await.unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshed.len(), 2);
    }

    #[tokio::test]
    async fn force_refresh_bypasses_ttl() {
        let (loader, cache) = cache(Duration::ZERO, Duration::from_secs(3600));
        cache.get(false).await.unwrap();
        cache.get(true).await.unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_expired_gets_fetch_once() {
        let (loader, cache) = cache(Duration::from_millis(50), Duration::ZERO);
        let (a, b) = tokio::join!(cache.get(false), cache.get(false));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_failures_share_one_fetch() {
        let (loader, cache) = cache(Duration::from_millis(50), Duration::ZERO);
        loader.fail.store(true, Ordering::SeqCst);
        let (a, b, c) = tokio::join!(cache.get(false), cache.get(true), cache.get(false));
        assert!(a.is_err() && b.is_err() && c.is_err());
        assert!(matches!(b, Err(Error::SourceUnavailable(_))));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_entry() {
        let (loader, cache) = cache(Duration::ZERO, Duration::from_secs(3600));
        let good = cache.get(false).await.unwrap();

        loader.fail.store(true, Ordering::SeqCst);
        let err = cache.get(true).await.unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));

        let kept = cache.entry().await.unwrap();
        assert!(Arc::ptr_eq(&kept.dataset, &good));
        // still fresh, so plain reads keep serving it
        assert!(Arc::ptr_eq(&cache.get(false).await.unwrap(), &good));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_served_while_source_is_down() {
        let (loader, cache) = cache(Duration::ZERO, Duration::from_secs(60));
        let good = cache.get(false).await.unwrap();

        loader.fail.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(61)).await;

        let first = cache.get(false).await.unwrap();
        let second = cache.get(false).await.unwrap();
        assert!(Arc::ptr_eq(&first, &good));
        assert!(Arc::ptr_eq(&second, &good));
        // each plain read past the TTL retries the source
        assert_eq!(loader.calls.load(Ordering::SeqCst), 3);

        let err = cache.get(true).await.unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));

        loader.fail.store(false, Ordering::SeqCst);
        let recovered = cache.get(false).await.unwrap();
        assert_eq!(recovered.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn joined_readers_fall_back_to_expired_entry() {
        let (loader, cache) = cache(Duration::from_millis(50), Duration::from_secs(60));
        let good = cache.get(false).await.unwrap();

        loader.fail.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(61)).await;

        let (a, b, forced) = tokio::join!(cache.get(false), cache.get(false), cache.get(true));
        assert!(Arc::ptr_eq(&a.unwrap(), &good));
        assert!(Arc::ptr_eq(&b.unwrap(), &good));
        assert!(matches!(forced, Err(Error::SourceUnavailable(_))));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_gets_on_expired_entry_fetch_once() {
        let (loader, cache) = cache(Duration::from_millis(50), Duration::from_secs(60));
        let stale = cache.get(false).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        let (a, b) = tokio::join!(cache.get(false), cache.get(false));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &stale));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_next_fetch() {
        let (loader, cache) = cache(Duration::ZERO, Duration::from_secs(3600));
        cache.get(false).await.unwrap();
        cache.invalidate().await;
        assert!(cache.entry().await.is_none());
        cache.get(false).await.unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn sequential_forced_refreshes_each_fetch() {
        let (loader, cache) = cache(Duration::ZERO, Duration::from_secs(3600));
        cache.get(true).await.unwrap();
        cache.get(true).await.unwrap();
        cache.get(true).await.unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 3);
    }
}
