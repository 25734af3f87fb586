//! Status cache.
//!
//! Query results are memoized per [`QueryKey`] (and per page for paginated
//! collections) for the key's staleness window. Time alone never evicts a
//! result the flows depend on being fresh: every flow that changes server
//! state calls [`QueryCache::invalidate`] with exactly the keys whose truth it
//! changed, and the next read refetches.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

/// Default number of cached collection pages.
pub const DEFAULT_PAGE_CAPACITY: usize = 256;

const HOUR: Duration = Duration::from_secs(60 * 60);

/// Logical name of a cached backend resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKey {
    ImageNames,
    MaskNames,
    Metadata,
    ImageUploadStatus,
    MaskUploadStatus,
    ImageMaskBalanceStatus,
    ImageMaskDimension,
    StratificationFileName,
    StratifiedSplitParameters,
    AugmentationIsComplete,
    AugmentationIsRunning,
    BackendIsRunning,
    SessionIsRunning,
    TrainingSet,
    ValidationSet,
    TestingSet,
    ImageMaskUrls,
}

impl QueryKey {
    pub const ALL: [QueryKey; 17] = [
        QueryKey::ImageNames,
        QueryKey::MaskNames,
        QueryKey::Metadata,
        QueryKey::ImageUploadStatus,
        QueryKey::MaskUploadStatus,
        QueryKey::ImageMaskBalanceStatus,
        QueryKey::ImageMaskDimension,
        QueryKey::StratificationFileName,
        QueryKey::StratifiedSplitParameters,
        QueryKey::AugmentationIsComplete,
        QueryKey::AugmentationIsRunning,
        QueryKey::BackendIsRunning,
        QueryKey::SessionIsRunning,
        QueryKey::TrainingSet,
        QueryKey::ValidationSet,
        QueryKey::TestingSet,
        QueryKey::ImageMaskUrls,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKey::ImageNames => "imageNames",
            QueryKey::MaskNames => "maskNames",
            QueryKey::Metadata => "metadata",
            QueryKey::ImageUploadStatus => "imageUploadStatus",
            QueryKey::MaskUploadStatus => "maskUploadStatus",
            QueryKey::ImageMaskBalanceStatus => "imageMaskBalanceStatus",
            QueryKey::ImageMaskDimension => "imageMaskDimension",
            QueryKey::StratificationFileName => "stratificationFileName",
            QueryKey::StratifiedSplitParameters => "stratifiedSplitParameters",
            QueryKey::AugmentationIsComplete => "augmentationIsComplete",
            QueryKey::AugmentationIsRunning => "augmentationIsRunning",
            QueryKey::BackendIsRunning => "backendIsRunning",
            QueryKey::SessionIsRunning => "sessionIsRunning",
            QueryKey::TrainingSet => "trainingSet",
            QueryKey::ValidationSet => "validationSet",
            QueryKey::TestingSet => "testingSet",
            QueryKey::ImageMaskUrls => "imageMaskUrls",
        }
    }

    /// Backend endpoint the key is read from.
    pub fn endpoint(&self) -> &'static str {
        match self {
            QueryKey::ImageNames => "/upload/backend/image_names",
            QueryKey::MaskNames => "/upload/backend/mask_names",
            QueryKey::Metadata => "/metadata/image_mask",
            QueryKey::ImageUploadStatus => "/status_checks/image_upload_status",
            QueryKey::MaskUploadStatus => "/status_checks/mask_upload_status",
            QueryKey::ImageMaskBalanceStatus => "/status_checks/image_mask_balance_status",
            QueryKey::ImageMaskDimension => "/metadata/uploaded-image-mask-dimension",
            QueryKey::StratificationFileName => "/upload/backend/stratification_data_filename",
            QueryKey::StratifiedSplitParameters => "/stratification_data_file/parameters",
            QueryKey::AugmentationIsComplete => "/status_checks/augmentation_is_complete",
            QueryKey::AugmentationIsRunning => "/status_checks/augmentation_is_running",
            QueryKey::BackendIsRunning => "/status_checks/backend_is_running",
            QueryKey::SessionIsRunning => "/status_checks/session_is_running",
            QueryKey::TrainingSet => "/metadata/train_images_masks",
            QueryKey::ValidationSet => "/metadata/val_images_masks",
            QueryKey::TestingSet => "/metadata/test_images_masks",
            QueryKey::ImageMaskUrls => "/generate-signed-urls-for-resized-images-and-masks",
        }
    }

    /// How long a result stays fresh when nothing invalidates it.
    pub fn default_staleness(&self) -> Duration {
        match self {
            QueryKey::Metadata => Duration::from_secs(5 * 60),
            QueryKey::ImageMaskUrls => Duration::ZERO,
            _ => 24 * HOUR,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tuning for [`QueryCache`].
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Per-key staleness overrides.
    pub staleness: HashMap<QueryKey, Duration>,
    /// Maximum number of cached collection pages.
    pub page_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            staleness: HashMap::new(),
            page_capacity: DEFAULT_PAGE_CAPACITY,
        }
    }
}

impl CacheSettings {
    pub fn with_staleness(mut self, key: QueryKey, staleness: Duration) -> Self {
        self.staleness.insert(key, staleness);
        self
    }

    pub fn with_page_capacity(mut self, capacity: usize) -> Self {
        self.page_capacity = capacity;
        self
    }

    pub fn staleness_for(&self, key: QueryKey) -> Duration {
        self.staleness
            .get(&key)
            .copied()
            .unwrap_or_else(|| key.default_staleness())
    }
}

#[derive(Clone)]
struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    fetched_at: Instant,
}

impl Entry {
    fn new<V: Any + Send + Sync>(value: V) -> Self {
        Self {
            value: Arc::new(value),
            fetched_at: Instant::now(),
        }
    }

    fn fresh<V: Clone + 'static>(&self, staleness: Duration) -> Option<V> {
        if self.fetched_at.elapsed() >= staleness {
            return None;
        }
        self.value.downcast_ref::<V>().cloned()
    }
}

/// Memoized query results with explicit invalidation.
pub struct QueryCache {
    settings: CacheSettings,
    entries: DashMap<QueryKey, Entry>,
    pages: Mutex<LruCache<(QueryKey, u32), Entry>>,
    invalidations: DashMap<QueryKey, u64>,
}

impl QueryCache {
    pub fn new(settings: CacheSettings) -> Self {
        let capacity: NonZeroUsize =
            NonZeroUsize::new(settings.page_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            settings,
            entries: DashMap::new(),
            pages: Mutex::new(LruCache::new(capacity)),
            invalidations: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Return the cached value for `key` (and `page`) if fresh, otherwise run
    /// `fetcher` and cache its result. Errors are not cached, and neither is a
    /// result whose fetch overlapped an invalidation of `key`.
    ///
    /// # Arguments
    /// * `key` - Resource being read
    /// * `page` - Page number for paginated collections, `None` otherwise
    /// * `fetcher` - Produces the value on a miss
    pub async fn fetch<V, E, F, Fut>(
        &self,
        key: QueryKey,
        page: Option<u32>,
        fetcher: F,
    ) -> Result<V, E>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let staleness: Duration = self.settings.staleness_for(key);
        if let Some(hit) = self.lookup::<V>(key, page, staleness) {
            trace!(key = %key, ?page, "Query cache hit");
            return Ok(hit);
        }

        debug!(key = %key, ?page, "Query cache miss");
        let generation: u64 = self.invalidation_count(key);
        let value: V = fetcher().await?;
        self.store(key, page, generation, value.clone());
        Ok(value)
    }

    /// Whether a fresh value is cached for `key` (any page).
    pub fn contains(&self, key: QueryKey) -> bool {
        let staleness: Duration = self.settings.staleness_for(key);
        let fresh = |e: &Entry| e.fetched_at.elapsed() < staleness;
        if self.entries.get(&key).map(|e| fresh(&e)).unwrap_or(false) {
            return true;
        }
        self.pages
            .lock()
            .iter()
            .any(|((k, _), e)| *k == key && fresh(e))
    }

    /// Drop every cached value (and page) of each key.
    pub fn invalidate(&self, keys: &[QueryKey]) {
        if keys.is_empty() {
            return;
        }
        debug!(keys = ?keys, "Invalidating queries");

        for key in keys {
            let mut generation = self.invalidations.entry(*key).or_insert(0);
            *generation += 1;
            self.entries.remove(key);
        }

        let mut pages = self.pages.lock();
        let stale: Vec<(QueryKey, u32)> = pages
            .iter()
            .filter(|((k, _), _)| keys.contains(k))
            .map(|(k, _)| *k)
            .collect();
        for page_key in stale {
            pages.pop(&page_key);
        }
    }

    /// Number of times `key` has been invalidated.
    pub fn invalidation_count(&self, key: QueryKey) -> u64 {
        self.invalidations.get(&key).map(|c| *c).unwrap_or(0)
    }

    /// Number of cached pages, across all keys.
    pub fn cached_pages(&self) -> usize {
        self.pages.lock().len()
    }

    fn lookup<V: Clone + 'static>(
        &self,
        key: QueryKey,
        page: Option<u32>,
        staleness: Duration,
    ) -> Option<V> {
        match page {
            None => self.entries.get(&key).and_then(|e| e.fresh(staleness)),
            Some(p) => self
                .pages
                .lock()
                .get(&(key, p))
                .and_then(|e| e.fresh(staleness)),
        }
    }

    /// Cache `value` unless `key` was invalidated since `generation` was read.
    /// The generation entry stays locked until the insert is done, so an
    /// invalidation cannot land between the check and the write.
    fn store<V: Any + Send + Sync>(
        &self,
        key: QueryKey,
        page: Option<u32>,
        generation: u64,
        value: V,
    ) {
        let current = self.invalidations.entry(key).or_insert(0);
        if *current != generation {
            debug!(key = %key, ?page, "Dropping result fetched before an invalidation");
            return;
        }
        let entry: Entry = Entry::new(value);
        match page {
            None => {
                self.entries.insert(key, entry);
            }
            Some(p) => {
                self.pages.lock().put((key, p), entry);
            }
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.entries.len())
            .field("pages", &self.cached_pages())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::oneshot;

    async fn counted(cache: &QueryCache, key: QueryKey, page: Option<u32>, calls: &AtomicU64) -> u64 {
        cache
            .fetch(key, page, || async {
                Ok::<u64, String>(calls.fetch_add(1, Ordering::SeqCst) + 1)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_value_is_memoized() {
        let cache: QueryCache = QueryCache::default();
        let calls: AtomicU64 = AtomicU64::new(0);

        assert_eq!(counted(&cache, QueryKey::ImageNames, None, &calls).await, 1);
        assert_eq!(counted(&cache, QueryKey::ImageNames, None, &calls).await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains(QueryKey::ImageNames));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let cache: QueryCache = QueryCache::default();
        let calls: AtomicU64 = AtomicU64::new(0);

        counted(&cache, QueryKey::MaskNames, None, &calls).await;
        counted(&cache, QueryKey::ImageNames, None, &calls).await;
        cache.invalidate(&[QueryKey::MaskNames]);

        assert!(!cache.contains(QueryKey::MaskNames));
        assert!(cache.contains(QueryKey::ImageNames));
        assert_eq!(counted(&cache, QueryKey::MaskNames, None, &calls).await, 3);
        assert_eq!(cache.invalidation_count(QueryKey::MaskNames), 1);
        assert_eq!(cache.invalidation_count(QueryKey::ImageNames), 0);
    }

    #[tokio::test]
    async fn test_invalidate_during_fetch_discards_result() {
        let cache: QueryCache = QueryCache::default();
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let inflight = cache.fetch(QueryKey::ImageNames, None, || async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok::<Vec<String>, String>(vec!["old.png".to_string()])
        });
        let upload = async {
            let _ = started_rx.await;
            cache.invalidate(&[QueryKey::ImageNames]);
            let _ = release_tx.send(());
        };
        let (first, ()) = tokio::join!(inflight, upload);

        // The caller still gets what it fetched, but nothing is cached.
        assert_eq!(first.unwrap(), vec!["old.png".to_string()]);
        assert!(!cache.contains(QueryKey::ImageNames));

        let next: Vec<String> = cache
            .fetch(QueryKey::ImageNames, None, || async {
                Ok::<Vec<String>, String>(vec!["new.png".to_string()])
            })
            .await
            .unwrap();
        assert_eq!(next, vec!["new.png".to_string()]);
        assert!(cache.contains(QueryKey::ImageNames));
    }

    #[tokio::test]
    async fn test_invalidate_during_page_fetch_discards_page() {
        let cache: QueryCache = QueryCache::default();
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let inflight = cache.fetch(QueryKey::TrainingSet, Some(1), || async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok::<u64, String>(1)
        });
        let augment = async {
            let _ = started_rx.await;
            cache.invalidate(&[QueryKey::TrainingSet]);
            let _ = release_tx.send(());
        };
        let (first, ()) = tokio::join!(inflight, augment);

        assert_eq!(first.unwrap(), 1);
        assert_eq!(cache.cached_pages(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_drops_every_page() {
        let cache: QueryCache = QueryCache::default();
        let calls: AtomicU64 = AtomicU64::new(0);

        counted(&cache, QueryKey::TrainingSet, Some(1), &calls).await;
        counted(&cache, QueryKey::TrainingSet, Some(2), &calls).await;
        counted(&cache, QueryKey::TestingSet, Some(1), &calls).await;
        assert_eq!(cache.cached_pages(), 3);

        cache.invalidate(&[QueryKey::TrainingSet]);
        assert_eq!(cache.cached_pages(), 1);
        assert!(cache.contains(QueryKey::TestingSet));
    }

    #[tokio::test]
    async fn test_zero_staleness_always_refetches() {
        let cache: QueryCache = QueryCache::default();
        let calls: AtomicU64 = AtomicU64::new(0);

        counted(&cache, QueryKey::ImageMaskUrls, None, &calls).await;
        counted(&cache, QueryKey::ImageMaskUrls, None, &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: QueryCache = QueryCache::default();
        let first: Result<u64, String> = cache
            .fetch(QueryKey::BackendIsRunning, None, || async { Err("down".to_string()) })
            .await;
        assert!(first.is_err());
        assert!(!cache.contains(QueryKey::BackendIsRunning));
    }

    #[tokio::test]
    async fn test_pages_are_lru_bounded() {
        let cache: QueryCache = QueryCache::new(CacheSettings::default().with_page_capacity(2));
        let calls: AtomicU64 = AtomicU64::new(0);

        for page in 1..=3 {
            counted(&cache, QueryKey::ValidationSet, Some(page), &calls).await;
        }
        assert_eq!(cache.cached_pages(), 2);
        // Page 1 was evicted.
        counted(&cache, QueryKey::ValidationSet, Some(1), &calls).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_staleness_overrides() {
        let settings: CacheSettings =
            CacheSettings::default().with_staleness(QueryKey::Metadata, Duration::from_secs(1));
        assert_eq!(settings.staleness_for(QueryKey::Metadata), Duration::from_secs(1));
        assert_eq!(settings.staleness_for(QueryKey::ImageNames), 24 * HOUR);
        assert_eq!(settings.staleness_for(QueryKey::ImageMaskUrls), Duration::ZERO);
    }
}
