use crate::entry::CacheEntry;
use crate::entry::CacheKey;
use crate::types::Content;
use fieldx::fxstruct;
use moka::future::Cache;
use moka::ops::compute::CompResult;
use moka::ops::compute::Op;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio::time::MissedTickBehavior;

/// In-memory read-through cache of banner content.
///
/// Entries are only ever created by [`set`](Self::set), which the read path calls after a miss. Each entry lives
/// for [`ttl`](Self::ttl) since it was set. Expired entries are never returned by [`get`](Self::get) and are
/// physically removed by the eviction sweep running every [`eviction_interval`](Self::eviction_interval) once
/// [`start_evictor`](Self::start_evictor) has been called. There is no per-key invalidation: writers to the store
/// don't touch the cache and staleness is bounded by the TTL.
///
/// ```ignore
/// let cache = BannerCache::builder()
///     .ttl(Duration::from_secs(300))
///     .eviction_interval(Duration::from_secs(60))
///     .build()?;
/// cache.start_evictor(shutdown_rx);
///
/// let key = CacheKey::new(feature_id, tag_id);
/// if let Some(content) = cache.get(&key).await {
///     return Ok(content);
/// }
/// ```
#[fxstruct(sync, rc, no_new, default(off), builder)]
pub struct BannerCache {
    /// Cache name. Most useful for debugging and logging.
    #[fieldx(get(clone), default(String::from("banners")))]
    name: String,

    #[fieldx(get(copy), default(Duration::from_secs(300)))]
    ttl: Duration,

    /// The delay between two consecutive eviction sweeps.
    #[fieldx(get(copy), default(Duration::from_secs(60)))]
    eviction_interval: Duration,

    /// Upper bound on the number of entries, zero for none. A bounded cache decides on every insert whether the new
    /// entry is worth keeping, so a [`set`](Self::set) may be dropped right away and the next read goes to the store
    /// again. Unbounded caches keep everything until the TTL sweep.
    #[fieldx(get(copy), default(0))]
    max_capacity: u64,

    #[fieldx(vis(pub(crate)), lazy, lock, clearer(private), get(clone), builder(off))]
    cache: Arc<Cache<CacheKey, CacheEntry>>,

    #[fieldx(private, clearer, lock, get, set, builder(off))]
    evictor_task: tokio::task::JoinHandle<()>,
}

impl BannerCache {
    fn build_cache(&self) -> Arc<Cache<CacheKey, CacheEntry>> {
        let mut builder = Cache::builder().name(&self.name());
        if self.max_capacity() > 0 {
            builder = builder.max_capacity(self.max_capacity());
        }
        Arc::new(builder.build())
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Content> {
        let entry = self.cache().get(key).await?;

        if entry.is_expired_at(Instant::now()) {
            log::debug!("[{}] GET({key}): expired, waiting for eviction", self.name());
            return None;
        }

        log::debug!("[{}] GET({key}): hit", self.name());
        Some(entry.into_content())
    }

    /// Stores the content for `key`, unconditionally replacing whatever was there.
    pub async fn set(&self, key: CacheKey, content: Content) {
        let expires_at = Instant::now() + self.ttl();
        log::debug!("[{}] SET({key})", self.name());
        self.cache().insert(key, CacheEntry::new(content, expires_at)).await;
    }

    /// Raw entry for the key, expired or not, as long as it hasn't been evicted yet.
    pub async fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.cache().get(key).await
    }

    /// Number of stored entries, expired ones that haven't been swept yet included.
    pub async fn len(&self) -> u64 {
        let cache = self.cache();
        cache.run_pending_tasks().await;
        cache.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Run a single eviction pass. Returns the number of removed entries.
    pub async fn sweep(&self) -> usize {
        Self::sweep_cache(&self.cache(), &self.name()).await
    }

    async fn sweep_cache(cache: &Cache<CacheKey, CacheEntry>, name: &str) -> usize {
        let now = Instant::now();
        let candidates = cache
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key)
            .collect::<Vec<_>>();

        let mut removed = 0;
        for key in candidates {
            // The entry could have been overwritten since we looked at it. Re-check under the entry lock.
            let outcome = cache
                .entry(key.as_ref().clone())
                .and_compute_with(|entry| async move {
                    match entry {
                        Some(entry) if entry.value().is_expired_at(now) => Op::Remove,
                        _ => Op::Nop,
                    }
                })
                .await;

            if let CompResult::Removed(_) = outcome {
                removed += 1;
            }
        }

        cache.run_pending_tasks().await;

        if removed > 0 {
            log::debug!("[{name}] Evicted {removed} expired entries");
        }

        removed
    }

    pub fn is_evictor_running(&self) -> bool {
        self.evictor_task().as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Spawn the background eviction sweep. It keeps running until `true` is sent over the `shutdown` channel, the
    /// sending side is dropped, or the cache is closed.
    pub fn start_evictor(&self, mut shutdown: watch::Receiver<bool>) {
        if self.is_evictor_running() {
            log::debug!("[{}] Evictor is already running", self.name());
            return;
        }

        let cache = self.cache();
        let name = self.name();
        let period = self.eviction_interval();

        self.set_evictor_task(tokio::spawn(async move {
            log::debug!("[{name}] Starting evictor, interval={period:?}");

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately, there is nothing to sweep yet.
            ticker.tick().await;

            while !*shutdown.borrow() {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        Self::sweep_cache(&cache, &name).await;
                    }
                }
            }

            log::debug!("[{name}] Evictor stopped");
        }));
    }

    pub async fn close(&self) {
        if let Some(evictor) = self.clear_evictor_task() {
            evictor.abort();
            let _ = evictor.await;
        }
        self.clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl: Duration, interval: Duration) -> Arc<BannerCache> {
        BannerCache::builder()
            .name(String::from("test"))
            .ttl(ttl)
            .eviction_interval(interval)
            .build()
            .expect("cache builds")
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_within_and_after_ttl() {
        let cache = cache(Duration::from_secs(10), Duration::from_secs(60));
        let key = CacheKey::new(3, 10);
        let content = Content::new("title", "text", "https://url");

        assert_eq!(cache.get(&key).await, None);

        cache.set(key.clone(), content.clone()).await;
        assert_eq!(cache.get(&key).await, Some(content.clone()));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get(&key).await, Some(content));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get(&key).await, None);
        // Still physically there until swept.
        assert!(cache.entry(&key).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_and_renews() {
        let cache = cache(Duration::from_secs(10), Duration::from_secs(60));
        let key = CacheKey::new(1, 1);

        cache.set(key.clone(), Content::new("a", "a", "a")).await;
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set(key.clone(), Content::new("b", "b", "b")).await;
        tokio::time::advance(Duration::from_secs(8)).await;

        assert_eq!(cache.get(&key).await, Some(Content::new("b", "b", "b")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let cache = cache(Duration::from_secs(10), Duration::from_secs(60));
        let old = CacheKey::new(1, 1);
        let fresh = CacheKey::new(1, 2);

        cache.set(old.clone(), Content::new("old", "old", "old")).await;
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.set(fresh.clone(), Content::new("fresh", "fresh", "fresh")).await;
        tokio::time::advance(Duration::from_secs(6)).await;

        assert_eq!(cache.sweep().await, 1);
        assert!(cache.entry(&old).await.is_none());
        assert!(cache.get(&fresh).await.is_some());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_by_default_keeps_every_set() {
        let cache = cache(Duration::from_secs(60), Duration::from_secs(60));
        assert_eq!(cache.max_capacity(), 0);

        for tag_id in 1..=2_000 {
            cache.set(CacheKey::new(1, tag_id), Content::new("t", "t", "t")).await;
        }

        assert_eq!(cache.len().await, 2_000);
        for tag_id in 1..=2_000 {
            assert!(cache.get(&CacheKey::new(1, tag_id)).await.is_some(), "tag {tag_id} was dropped");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_cache_stays_within_capacity() {
        let cache = BannerCache::builder()
            .name(String::from("bounded"))
            .max_capacity(10)
            .build()
            .expect("cache builds");

        for tag_id in 1..=100 {
            cache.set(CacheKey::new(1, tag_id), Content::new("t", "t", "t")).await;
        }

        assert!(cache.len().await <= 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evictor_sweeps_and_stops() {
        let cache = cache(Duration::from_secs(2), Duration::from_secs(1));
        let key = CacheKey::new(5, 6);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        cache.start_evictor(shutdown_rx);
        assert!(cache.is_evictor_running());

        cache.set(key.clone(), Content::new("t", "t", "t")).await;
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(cache.entry(&key).await.is_none());

        shutdown_tx.send(true).expect("evictor listens");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!cache.is_evictor_running());

        cache.close().await;
    }
}
