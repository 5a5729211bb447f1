// TTL caches for pool snapshots and the ranked top-N list, plus the
// on-disk JSON cache files that let an execution be replayed without
// re-fetching.
//
// The clock is injected so tests control time deterministically instead
// of sleeping. Writes swap the whole entry under a lock: a reader sees
// the old or the new complete entry, never a partial one.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::arbitrage::ArbitrageOpportunity;
use crate::venue::{PoolSnapshot, VenueId};

/// Time source for cache expiry
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall-clock time in epoch milliseconds
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

struct Entry<T> {
    value: T,
    stored_at: i64,
}

/// Single-slot cache with TTL expiry.
///
/// Single writer per refresh cycle, many readers; the lock is held only
/// across the swap instant.
pub struct TtlCache<T> {
    inner: RwLock<Option<Entry<T>>>,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(None),
            ttl_ms: ttl_ms as i64,
            clock,
        }
    }

    /// Replace the cached value atomically.
    pub fn put(&self, value: T) {
        let stored_at = self.clock.now_millis();
        let mut slot = self.inner.write().expect("cache lock poisoned");
        *slot = Some(Entry { value, stored_at });
    }

    /// Return the cached value only while strictly within TTL. After
    /// expiry this reports a miss, never stale data.
    pub fn get(&self) -> Option<T> {
        let now = self.clock.now_millis();
        let slot = self.inner.read().expect("cache lock poisoned");
        slot.as_ref()
            .filter(|entry| now - entry.stored_at < self.ttl_ms)
            .map(|entry| entry.value.clone())
    }

    /// Return the last stored value regardless of age, with its age in
    /// milliseconds. Used only for degraded fallback when a provider is
    /// unreachable; callers must flag that fallback occurred.
    pub fn get_stale(&self) -> Option<(T, i64)> {
        let now = self.clock.now_millis();
        let slot = self.inner.read().expect("cache lock poisoned");
        slot.as_ref()
            .map(|entry| (entry.value.clone(), now - entry.stored_at))
    }

    pub fn invalidate(&self) {
        let mut slot = self.inner.write().expect("cache lock poisoned");
        *slot = None;
    }
}

/// A ranked opportunity together with the pool metadata of both legs, so
/// execution can be replayed without re-fetching either venue.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CachedOpportunity {
    pub opportunity: ArbitrageOpportunity,
    pub raydium_pool: PoolSnapshot,
    pub meteora_pool: PoolSnapshot,
}

/// Bounded snapshot of the best-N opportunities from one ranking pass
pub struct TopNCache {
    cache: TtlCache<Vec<CachedOpportunity>>,
}

impl TopNCache {
    pub fn new(ttl_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: TtlCache::new(ttl_ms, clock),
        }
    }

    pub fn put(&self, entries: Vec<CachedOpportunity>) {
        debug!(count = entries.len(), "storing ranked opportunity set");
        self.cache.put(entries);
    }

    pub fn get(&self) -> Option<Vec<CachedOpportunity>> {
        self.cache.get()
    }

    /// Look up a cached opportunity by either leg's pool id. Misses once
    /// the TTL has elapsed.
    pub fn find_by_pool_id(&self, pool_id: &str) -> Option<CachedOpportunity> {
        self.cache.get()?.into_iter().find(|entry| {
            entry.opportunity.raydium_pool_id == pool_id
                || entry.opportunity.meteora_pool_id == pool_id
        })
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }
}

/// In-memory pool snapshot cache, one partition per venue so concurrent
/// refreshes never contend on each other's slot.
pub struct SnapshotCache {
    raydium: TtlCache<Vec<PoolSnapshot>>,
    meteora: TtlCache<Vec<PoolSnapshot>>,
}

impl SnapshotCache {
    pub fn new(ttl_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            raydium: TtlCache::new(ttl_ms, Arc::clone(&clock)),
            meteora: TtlCache::new(ttl_ms, clock),
        }
    }

    fn partition(&self, venue: VenueId) -> &TtlCache<Vec<PoolSnapshot>> {
        match venue {
            VenueId::Raydium => &self.raydium,
            VenueId::Meteora => &self.meteora,
        }
    }

    pub fn put(&self, venue: VenueId, pools: Vec<PoolSnapshot>) {
        self.partition(venue).put(pools);
    }

    pub fn get_fresh(&self, venue: VenueId) -> Option<Vec<PoolSnapshot>> {
        self.partition(venue).get()
    }

    /// Last known snapshot set regardless of TTL, for provider-failure
    /// fallback. Logs that fallback occurred.
    pub fn get_fallback(&self, venue: VenueId) -> Option<Vec<PoolSnapshot>> {
        let (pools, age_ms) = self.partition(venue).get_stale()?;
        warn!(
            venue = %venue,
            age_ms,
            pools = pools.len(),
            "provider unavailable, falling back to cached snapshot set"
        );
        Some(pools)
    }
}

// ============================================================================
// On-disk cache files
// ============================================================================

/// File layout: `{timestamp: epoch_millis, pools: [...]}`
#[derive(Debug, Serialize, Deserialize)]
pub struct PoolCacheFile {
    pub timestamp: i64,
    pub pools: Vec<PoolSnapshot>,
}

/// File layout: `{timestamp: epoch_millis, opportunities: [...]}`
#[derive(Debug, Serialize, Deserialize)]
pub struct TopCacheFile {
    pub timestamp: i64,
    pub opportunities: Vec<CachedOpportunity>,
}

/// JSON cache files under a configurable directory, one file per
/// venue/purpose. The directory is created on demand.
pub struct CacheStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new<P: AsRef<Path>>(dir: P, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            clock,
        }
    }

    fn pool_file(&self, venue: VenueId) -> PathBuf {
        self.dir.join(format!("{}_pools.json", venue.as_str()))
    }

    fn top_file(&self) -> PathBuf {
        self.dir.join("top_opportunities.json")
    }

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .context("Failed to create cache directory")?;
        let json = serde_json::to_vec_pretty(value).context("Failed to serialize cache file")?;
        let mut file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(&json).await?;
        file.flush().await?;
        Ok(())
    }

    pub async fn save_pools(&self, venue: VenueId, pools: &[PoolSnapshot]) -> Result<()> {
        let payload = PoolCacheFile {
            timestamp: self.clock.now_millis(),
            pools: pools.to_vec(),
        };
        let path = self.pool_file(venue);
        self.write_json(&path, &payload).await?;
        debug!(venue = %venue, pools = payload.pools.len(), file = %path.display(), "pool cache written");
        Ok(())
    }

    pub async fn load_pools(&self, venue: VenueId) -> Result<Option<PoolCacheFile>> {
        let path = self.pool_file(venue);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let parsed: PoolCacheFile = serde_json::from_slice(&bytes)
                    .with_context(|| format!("Corrupt cache file {}", path.display()))?;
                Ok(Some(parsed))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub async fn save_top(&self, opportunities: &[CachedOpportunity]) -> Result<()> {
        let payload = TopCacheFile {
            timestamp: self.clock.now_millis(),
            opportunities: opportunities.to_vec(),
        };
        let path = self.top_file();
        self.write_json(&path, &payload).await?;
        info!(
            opportunities = payload.opportunities.len(),
            file = %path.display(),
            "top opportunity cache written"
        );
        Ok(())
    }

    pub async fn load_top(&self) -> Result<Option<TopCacheFile>> {
        let path = self.top_file();
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let parsed: TopCacheFile = serde_json::from_slice(&bytes)
                    .with_context(|| format!("Corrupt cache file {}", path.display()))?;
                Ok(Some(parsed))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}
