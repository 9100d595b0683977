use crate::provider::ResolvedUrlKind;
use crate::request::CoalescingKey;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Configuration for the resolved-URL cache
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// TTL for providers answering from an instant-availability lookup
    pub instant_ttl: Duration,
    /// TTL for fully resolved direct download URLs
    pub direct_ttl: Duration,
    /// Per-provider TTL overrides, keyed by provider key
    pub provider_ttls: HashMap<String, Duration>,
    /// Maximum number of cached entries
    pub max_entries: usize,
    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            instant_ttl: Duration::minutes(15),
            direct_ttl: Duration::hours(1),
            provider_ttls: HashMap::new(),
            max_entries: 1000,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// TTL for a URL resolved by `provider_key`: the operator override wins,
    /// otherwise the default for the provider's kind of URL.
    pub fn ttl_for(&self, provider_key: &str, kind: ResolvedUrlKind) -> Duration {
        if let Some(ttl) = self.provider_ttls.get(provider_key) {
            return *ttl;
        }
        match kind {
            ResolvedUrlKind::InstantAvailability => self.instant_ttl,
            ResolvedUrlKind::Direct => self.direct_ttl,
        }
    }
}

/// Cached URL with metadata
#[derive(Clone, Debug)]
pub struct CachedUrl {
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CachedUrl {
    pub fn new(url: String, ttl: Duration) -> Self {
        Self {
            url,
            created_at: Utc::now(),
            ttl,
        }
    }

    /// Expiry instant, `None` when it falls outside the representable range
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.checked_add_signed(self.ttl)
    }

    /// Check if the cached URL is still valid. A TTL reaching past the
    /// calendar never expires.
    pub fn is_valid(&self) -> bool {
        match self.expires_at() {
            Some(expires_at) => Utc::now() < expires_at,
            None => self.ttl > Duration::zero(),
        }
    }
}

/// Memoizes successful resolutions per coalescing key.
///
/// Expiry is lazy: an expired entry reads as a miss and stays in place until
/// the next successful resolution overwrites it or capacity eviction drops it.
pub struct ResolvedUrlCache {
    cache: DashMap<CoalescingKey, CachedUrl>,
    pub config: CacheConfig,
}

impl Default for ResolvedUrlCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl ResolvedUrlCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: DashMap::new(),
            config,
        }
    }

    /// Get the cached URL if present and not expired
    pub fn get(&self, key: &CoalescingKey) -> Option<String> {
        if !self.config.enabled {
            return None;
        }

        match self.cache.get(key) {
            Some(cached) if cached.is_valid() => {
                log::debug!("Cache hit for key: {}", key);
                Some(cached.url.clone())
            }
            Some(_) => {
                log::debug!("Cache expired for key: {}", key);
                None
            }
            None => {
                log::debug!("Cache miss for key: {}", key);
                None
            }
        }
    }

    /// Store a resolved URL, replacing any previous entry for the key
    pub fn put(&self, key: CoalescingKey, url: String, ttl: Duration) {
        if !self.config.enabled {
            return;
        }

        if !self.cache.contains_key(&key) && self.cache.len() >= self.config.max_entries {
            self.evict_expired();

            if self.cache.len() >= self.config.max_entries {
                self.evict_oldest();
            }
        }

        log::debug!("Stored in cache with key: {} (ttl {}s)", key, ttl.num_seconds());
        self.cache.insert(key, CachedUrl::new(url, ttl));
    }

    /// Remove expired entries from cache
    pub fn evict_expired(&self) {
        let before = self.cache.len();
        self.cache.retain(|_, cached| cached.is_valid());
        log::debug!(
            "Evicted {} expired cache entries",
            before.saturating_sub(self.cache.len())
        );
    }

    /// Remove the oldest quarter of entries when at capacity
    fn evict_oldest(&self) {
        let mut entries: Vec<_> = self
            .cache
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().created_at))
            .collect();

        entries.sort_by_key(|(_, created_at)| *created_at);

        let to_remove = (self.config.max_entries / 4).max(1);
        for (key, _) in entries.into_iter().take(to_remove) {
            self.cache.remove(&key);
        }

        log::debug!("Evicted {} oldest cache entries", to_remove);
    }

    /// Clear all cache entries
    pub fn clear(&self) {
        self.cache.clear();
        log::info!("Resolved URL cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let (total_entries, expired_entries) =
            self.cache.iter().fold((0, 0), |(total, expired), entry| {
                (total + 1, expired + usize::from(!entry.value().is_valid()))
            });

        CacheStats {
            total_entries,
            valid_entries: total_entries - expired_entries,
            expired_entries,
            max_entries: self.config.max_entries,
        }
    }

    #[cfg(test)]
    fn insert_raw(&self, key: CoalescingKey, cached: CachedUrl) {
        self.cache.insert(key, cached);
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub max_entries: usize,
}

pub type SharedResolvedUrlCache = Arc<ResolvedUrlCache>;
