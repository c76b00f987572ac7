use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::trace;

use crate::geo_utils::Coordinate;
use crate::models::NormalizedPlace;
use crate::preferences::CanonicalPreferences;

const CACHE_TTL_MINUTES: i64 = 10;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CacheEntry {
    data: Vec<NormalizedPlace>,
    stored_at: DateTime<Utc>,
}

/// Short-TTL cache for discovery results. Explicitly constructed and owned by
/// the service; expired entries are evicted lazily on read, there is no
/// background sweep. Concurrent set on the same key is last-write-wins.
pub struct ResultCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            ttl: Duration::minutes(CACHE_TTL_MINUTES),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<NormalizedPlace>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => now - entry.stored_at >= self.ttl,
        };
        if expired {
            entries.remove(key);
            trace!(key, "cache entry expired");
            return None;
        }
        entries.get(key).map(|entry| entry.data.clone())
    }

    pub fn set(&self, key: String, data: Vec<NormalizedPlace>) {
        let entry = CacheEntry {
            data,
            stored_at: self.clock.now(),
        };
        self.entries.lock().insert(key, entry);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache key over the route endpoints, the full canonical preference record,
/// and the effective minimum rating. BTreeMap-backed preferences serialize in
/// a stable order, so equal inputs always produce equal keys.
pub fn cache_key(coords: &[Coordinate], prefs: &CanonicalPreferences, min_rating: f64) -> String {
    let first = coords.first().copied().unwrap_or(Coordinate::new(0.0, 0.0));
    let last = coords.last().copied().unwrap_or(first);
    let prefs_json = serde_json::to_string(prefs).unwrap_or_default();
    format!(
        "{:.6},{:.6}|{:.6},{:.6}|{prefs_json}|{min_rating:.1}",
        first.latitude, first.longitude, last.latitude, last.longitude
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use parking_lot::Mutex as SyncMutex;
    use serde_json::json;

    use crate::catalog::Category;
    use crate::models::DiscoverySource;
    use crate::preferences::normalize_preferences;

    use super::*;

    struct ManualClock {
        now: SyncMutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                now: SyncMutex::new(now),
            })
        }

        fn advance(&self, delta: Duration) {
            let mut now = self.now.lock();
            *now = *now + delta;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock()
        }
    }

    fn sample_place(id: &str) -> NormalizedPlace {
        NormalizedPlace {
            place_id: id.to_string(),
            name: id.to_string(),
            types: vec!["cafe".to_string()],
            primary_type: "cafe".to_string(),
            location: Coordinate::new(1.0, 2.0),
            rating: Some(4.0),
            price_level: None,
            category: Category::FoodDining,
            discovery_source: DiscoverySource::Sar,
            fallback_reason: None,
            discovered_at: Utc::now(),
            has_photos: false,
            has_opening_hours: false,
            saved: false,
            dismissed: false,
        }
    }

    #[test]
    fn round_trips_within_ttl() {
        let cache = ResultCache::new();
        cache.set("key".to_string(), vec![sample_place("a")]);
        let hit = cache.get("key").unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].place_id, "a");
        assert!(cache.get("other").is_none());
    }

    #[test]
    fn expires_lazily_after_ttl() {
        let clock = ManualClock::starting_at(Utc::now());
        let cache = ResultCache::with_clock(clock.clone());

        cache.set("key".to_string(), vec![sample_place("a")]);
        clock.advance(Duration::minutes(9));
        assert!(cache.get("key").is_some());

        clock.advance(Duration::minutes(1));
        assert!(cache.get("key").is_none());
        // Eviction happened on read.
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = ResultCache::new();
        cache.set("a".to_string(), Vec::new());
        cache.set("b".to_string(), Vec::new());
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn key_is_deterministic_and_sensitive_to_inputs() {
        let route = [Coordinate::new(1.0, 2.0), Coordinate::new(3.0, 4.0)];
        let prefs = normalize_preferences(&json!({ "placeTypes": { "cafe": true } }));

        let key = cache_key(&route, &prefs, 4.0);
        assert_eq!(key, cache_key(&route, &prefs, 4.0));

        assert_ne!(key, cache_key(&route, &prefs, 3.0));
        let other_prefs = normalize_preferences(&json!({ "placeTypes": { "museum": true } }));
        assert_ne!(key, cache_key(&route, &other_prefs, 4.0));
        let other_route = [Coordinate::new(1.0, 2.0), Coordinate::new(5.0, 6.0)];
        assert_ne!(key, cache_key(&other_route, &prefs, 4.0));
    }
}
