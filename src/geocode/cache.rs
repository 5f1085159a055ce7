use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tracing::warn;

use crate::geocode::{normalize_place, CachedCoordinates, CoordinateStore, Coordinates, Geocoder};

#[derive(Debug, Clone, Copy)]
enum Flight {
    Pending,
    Done(Option<Coordinates>),
}

/// Read-through coordinate cache. Passed around as an explicit
/// dependency; there is no module-level instance.
///
/// On a miss the provider is queried once and the result persisted
/// under the normalized place string. Provider failures are logged and
/// returned as `None` without being cached, so a later call retries.
/// Concurrent resolutions of the same place coalesce onto a single
/// in-flight provider call; a resolution whose consumer is dropped
/// still completes and populates the store.
pub struct GeocodeCache {
    geocoder: Arc<dyn Geocoder>,
    store: Arc<dyn CoordinateStore>,
    ttl: Option<Duration>,
    pending: Arc<Mutex<HashMap<String, watch::Receiver<Flight>>>>,
}

impl GeocodeCache {
    pub fn new(geocoder: Arc<dyn Geocoder>, store: Arc<dyn CoordinateStore>) -> Self {
        Self {
            geocoder,
            store,
            ttl: None,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// `None` means entries never expire (the default).
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn resolve(&self, place: &str) -> Option<Coordinates> {
        let key = normalize_place(place);
        if key.is_empty() {
            return None;
        }

        match self.store.get(&key) {
            Ok(Some(entry)) if self.is_fresh(&entry) => return Some(entry.coords),
            Ok(_) => {}
            Err(err) => warn!("geocode store read failed for {key}: {err}"),
        }

        let mut pending = self.pending.lock().await;
        let rx = match pending.get(&key) {
            Some(rx) => rx.clone(),
            None => {
                let (tx, rx) = watch::channel(Flight::Pending);
                pending.insert(key.clone(), rx.clone());

                // Detached on purpose: the lookup completes and lands in
                // the store even if every waiter is dropped mid-flight.
                let geocoder = self.geocoder.clone();
                let store = self.store.clone();
                let pending_map = self.pending.clone();
                let task_key = key.clone();
                tokio::spawn(async move {
                    let outcome = match geocoder.geocode(&task_key).await {
                        Ok(coords) => {
                            if let Err(err) = store.put(&task_key, coords) {
                                warn!("geocode store write failed for {task_key}: {err}");
                            }
                            Some(coords)
                        }
                        Err(err) => {
                            warn!("geocoding failed for {task_key}: {err}");
                            None
                        }
                    };
                    let mut pending = pending_map.lock().await;
                    pending.remove(&task_key);
                    drop(pending);
                    let _ = tx.send(Flight::Done(outcome));
                });
                rx
            }
        };
        drop(pending);

        let mut rx = rx;
        loop {
            if let Flight::Done(outcome) = *rx.borrow() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    fn is_fresh(&self, entry: &CachedCoordinates) -> bool {
        let Some(ttl) = self.ttl else {
            return true;
        };
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return true;
        };
        Utc::now() - entry.cached_at <= ttl
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::*;
    use crate::geocode::MemoryStore;

    struct CountingGeocoder {
        calls: AtomicUsize,
        fail_first: AtomicUsize,
        delay: Option<Duration>,
    }

    impl CountingGeocoder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn failing_first(count: usize) -> Self {
            let geocoder = Self::new();
            geocoder.fail_first.store(count, Ordering::SeqCst);
            geocoder
        }

        fn slow(delay: Duration) -> Self {
            let mut geocoder = Self::new();
            geocoder.delay = Some(delay);
            geocoder
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Geocoder for CountingGeocoder {
        async fn geocode(&self, _place: &str) -> Result<Coordinates> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let remaining = self.fail_first.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_first.store(remaining - 1, Ordering::SeqCst);
                return Err(anyhow!("provider unavailable"));
            }
            Ok(Coordinates { lat: 32.8, lng: -96.8 })
        }
    }

    fn cache_with(geocoder: Arc<CountingGeocoder>) -> GeocodeCache {
        GeocodeCache::new(geocoder, Arc::new(MemoryStore::default()))
    }

    #[tokio::test]
    async fn resolves_once_per_distinct_normalized_place() {
        let geocoder = Arc::new(CountingGeocoder::new());
        let cache = cache_with(geocoder.clone());

        assert!(cache.resolve("Dallas, TX").await.is_some());
        assert!(cache.resolve(" dallas,  tx ").await.is_some());
        assert!(cache.resolve("dallas, tx").await.is_some());
        assert_eq!(geocoder.call_count(), 1);

        assert!(cache.resolve("Atlanta, GA").await.is_some());
        assert_eq!(geocoder.call_count(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached_and_later_calls_retry() {
        let geocoder = Arc::new(CountingGeocoder::failing_first(1));
        let cache = cache_with(geocoder.clone());

        assert!(cache.resolve("Dallas, TX").await.is_none());
        assert!(cache.resolve("Dallas, TX").await.is_some());
        assert_eq!(geocoder.call_count(), 2);
    }

    #[tokio::test]
    async fn concurrent_same_key_resolutions_coalesce() {
        let geocoder = Arc::new(CountingGeocoder::slow(Duration::from_millis(50)));
        let cache = Arc::new(cache_with(geocoder.clone()));

        let a = cache.resolve("Dallas, TX");
        let b = cache.resolve("dallas, tx");
        let c = cache.resolve(" DALLAS,  TX");
        let (a, b, c) = tokio::join!(a, b, c);

        assert!(a.is_some() && b.is_some() && c.is_some());
        assert_eq!(geocoder.call_count(), 1);
    }

    #[tokio::test]
    async fn zero_ttl_forces_refresh() {
        let geocoder = Arc::new(CountingGeocoder::new());
        let cache = GeocodeCache::new(geocoder.clone(), Arc::new(MemoryStore::default()))
            .with_ttl(Some(Duration::ZERO));

        assert!(cache.resolve("Dallas, TX").await.is_some());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(cache.resolve("Dallas, TX").await.is_some());
        assert_eq!(geocoder.call_count(), 2);
    }

    #[tokio::test]
    async fn blank_place_short_circuits() {
        let geocoder = Arc::new(CountingGeocoder::new());
        let cache = cache_with(geocoder.clone());
        assert!(cache.resolve("   ").await.is_none());
        assert_eq!(geocoder.call_count(), 0);
    }
}
