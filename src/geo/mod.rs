//! Geocoding collaborator and its memoizing cache.
//!
//! One cache is constructed per crawl session and passed by reference to
//! whatever issues lookups; there is no process-wide singleton. Results
//! are memoized on first completion, *including* "unknown", so a failing
//! name is never retried within a session.

mod http;

pub use http::HttpGeocoder;

use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use thiserror::Error;

use crate::store::Community;

/// Latitude/longitude pair.
pub type Coordinates = (f64, f64);

/// Geocoding provider failure. Non-fatal: callers degrade to "unknown".
#[derive(Error, Debug)]
#[error("geocoding failed: {0}")]
pub struct GeocodeError(pub String);

/// Location lookup by city name.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a city name to coordinates; `Ok(None)` means the provider
    /// does not know the name.
    async fn geocode(&self, city: &str) -> std::result::Result<Option<Coordinates>, GeocodeError>;
}

/// Memoizing cache over a [`Geocoder`], keyed by city name.
pub struct GeocodeCache {
    cache: Mutex<LruCache<String, Option<Coordinates>>>,
}

impl GeocodeCache {
    /// Create a cache holding up to `capacity` distinct names.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("cache capacity must be at least 1");
        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Look `name` up, consulting the provider only on a cache miss.
    ///
    /// Provider errors are logged and cached as unknown, which suppresses
    /// repeated failing lookups for the same name.
    pub async fn resolve(&self, geocoder: &dyn Geocoder, name: &str) -> Option<Coordinates> {
        if let Some(cached) = self.cache.lock().unwrap().get(name) {
            return *cached;
        }

        let result = match geocoder.geocode(name).await {
            Ok(coordinates) => coordinates,
            Err(e) => {
                log::warn!("geocoding {name:?} failed, caching as unknown: {e}");
                None
            }
        };

        self.cache.lock().unwrap().put(name.to_string(), result);
        result
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().unwrap().is_empty()
    }
}

/// Resolve coordinates for every city in the store that has none yet.
pub async fn geocode_cities(
    community: &mut Community,
    geocoder: &dyn Geocoder,
    cache: &GeocodeCache,
) {
    let pending: Vec<_> = community
        .cities()
        .filter(|(_, city)| city.latitude.is_none())
        .map(|(id, city)| (id, city.name.clone()))
        .collect();

    log::info!("geocoding {} cities", pending.len());

    let mut resolved = 0usize;
    for (id, name) in pending {
        if let Some((latitude, longitude)) = cache.resolve(geocoder, &name).await {
            community.set_city_location(id, latitude, longitude);
            resolved += 1;
        }
    }

    log::info!("geocoding done, {resolved} cities located");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::sample_community;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted geocoder that counts provider calls.
    struct ScriptedGeocoder {
        calls: AtomicUsize,
    }

    impl ScriptedGeocoder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Geocoder for ScriptedGeocoder {
        async fn geocode(
            &self,
            city: &str,
        ) -> std::result::Result<Option<Coordinates>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match city {
                "Moscow" => Ok(Some((55.75, 37.62))),
                "Atlantis" => Ok(None),
                _ => Err(GeocodeError("provider unavailable".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_resolve_memoizes_success() {
        let geocoder = ScriptedGeocoder::new();
        let cache = GeocodeCache::new(16);

        assert_eq!(cache.resolve(&geocoder, "Moscow").await, Some((55.75, 37.62)));
        assert_eq!(cache.resolve(&geocoder, "Moscow").await, Some((55.75, 37.62)));
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_memoizes_unknown() {
        let geocoder = ScriptedGeocoder::new();
        let cache = GeocodeCache::new(16);

        assert_eq!(cache.resolve(&geocoder, "Atlantis").await, None);
        assert_eq!(cache.resolve(&geocoder, "Atlantis").await, None);
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_resolve_caches_provider_failure_as_unknown() {
        let geocoder = ScriptedGeocoder::new();
        let cache = GeocodeCache::new(16);

        assert_eq!(cache.resolve(&geocoder, "Springfield").await, None);
        assert_eq!(cache.resolve(&geocoder, "Springfield").await, None);
        // The failing lookup is not retried.
        assert_eq!(geocoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_geocode_cities_fills_coordinates() {
        let mut c = sample_community();
        let geocoder = ScriptedGeocoder::new();
        let cache = GeocodeCache::new(16);

        geocode_cities(&mut c, &geocoder, &cache).await;

        let moscow = c.cities().find(|(id, _)| *id == 10).unwrap().1;
        assert_eq!(moscow.latitude, Some(55.75));
        assert_eq!(moscow.longitude, Some(37.62));
    }

    #[tokio::test]
    async fn test_geocode_cities_skips_already_located() {
        let mut c = sample_community();
        c.set_city_location(10, 1.0, 2.0);
        let geocoder = ScriptedGeocoder::new();
        let cache = GeocodeCache::new(16);

        geocode_cities(&mut c, &geocoder, &cache).await;

        assert_eq!(geocoder.calls(), 0);
        let moscow = c.cities().find(|(id, _)| *id == 10).unwrap().1;
        assert_eq!(moscow.latitude, Some(1.0));
    }
}
