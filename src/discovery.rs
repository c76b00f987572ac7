use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{cache_key, ResultCache};
use crate::config::DiscoveryConfig;
use crate::errors::{DiscoveryError, DiscoveryResult};
use crate::filtering::{apply_preference_filtering, deduplicate_results};
use crate::geo_utils::{self, Coordinate};
use crate::models::{DiscoverySource, FallbackReason, NormalizedPlace};
use crate::places::{
    normalize_raw_place, HttpPlacesClient, NearbySearchRequest, PlaceSearch, RouteSearchRequest,
    NEARBY_RADIUS_METERS,
};
use crate::preferences::{normalize_preferences, CanonicalPreferences};

/// Routes shorter than this skip the route search and go straight to the
/// center-point fallback.
pub const MIN_ROUTE_LENGTH_METERS: f64 = 50.0;

/// Route-based place discovery. Owns the provider handle and the result
/// cache; construct one per process and share it.
pub struct DiscoveryService {
    provider: Arc<dyn PlaceSearch>,
    cache: ResultCache,
}

impl DiscoveryService {
    pub fn new(config: &DiscoveryConfig) -> DiscoveryResult<Self> {
        let client = HttpPlacesClient::new(config)?;
        Ok(Self::with_provider(Arc::new(client)))
    }

    pub fn with_provider(provider: Arc<dyn PlaceSearch>) -> Self {
        Self::with_parts(provider, ResultCache::new())
    }

    pub fn with_parts(provider: Arc<dyn PlaceSearch>, cache: ResultCache) -> Self {
        Self { provider, cache }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// The public entry point: normalize preferences, consult the cache, try
    /// the route search, and fall back to a center-point search when the
    /// route is too short or the provider fails. Always resolves to a
    /// (possibly empty) list.
    pub async fn search_along_route_with_fallback(
        &self,
        coords: &[Coordinate],
        raw_preferences: &Value,
        min_rating: Option<f64>,
    ) -> DiscoveryResult<Vec<NormalizedPlace>> {
        geo_utils::validate_route(coords)?;

        let mut prefs = normalize_preferences(raw_preferences);
        if let Some(value) = min_rating {
            if (0.0..=5.0).contains(&value) {
                prefs.min_rating = value;
            } else {
                warn!(value, "ignoring out-of-range minimum rating override");
            }
        }

        let key = cache_key(coords, &prefs, prefs.min_rating);
        if let Some(cached) = self.cache.get(&key) {
            debug!(results = cached.len(), "returning cached discovery results");
            return Ok(cached);
        }

        let route_length = geo_utils::route_length_meters(coords);
        let results = if route_length < MIN_ROUTE_LENGTH_METERS {
            debug!(
                route_length,
                "route below minimum length, going straight to center-point search"
            );
            let places = self
                .perform_center_point_search(coords, &prefs, FallbackReason::RouteTooShort)
                .await?;
            apply_preference_filtering(places, &prefs)
        } else {
            match self.search_along_route(coords, &prefs).await {
                Ok(places) => apply_preference_filtering(places, &prefs),
                Err(err) => {
                    warn!(
                        ?err,
                        route_points = coords.len(),
                        route_length,
                        min_rating = prefs.min_rating,
                        "route search failed, falling back to center-point search"
                    );
                    let places = self
                        .perform_center_point_search(coords, &prefs, FallbackReason::SarApiFailure)
                        .await?;
                    apply_preference_filtering(places, &prefs)
                }
            }
        };

        self.cache.set(key, results.clone());
        Ok(results)
    }

    /// Issue one search-along-route request for the whole route. Returns an
    /// empty list without calling the provider when the route is too short;
    /// provider errors propagate so the caller can decide about fallback.
    pub async fn search_along_route(
        &self,
        coords: &[Coordinate],
        prefs: &CanonicalPreferences,
    ) -> DiscoveryResult<Vec<NormalizedPlace>> {
        geo_utils::validate_route(coords)?;
        if geo_utils::route_length_meters(coords) < MIN_ROUTE_LENGTH_METERS {
            return Ok(Vec::new());
        }

        let request = RouteSearchRequest {
            encoded_polyline: geo_utils::encode_route_polyline(coords)?,
            // Catalog-wide searches omit the type list entirely.
            included_types: if prefs.all_types {
                Vec::new()
            } else {
                prefs.enabled_types()
            },
            min_rating: effective_min_rating(prefs),
        };

        let raw = self.provider.search_along_route(&request).await?;
        let discovered_at = Utc::now();
        Ok(raw
            .into_iter()
            .filter_map(|place| {
                normalize_raw_place(place, DiscoverySource::Sar, None, discovered_at)
            })
            .collect())
    }

    /// Best-effort fallback: one 500 m radius search per enabled type around
    /// the route centroid. A failing type is logged and skipped, it never
    /// aborts the others. Results are merged and deduplicated.
    pub async fn perform_center_point_search(
        &self,
        coords: &[Coordinate],
        prefs: &CanonicalPreferences,
        reason: FallbackReason,
    ) -> DiscoveryResult<Vec<NormalizedPlace>> {
        let Some(center) = geo_utils::centroid(coords) else {
            return Err(DiscoveryError::InvalidInput(
                "cannot compute the centroid of an empty route".into(),
            ));
        };

        let min_rating = effective_min_rating(prefs);
        let searches = prefs.enabled_types().into_iter().map(|place_type| {
            let provider = Arc::clone(&self.provider);
            let request = NearbySearchRequest {
                center,
                radius_meters: NEARBY_RADIUS_METERS,
                included_types: vec![place_type.clone()],
                min_rating,
            };
            async move {
                match provider.search_nearby(&request).await {
                    Ok(raw) => Some(raw),
                    Err(err) => {
                        warn!(?err, %place_type, "nearby search failed, skipping type");
                        None
                    }
                }
            }
        });

        let batches = join_all(searches).await;
        let discovered_at = Utc::now();
        let mut merged = Vec::new();
        for batch in batches.into_iter().flatten() {
            merged.extend(batch.into_iter().filter_map(|place| {
                normalize_raw_place(
                    place,
                    DiscoverySource::CenterPoint,
                    Some(reason),
                    discovered_at,
                )
            }));
        }

        debug!(
            results = merged.len(),
            reason = reason.as_str(),
            "center-point fallback search finished"
        );
        Ok(deduplicate_results(merged))
    }
}

fn effective_min_rating(prefs: &CanonicalPreferences) -> Option<f64> {
    (prefs.min_rating > 0.0).then_some(prefs.min_rating)
}
