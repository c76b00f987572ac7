use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::catalog;
use crate::config::DiscoveryConfig;
use crate::errors::{DiscoveryError, DiscoveryResult};
use crate::geo_utils::Coordinate;
use crate::models::{DiscoverySource, FallbackReason, NormalizedPlace, PriceLevel};

pub const MAX_RESULT_COUNT: u8 = 20;
pub const NEARBY_RADIUS_METERS: f64 = 500.0;

const PLACES_FIELD_MASK: &str = "places.id,places.displayName,places.types,places.primaryType,\
places.location,places.rating,places.priceLevel,places.photos,places.regularOpeningHours";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_INTERVAL_MS: u64 = 50;
const UNKNOWN_PLACE_NAME: &str = "Unknown place";

#[derive(Debug, Clone)]
pub struct RouteSearchRequest {
    pub encoded_polyline: String,
    pub included_types: Vec<String>,
    pub min_rating: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NearbySearchRequest {
    pub center: Coordinate,
    pub radius_meters: f64,
    pub included_types: Vec<String>,
    pub min_rating: Option<f64>,
}

#[async_trait]
pub trait PlaceSearch: Send + Sync {
    async fn search_along_route(
        &self,
        request: &RouteSearchRequest,
    ) -> DiscoveryResult<Vec<RawPlace>>;

    async fn search_nearby(&self, request: &NearbySearchRequest)
        -> DiscoveryResult<Vec<RawPlace>>;
}

/// One place as the provider returns it; everything is optional because the
/// field mask and provider coverage both vary.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPlace {
    pub id: Option<String>,
    pub display_name: Option<DisplayName>,
    pub types: Vec<String>,
    pub primary_type: Option<String>,
    pub location: Option<RawLocation>,
    pub rating: Option<f64>,
    pub price_level: Option<PriceLevel>,
    pub photos: Vec<serde_json::Value>,
    pub regular_opening_hours: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DisplayName {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Map a provider result into the internal shape. Results without an
/// identifier or a location are unusable downstream and are dropped.
pub fn normalize_raw_place(
    raw: RawPlace,
    source: DiscoverySource,
    fallback_reason: Option<FallbackReason>,
    discovered_at: DateTime<Utc>,
) -> Option<NormalizedPlace> {
    let Some(place_id) = raw.id.filter(|id| !id.is_empty()) else {
        trace!("dropping provider result without an id");
        return None;
    };
    let location = match raw.location {
        Some(RawLocation {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }) => Coordinate::new(latitude, longitude),
        _ => {
            trace!(%place_id, "dropping provider result without a location");
            return None;
        }
    };

    let category = catalog::classify(raw.primary_type.as_deref(), &raw.types);
    let name = raw
        .display_name
        .and_then(|display| display.text)
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_PLACE_NAME.to_string());
    let primary_type = raw
        .primary_type
        .or_else(|| raw.types.first().cloned())
        .unwrap_or_default();

    Some(NormalizedPlace {
        place_id,
        name,
        types: raw.types,
        primary_type,
        location,
        rating: raw.rating.filter(|rating| (0.0..=5.0).contains(rating)),
        price_level: raw.price_level,
        category,
        discovery_source: source,
        fallback_reason,
        discovered_at,
        has_photos: !raw.photos.is_empty(),
        has_opening_hours: raw.regular_opening_hours.is_some(),
        saved: false,
        dismissed: false,
    })
}

pub struct HttpPlacesClient {
    http: reqwest::Client,
    api_key: SecretString,
    base: String,
    rate_limiter: RateLimiter,
}

impl HttpPlacesClient {
    pub fn new(config: &DiscoveryConfig) -> DiscoveryResult<Self> {
        let api_key = config
            .places_api_key
            .clone()
            .ok_or_else(|| DiscoveryError::Config("GOOGLE_PLACES_API_KEY is not set".into()))?;
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_key,
            base: config.places_api_base.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::new(config.places_rate_limit_qps),
        })
    }

    async fn post_search<B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> DiscoveryResult<Vec<RawPlace>> {
        self.rate_limiter.wait().await;

        let url = format!("{}/v1/{endpoint}", self.base);
        let response = self
            .http
            .post(&url)
            .header("X-Goog-Api-Key", self.api_key.expose_secret())
            .header("X-Goog-FieldMask", PLACES_FIELD_MASK)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::ProviderStatus {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.places)
    }
}

#[async_trait]
impl PlaceSearch for HttpPlacesClient {
    async fn search_along_route(
        &self,
        request: &RouteSearchRequest,
    ) -> DiscoveryResult<Vec<RawPlace>> {
        let body = RouteSearchBody {
            included_types: non_empty(&request.included_types),
            max_result_count: MAX_RESULT_COUNT,
            rank_preference: "DISTANCE",
            search_along_route_parameters: SearchAlongRouteParameters {
                polyline: PolylinePayload {
                    encoded_polyline: &request.encoded_polyline,
                },
            },
            min_rating: request.min_rating,
        };
        self.post_search("places:searchText", &body).await
    }

    async fn search_nearby(
        &self,
        request: &NearbySearchRequest,
    ) -> DiscoveryResult<Vec<RawPlace>> {
        let body = NearbySearchBody {
            included_types: non_empty(&request.included_types),
            max_result_count: MAX_RESULT_COUNT,
            location_restriction: LocationRestriction {
                circle: Circle {
                    center: LatLng {
                        latitude: request.center.latitude,
                        longitude: request.center.longitude,
                    },
                    radius: request.radius_meters,
                },
            },
            min_rating: request.min_rating,
        };
        self.post_search("places:searchNearby", &body).await
    }
}

fn non_empty(types: &[String]) -> Option<&[String]> {
    if types.is_empty() {
        None
    } else {
        Some(types)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteSearchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    included_types: Option<&'a [String]>,
    max_result_count: u8,
    rank_preference: &'static str,
    search_along_route_parameters: SearchAlongRouteParameters<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_rating: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchAlongRouteParameters<'a> {
    polyline: PolylinePayload<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PolylinePayload<'a> {
    encoded_polyline: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NearbySearchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    included_types: Option<&'a [String]>,
    max_result_count: u8,
    location_restriction: LocationRestriction,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_rating: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationRestriction {
    circle: Circle,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Circle {
    center: LatLng,
    radius: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    places: Vec<RawPlace>,
}

struct RateLimiter {
    min_interval: Duration,
    last_tick: AsyncMutex<Option<Instant>>,
}

impl RateLimiter {
    fn new(qps: u32) -> Self {
        let interval_ms = (1000_f64 / qps.max(1) as f64).ceil() as u64;
        Self {
            min_interval: Duration::from_millis(interval_ms.max(MIN_INTERVAL_MS)),
            last_tick: AsyncMutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut guard = self.last_tick.lock().await;
        if let Some(prev) = *guard {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw_from(value: serde_json::Value) -> RawPlace {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn maps_a_full_provider_result() {
        let raw = raw_from(json!({
            "id": "place-1",
            "displayName": { "text": "Blue Bottle" },
            "types": ["cafe", "store"],
            "primaryType": "cafe",
            "location": { "latitude": 37.77, "longitude": -122.41 },
            "rating": 4.4,
            "priceLevel": "PRICE_LEVEL_MODERATE",
            "photos": [{ "name": "photos/1" }],
            "regularOpeningHours": { "openNow": true }
        }));

        let place = normalize_raw_place(raw, DiscoverySource::Sar, None, Utc::now()).unwrap();
        assert_eq!(place.place_id, "place-1");
        assert_eq!(place.name, "Blue Bottle");
        assert_eq!(place.rating, Some(4.4));
        assert_eq!(place.price_level, Some(PriceLevel::Moderate));
        assert_eq!(place.category, crate::catalog::Category::FoodDining);
        assert_eq!(place.discovery_source, DiscoverySource::Sar);
        assert!(place.has_photos);
        assert!(place.has_opening_hours);
        assert!(!place.saved);
        assert!(!place.dismissed);
    }

    #[test]
    fn defaults_missing_name_and_drops_invalid_rating() {
        let raw = raw_from(json!({
            "id": "place-2",
            "types": ["museum"],
            "location": { "latitude": 1.0, "longitude": 2.0 },
            "rating": 11.0
        }));

        let place = normalize_raw_place(
            raw,
            DiscoverySource::CenterPoint,
            Some(FallbackReason::RouteTooShort),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(place.name, UNKNOWN_PLACE_NAME);
        assert_eq!(place.rating, None);
        assert_eq!(place.primary_type, "museum");
        assert_eq!(place.fallback_reason, Some(FallbackReason::RouteTooShort));
    }

    #[test]
    fn drops_results_without_id_or_location() {
        let no_id = raw_from(json!({
            "location": { "latitude": 1.0, "longitude": 2.0 }
        }));
        assert!(normalize_raw_place(no_id, DiscoverySource::Sar, None, Utc::now()).is_none());

        let no_location = raw_from(json!({ "id": "place-3" }));
        assert!(normalize_raw_place(no_location, DiscoverySource::Sar, None, Utc::now()).is_none());
    }

    #[test]
    fn unknown_price_level_parses_as_unspecified() {
        let raw = raw_from(json!({
            "id": "place-4",
            "location": { "latitude": 1.0, "longitude": 2.0 },
            "priceLevel": "PRICE_LEVEL_BRAND_NEW_TIER"
        }));
        let place = normalize_raw_place(raw, DiscoverySource::Sar, None, Utc::now()).unwrap();
        assert_eq!(place.price_level, Some(PriceLevel::Unspecified));
    }

    #[test]
    fn route_body_omits_types_when_catalog_wide() {
        let body = RouteSearchBody {
            included_types: non_empty(&[]),
            max_result_count: MAX_RESULT_COUNT,
            rank_preference: "DISTANCE",
            search_along_route_parameters: SearchAlongRouteParameters {
                polyline: PolylinePayload {
                    encoded_polyline: "_p~iF~ps|U",
                },
            },
            min_rating: None,
        };
        let encoded = serde_json::to_value(&body).unwrap();
        assert!(encoded.get("includedTypes").is_none());
        assert!(encoded.get("minRating").is_none());
        assert_eq!(encoded["rankPreference"], "DISTANCE");
        assert_eq!(
            encoded["searchAlongRouteParameters"]["polyline"]["encodedPolyline"],
            "_p~iF~ps|U"
        );
    }

    #[test]
    fn rate_limiter_never_drops_below_minimum_interval() {
        let limiter = RateLimiter::new(0);
        assert_eq!(limiter.min_interval, Duration::from_millis(1000));
        let fast = RateLimiter::new(1000);
        assert_eq!(fast.min_interval, Duration::from_millis(MIN_INTERVAL_MS));
    }
}
