mod cache;
mod catalog;
mod config;
mod discovery;
mod errors;
mod filtering;
mod geo_utils;
mod models;
mod places;
mod preferences;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use cache::{cache_key, Clock, ResultCache, SystemClock};
pub use catalog::{
    category_for_type, catalog_len, classify, known_place_types, Category, CategoryBreakdown,
    DEFAULT_CATEGORY,
};
pub use config::DiscoveryConfig;
pub use discovery::{DiscoveryService, MIN_ROUTE_LENGTH_METERS};
pub use errors::{DiscoveryError, DiscoveryResult};
pub use filtering::{
    apply_preference_filtering, deduplicate_results, RESULT_BUDGET, UNRATED_DROP_THRESHOLD,
};
pub use geo_utils::{
    centroid, encode_route_polyline, route_length_meters, validate_route, Coordinate,
};
pub use models::{DiscoverySource, FallbackReason, NormalizedPlace, PriceLevel};
pub use places::{
    normalize_raw_place, HttpPlacesClient, NearbySearchRequest, PlaceSearch, RawPlace,
    RouteSearchRequest, MAX_RESULT_COUNT, NEARBY_RADIUS_METERS,
};
pub use preferences::{
    normalize_preferences, CanonicalPreferences, EnhancedDataPreferences, UserBehaviorPreferences,
};

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,heros_path_discovery=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
