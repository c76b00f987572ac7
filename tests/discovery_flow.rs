use httptest::matchers::{all_of, request};
use httptest::responders::{json_encoded, status_code};
use httptest::{Expectation, Server};
use secrecy::SecretString;
use serde_json::json;

use heros_path_discovery::{
    Coordinate, DiscoveryConfig, DiscoveryService, DiscoverySource, FallbackReason,
};

fn config_for(server: &Server) -> DiscoveryConfig {
    DiscoveryConfig {
        places_api_key: Some(SecretString::from("test-key".to_string())),
        places_api_base: server.url_str("/"),
        places_rate_limit_qps: 50,
    }
}

fn long_route() -> Vec<Coordinate> {
    vec![
        Coordinate::new(37.7749, -122.4194),
        Coordinate::new(37.7929, -122.4194),
    ]
}

fn short_route() -> Vec<Coordinate> {
    vec![
        Coordinate::new(37.7749, -122.4194),
        Coordinate::new(37.77492, -122.41941),
        Coordinate::new(37.77494, -122.41942),
    ]
}

#[tokio::test]
async fn route_search_end_to_end() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of!(
            request::method("POST"),
            request::path("/v1/places:searchText")
        ))
        .times(1)
        .respond_with(json_encoded(json!({
            "places": [
                {
                    "id": "good",
                    "displayName": { "text": "Good Table" },
                    "types": ["restaurant"],
                    "primaryType": "restaurant",
                    "location": { "latitude": 37.7800, "longitude": -122.4190 },
                    "rating": 4.5
                },
                {
                    "id": "meh",
                    "displayName": { "text": "Meh Diner" },
                    "types": ["restaurant"],
                    "primaryType": "restaurant",
                    "location": { "latitude": 37.7810, "longitude": -122.4191 },
                    "rating": 3.0
                }
            ]
        }))),
    );

    let service = DiscoveryService::new(&config_for(&server)).expect("service");
    let results = service
        .search_along_route_with_fallback(
            &long_route(),
            &json!({ "placeTypes": { "restaurant": true }, "minRating": 4.0 }),
            None,
        )
        .await
        .expect("discovery");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].place_id, "good");
    assert_eq!(results[0].discovery_source, DiscoverySource::Sar);
    assert_eq!(results[0].fallback_reason, None);
    assert_eq!(results[0].name, "Good Table");
}

#[tokio::test]
async fn short_route_never_touches_the_route_endpoint() {
    let server = Server::run();
    // Only the nearby endpoint is expected; a route-search request would be
    // unexpected and fail the test.
    server.expect(
        Expectation::matching(all_of!(
            request::method("POST"),
            request::path("/v1/places:searchNearby")
        ))
        .times(1)
        .respond_with(json_encoded(json!({
            "places": [
                {
                    "id": "m1",
                    "displayName": { "text": "City Museum" },
                    "types": ["museum"],
                    "primaryType": "museum",
                    "location": { "latitude": 37.7750, "longitude": -122.4195 },
                    "rating": 4.2
                }
            ]
        }))),
    );

    let service = DiscoveryService::new(&config_for(&server)).expect("service");
    let results = service
        .search_along_route_with_fallback(
            &short_route(),
            &json!({ "placeTypes": { "museum": true } }),
            None,
        )
        .await
        .expect("discovery");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].place_id, "m1");
    assert_eq!(results[0].discovery_source, DiscoverySource::CenterPoint);
    assert_eq!(
        results[0].fallback_reason,
        Some(FallbackReason::RouteTooShort)
    );
}

#[tokio::test]
async fn provider_failure_falls_back_to_center_point() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of!(
            request::method("POST"),
            request::path("/v1/places:searchText")
        ))
        .times(1)
        .respond_with(status_code(500)),
    );
    server.expect(
        Expectation::matching(all_of!(
            request::method("POST"),
            request::path("/v1/places:searchNearby")
        ))
        .times(1)
        .respond_with(json_encoded(json!({
            "places": [
                {
                    "id": "m1",
                    "displayName": { "text": "City Museum" },
                    "types": ["museum"],
                    "primaryType": "museum",
                    "location": { "latitude": 37.7839, "longitude": -122.4194 },
                    "rating": 4.0
                }
            ]
        }))),
    );

    let service = DiscoveryService::new(&config_for(&server)).expect("service");
    let results = service
        .search_along_route_with_fallback(
            &long_route(),
            &json!({ "placeTypes": { "museum": true } }),
            None,
        )
        .await
        .expect("discovery");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].discovery_source, DiscoverySource::CenterPoint);
    assert_eq!(
        results[0].fallback_reason,
        Some(FallbackReason::SarApiFailure)
    );
}

#[tokio::test]
async fn empty_provider_response_is_an_empty_result_not_an_error() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of!(
            request::method("POST"),
            request::path("/v1/places:searchText")
        ))
        .times(1)
        .respond_with(json_encoded(json!({}))),
    );

    let service = DiscoveryService::new(&config_for(&server)).expect("service");
    let results = service
        .search_along_route_with_fallback(&long_route(), &json!({}), None)
        .await
        .expect("discovery");

    assert!(results.is_empty());
}
