use chrono::{DateTime, Utc};
use geo::{Distance as _, Haversine, LineString, Point};
use serde::{Deserialize, Serialize};

use crate::errors::{DiscoveryError, DiscoveryResult};

const POLYLINE_PRECISION: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: None,
        }
    }

    fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

pub fn validate_route(coords: &[Coordinate]) -> DiscoveryResult<()> {
    if coords.is_empty() {
        return Err(DiscoveryError::InvalidInput(
            "route has no coordinates".into(),
        ));
    }
    for (index, coord) in coords.iter().enumerate() {
        if !coord.is_valid() {
            return Err(DiscoveryError::InvalidInput(format!(
                "coordinate {index} out of range: ({}, {})",
                coord.latitude, coord.longitude
            )));
        }
    }
    Ok(())
}

/// Total route length as the sum of consecutive great-circle segment lengths.
pub fn route_length_meters(coords: &[Coordinate]) -> f64 {
    coords
        .windows(2)
        .map(|pair| {
            let from = Point::new(pair[0].longitude, pair[0].latitude);
            let to = Point::new(pair[1].longitude, pair[1].latitude);
            Haversine.distance(from, to)
        })
        .sum()
}

/// Arithmetic mean of the route fixes. An approximation, but fine at the
/// city-block scale the fallback search operates on.
pub fn centroid(coords: &[Coordinate]) -> Option<Coordinate> {
    if coords.is_empty() {
        return None;
    }
    let count = coords.len() as f64;
    let latitude = coords.iter().map(|c| c.latitude).sum::<f64>() / count;
    let longitude = coords.iter().map(|c| c.longitude).sum::<f64>() / count;
    Some(Coordinate::new(latitude, longitude))
}

pub fn encode_route_polyline(coords: &[Coordinate]) -> DiscoveryResult<String> {
    let line = LineString::from(
        coords
            .iter()
            .map(|c| geo::coord! { x: c.longitude, y: c.latitude })
            .collect::<Vec<_>>(),
    );
    polyline::encode_coordinates(line, POLYLINE_PRECISION).map_err(|err| {
        DiscoveryError::InvalidInput(format!("failed to encode route polyline: {err}"))
    })
}
