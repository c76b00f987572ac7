use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Category;
use crate::geo_utils::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoverySource {
    #[serde(rename = "SAR")]
    Sar,
    #[serde(rename = "center-point")]
    CenterPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackReason {
    #[serde(rename = "route too short")]
    RouteTooShort,
    #[serde(rename = "SAR API failure")]
    SarApiFailure,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::RouteTooShort => "route too short",
            FallbackReason::SarApiFailure => "SAR API failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceLevel {
    #[serde(rename = "PRICE_LEVEL_FREE")]
    Free,
    #[serde(rename = "PRICE_LEVEL_INEXPENSIVE")]
    Inexpensive,
    #[serde(rename = "PRICE_LEVEL_MODERATE")]
    Moderate,
    #[serde(rename = "PRICE_LEVEL_EXPENSIVE")]
    Expensive,
    #[serde(rename = "PRICE_LEVEL_VERY_EXPENSIVE")]
    VeryExpensive,
    #[serde(other, rename = "PRICE_LEVEL_UNSPECIFIED")]
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPlace {
    pub place_id: String,
    pub name: String,
    pub types: Vec<String>,
    pub primary_type: String,
    pub location: Coordinate,
    pub rating: Option<f64>,
    pub price_level: Option<PriceLevel>,
    pub category: Category,
    pub discovery_source: DiscoverySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    pub discovered_at: DateTime<Utc>,
    pub has_photos: bool,
    pub has_opening_hours: bool,
    pub saved: bool,
    pub dismissed: bool,
}
