use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::catalog::{self, Category};

/// The one canonical preference shape everything downstream consumes.
/// Constructed fresh per call by [`normalize_preferences`]; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPreferences {
    pub place_types: BTreeMap<String, bool>,
    pub min_rating: f64,
    pub all_types: bool,
    pub category_balancing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_data: Option<EnhancedDataPreferences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_behavior: Option<UserBehaviorPreferences>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnhancedDataPreferences {
    pub require_photos: bool,
    pub require_opening_hours: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserBehaviorPreferences {
    pub dismissed_place_ids: Vec<String>,
    pub preferred_categories: Option<Vec<Category>>,
}

impl CanonicalPreferences {
    pub fn defaults() -> Self {
        Self {
            place_types: catalog::known_place_types()
                .map(|place_type| (place_type.to_string(), false))
                .collect(),
            min_rating: 0.0,
            all_types: true,
            category_balancing: true,
            enhanced_data: None,
            user_behavior: None,
        }
    }

    pub fn is_type_enabled(&self, place_type: &str) -> bool {
        self.all_types || self.place_types.get(place_type).copied().unwrap_or(false)
    }

    /// Types a provider request should search for. With `all_types` the whole
    /// catalog is in play.
    pub fn enabled_types(&self) -> Vec<String> {
        if self.all_types {
            return catalog::known_place_types().map(str::to_string).collect();
        }
        self.place_types
            .iter()
            .filter(|(_, &enabled)| enabled)
            .map(|(place_type, _)| place_type.clone())
            .collect()
    }

    /// Categories with at least one enabled type. This is the denominator for
    /// category balancing; a category with no enabled types does not count.
    pub fn enabled_categories(&self) -> BTreeSet<Category> {
        if self.all_types {
            return Category::ALL.into_iter().collect();
        }
        self.place_types
            .iter()
            .filter(|(_, &enabled)| enabled)
            .filter_map(|(place_type, _)| catalog::category_for_type(place_type))
            .collect()
    }
}

/// Normalize any raw preference shape into [`CanonicalPreferences`]. Accepts
/// the structured `{placeTypes: {...}}` form, the legacy flat map, and any
/// malformed value, which degrades to defaults. Never fails.
pub fn normalize_preferences(raw: &Value) -> CanonicalPreferences {
    let Some(object) = raw.as_object() else {
        return CanonicalPreferences::defaults();
    };

    // Structured input keeps its flags under `placeTypes`; the legacy shape
    // is the flat map itself.
    let flag_source = object
        .get("placeTypes")
        .and_then(Value::as_object)
        .unwrap_or(object);

    let mut place_types = BTreeMap::new();
    for place_type in catalog::known_place_types() {
        let enabled = flag_source
            .get(place_type)
            .and_then(Value::as_bool)
            .unwrap_or(false);
        place_types.insert(place_type.to_string(), enabled);
    }

    let enabled_count = place_types.values().filter(|&&enabled| enabled).count();
    // Empty selection means "no preference", not "show nothing".
    let all_types = enabled_count == 0 || enabled_count == catalog::catalog_len();

    CanonicalPreferences {
        place_types,
        min_rating: resolve_min_rating(object),
        all_types,
        category_balancing: object
            .get("categoryBalancing")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        enhanced_data: parse_section(object, "enhancedDataPreferences"),
        user_behavior: parse_section(object, "userBehaviorPreferences"),
    }
}

fn resolve_min_rating(object: &Map<String, Value>) -> f64 {
    let candidate = object
        .get("minRating")
        .and_then(Value::as_f64)
        .or_else(|| object.get("minimumRating").and_then(Value::as_f64))
        .or_else(|| object.get("rating").and_then(Value::as_f64));

    match candidate {
        Some(value) if (0.0..=5.0).contains(&value) => value,
        Some(value) => {
            warn!(value, "minimum rating outside 0-5, ignoring");
            0.0
        }
        None => 0.0,
    }
}

fn parse_section<T>(object: &Map<String, Value>, key: &str) -> Option<T>
where
    T: serde::de::DeserializeOwned,
{
    let section = object.get(key)?;
    if !section.is_object() {
        return None;
    }
    match serde_json::from_value(section.clone()) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(%key, ?err, "ignoring malformed preference section");
            None
        }
    }
}
