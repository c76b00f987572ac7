use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::models::NormalizedPlace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    FoodDining,
    ShoppingRetail,
    EntertainmentCulture,
    HealthWellness,
    ServicesUtilities,
    OutdoorsRecreation,
}

/// Category a place lands in when none of its types are recognized.
pub const DEFAULT_CATEGORY: Category = Category::ServicesUtilities;

impl Category {
    pub const ALL: [Category; 6] = [
        Category::FoodDining,
        Category::ShoppingRetail,
        Category::EntertainmentCulture,
        Category::HealthWellness,
        Category::ServicesUtilities,
        Category::OutdoorsRecreation,
    ];

    pub fn as_tag(&self) -> &'static str {
        match self {
            Category::FoodDining => "food_dining",
            Category::ShoppingRetail => "shopping_retail",
            Category::EntertainmentCulture => "entertainment_culture",
            Category::HealthWellness => "health_wellness",
            Category::ServicesUtilities => "services_utilities",
            Category::OutdoorsRecreation => "outdoors_recreation",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::FoodDining => "Food & Dining",
            Category::ShoppingRetail => "Shopping & Retail",
            Category::EntertainmentCulture => "Entertainment & Culture",
            Category::HealthWellness => "Health & Wellness",
            Category::ServicesUtilities => "Services & Utilities",
            Category::OutdoorsRecreation => "Outdoors & Recreation",
        }
    }
}

const PLACE_TYPE_CATALOG: &[(&str, Category)] = &[
    ("restaurant", Category::FoodDining),
    ("cafe", Category::FoodDining),
    ("bakery", Category::FoodDining),
    ("bar", Category::FoodDining),
    ("meal_takeaway", Category::FoodDining),
    ("shopping_mall", Category::ShoppingRetail),
    ("supermarket", Category::ShoppingRetail),
    ("convenience_store", Category::ShoppingRetail),
    ("clothing_store", Category::ShoppingRetail),
    ("book_store", Category::ShoppingRetail),
    ("museum", Category::EntertainmentCulture),
    ("art_gallery", Category::EntertainmentCulture),
    ("movie_theater", Category::EntertainmentCulture),
    ("tourist_attraction", Category::EntertainmentCulture),
    ("amusement_park", Category::EntertainmentCulture),
    ("zoo", Category::EntertainmentCulture),
    ("gym", Category::HealthWellness),
    ("spa", Category::HealthWellness),
    ("pharmacy", Category::HealthWellness),
    ("hospital", Category::HealthWellness),
    ("bank", Category::ServicesUtilities),
    ("atm", Category::ServicesUtilities),
    ("gas_station", Category::ServicesUtilities),
    ("car_repair", Category::ServicesUtilities),
    ("post_office", Category::ServicesUtilities),
    ("park", Category::OutdoorsRecreation),
    ("national_park", Category::OutdoorsRecreation),
    ("hiking_area", Category::OutdoorsRecreation),
    ("campground", Category::OutdoorsRecreation),
    ("dog_park", Category::OutdoorsRecreation),
];

static TYPE_INDEX: Lazy<HashMap<&'static str, Category>> =
    Lazy::new(|| PLACE_TYPE_CATALOG.iter().copied().collect());

pub fn known_place_types() -> impl Iterator<Item = &'static str> {
    PLACE_TYPE_CATALOG.iter().map(|(place_type, _)| *place_type)
}

pub fn catalog_len() -> usize {
    PLACE_TYPE_CATALOG.len()
}

pub fn category_for_type(place_type: &str) -> Option<Category> {
    TYPE_INDEX.get(place_type).copied()
}

/// Derive the category for a place. The primary type wins when it is
/// recognized; otherwise the first recognized entry of `types` decides.
pub fn classify(primary_type: Option<&str>, types: &[String]) -> Category {
    if let Some(category) = primary_type.and_then(category_for_type) {
        return category;
    }
    types
        .iter()
        .find_map(|place_type| category_for_type(place_type))
        .unwrap_or(DEFAULT_CATEGORY)
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryBreakdown {
    pub total: usize,
    pub counts: BTreeMap<Category, usize>,
    pub percentages: BTreeMap<Category, f64>,
    pub most_common: Option<Category>,
    pub least_common: Option<Category>,
}

impl CategoryBreakdown {
    pub fn from_places(places: &[NormalizedPlace]) -> Self {
        let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
        for place in places {
            *counts.entry(place.category).or_insert(0) += 1;
        }

        let total = places.len();
        let mut percentages = BTreeMap::new();
        if total > 0 {
            for (category, count) in &counts {
                percentages.insert(*category, *count as f64 * 100.0 / total as f64);
            }
        }

        // Ties resolve to the earlier category in catalog order.
        let mut most_common: Option<(Category, usize)> = None;
        let mut least_common: Option<(Category, usize)> = None;
        for category in Category::ALL {
            let Some(&count) = counts.get(&category) else {
                continue;
            };
            if most_common.map_or(true, |(_, best)| count > best) {
                most_common = Some((category, count));
            }
            if least_common.map_or(true, |(_, least)| count < least) {
                least_common = Some((category, count));
            }
        }

        Self {
            total,
            counts,
            percentages,
            most_common: most_common.map(|(category, _)| category),
            least_common: least_common.map(|(category, _)| category),
        }
    }
}
