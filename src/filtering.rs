use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::catalog::Category;
use crate::models::NormalizedPlace;
use crate::preferences::{CanonicalPreferences, EnhancedDataPreferences, UserBehaviorPreferences};

/// Result budget the provider cap and category balancing both work against.
pub const RESULT_BUDGET: usize = 20;

/// Minimum-rating threshold at or above which places with no rating data are
/// dropped instead of passed through.
pub const UNRATED_DROP_THRESHOLD: f64 = 4.5;

/// Run the full preference pipeline. Stages are ordered and each consumes the
/// previous stage's output; the whole thing is pure and deterministic.
pub fn apply_preference_filtering(
    places: Vec<NormalizedPlace>,
    prefs: &CanonicalPreferences,
) -> Vec<NormalizedPlace> {
    let before = places.len();

    let mut current = filter_by_rating(places, prefs.min_rating);
    if !prefs.all_types {
        current.retain(|place| matches_enabled_types(place, prefs));
    }
    if prefs.category_balancing {
        current = balance_categories(current, prefs);
    }
    if let Some(enhanced) = &prefs.enhanced_data {
        current.retain(|place| passes_enhanced_data(place, enhanced));
    }
    if let Some(behavior) = &prefs.user_behavior {
        current.retain(|place| passes_user_behavior(place, behavior));
    }

    debug!(before, after = current.len(), "preference filtering applied");
    current
}

fn filter_by_rating(places: Vec<NormalizedPlace>, min_rating: f64) -> Vec<NormalizedPlace> {
    if min_rating <= 0.0 {
        return places;
    }
    places
        .into_iter()
        .filter(|place| match place.rating {
            Some(rating) => rating >= min_rating,
            None => min_rating < UNRATED_DROP_THRESHOLD,
        })
        .collect()
}

fn matches_enabled_types(place: &NormalizedPlace, prefs: &CanonicalPreferences) -> bool {
    if place.types.is_empty() {
        return prefs.is_type_enabled(&place.primary_type);
    }
    place
        .types
        .iter()
        .any(|place_type| prefs.is_type_enabled(place_type))
}

/// Cap every category's share of the result budget so one category cannot
/// crowd out the rest. The per-category cap divides the budget by the number
/// of categories with enabled types, truncating, and never drops below one.
fn balance_categories(
    places: Vec<NormalizedPlace>,
    prefs: &CanonicalPreferences,
) -> Vec<NormalizedPlace> {
    let enabled = prefs.enabled_categories();
    if enabled.is_empty() {
        return places;
    }
    let max_per_category = (RESULT_BUDGET / enabled.len()).max(1);

    let mut per_category: BTreeMap<Category, Vec<usize>> = BTreeMap::new();
    for (index, place) in places.iter().enumerate() {
        per_category.entry(place.category).or_default().push(index);
    }

    let mut keep = vec![false; places.len()];
    for (_, mut indices) in per_category {
        indices.sort_by(|&a, &b| {
            rating_or_zero(&places[b])
                .partial_cmp(&rating_or_zero(&places[a]))
                .unwrap_or(Ordering::Equal)
        });
        for index in indices.into_iter().take(max_per_category) {
            keep[index] = true;
        }
    }

    places
        .into_iter()
        .enumerate()
        .filter_map(|(index, place)| keep[index].then_some(place))
        .collect()
}

fn rating_or_zero(place: &NormalizedPlace) -> f64 {
    place.rating.unwrap_or(0.0)
}

fn passes_enhanced_data(place: &NormalizedPlace, prefs: &EnhancedDataPreferences) -> bool {
    if prefs.require_photos && !place.has_photos {
        return false;
    }
    if prefs.require_opening_hours && !place.has_opening_hours {
        return false;
    }
    true
}

fn passes_user_behavior(place: &NormalizedPlace, prefs: &UserBehaviorPreferences) -> bool {
    if prefs
        .dismissed_place_ids
        .iter()
        .any(|id| id == &place.place_id)
    {
        return false;
    }
    match &prefs.preferred_categories {
        Some(allowed) if !allowed.is_empty() => allowed.contains(&place.category),
        _ => true,
    }
}

/// First occurrence of each place id wins; relative order of kept items is
/// unchanged. Idempotent.
pub fn deduplicate_results(places: Vec<NormalizedPlace>) -> Vec<NormalizedPlace> {
    let mut seen = HashSet::with_capacity(places.len());
    places
        .into_iter()
        .filter(|place| seen.insert(place.place_id.clone()))
        .collect()
}
