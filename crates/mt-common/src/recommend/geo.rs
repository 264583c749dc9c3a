//! Geospatial candidate filtering.
//!
//! First stage of the ranking pipeline: cut the candidate set down to
//! stores inside the search radius that pass the member's hard filters,
//! carrying the computed distance forward so scoring never recomputes it.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDateTime};

use crate::keyword::normalize_keyword;
use crate::{GeoPoint, Store, StoreType};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, haversine formula.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Hard filters applied before any scoring.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    pub origin: GeoPoint,
    pub radius_km: f64,
    /// Categories the member dislikes; their stores are dropped outright.
    pub excluded_category_ids: HashSet<i64>,
    pub open_only: bool,
    pub store_type: Option<StoreType>,
    /// Raw keyword; normalized once inside `filter_candidates`.
    pub keyword: Option<String>,
}

/// A store that survived filtering, with its distance from the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredCandidate {
    pub store: Store,
    pub distance_km: f64,
}

/// Applies every filter in `filter` to `stores`, preserving input order.
///
/// The radius cut is inclusive: a store exactly on the boundary stays in.
/// Keyword matching is a case- and diacritic-insensitive substring test
/// over the store name and its linked food names.
pub fn filter_candidates(
    stores: Vec<Store>,
    filter: &CandidateFilter,
    at: NaiveDateTime,
) -> Vec<FilteredCandidate> {
    let needle = filter
        .keyword
        .as_deref()
        .map(normalize_keyword)
        .filter(|k| !k.is_empty());

    stores
        .into_iter()
        .filter_map(|store| {
            if filter.excluded_category_ids.contains(&store.category_id) {
                return None;
            }
            if let Some(wanted) = filter.store_type {
                if store.store_type != wanted {
                    return None;
                }
            }
            if filter.open_only && !store.opening_hours.is_open_at(at.weekday(), at.time()) {
                return None;
            }
            if let Some(needle) = &needle {
                if !matches_keyword(&store, needle) {
                    return None;
                }
            }
            let distance_km = haversine_km(filter.origin, store.location);
            if distance_km > filter.radius_km {
                return None;
            }
            Some(FilteredCandidate { store, distance_km })
        })
        .collect()
}

fn matches_keyword(store: &Store, needle: &str) -> bool {
    if normalize_keyword(&store.name).contains(needle) {
        return true;
    }
    store
        .food_names
        .iter()
        .any(|food| normalize_keyword(food).contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OpeningHours, OpeningWindow};
    use chrono::{NaiveDate, NaiveTime};

    fn store(id: i64, lat: f64, lon: f64) -> Store {
        Store {
            store_id: id,
            name: format!("store-{id}"),
            category_id: 1,
            location: GeoPoint::new(lat, lon).unwrap(),
            store_type: StoreType::Restaurant,
            opening_hours: OpeningHours::default(),
            food_names: vec![],
        }
    }

    fn noon_monday() -> NaiveDateTime {
        // 2025-06-02 is a Monday.
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn base_filter(origin: GeoPoint, radius_km: f64) -> CandidateFilter {
        CandidateFilter {
            origin,
            radius_km,
            excluded_category_ids: HashSet::new(),
            open_only: false,
            store_type: None,
            keyword: None,
        }
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Seoul city hall to Busan city hall, roughly 325 km.
        let seoul = GeoPoint::new(37.5665, 126.978).unwrap();
        let busan = GeoPoint::new(35.1796, 129.0756).unwrap();
        let d = haversine_km(seoul, busan);
        assert!((d - 325.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn zero_distance_for_identical_points() {
        let p = GeoPoint::new(37.5665, 126.978).unwrap();
        assert_eq!(haversine_km(p, p), 0.0);
    }

    #[test]
    fn radius_cut_is_inclusive() {
        let origin = GeoPoint::new(37.5665, 126.978).unwrap();
        let near = store(1, 37.5665, 126.978);
        let far = store(2, 37.5665, 127.5);

        let exact_radius = haversine_km(origin, far.location);
        let filter = base_filter(origin, exact_radius);
        let kept = filter_candidates(vec![near, far], &filter, noon_monday());

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].distance_km, exact_radius);
    }

    #[test]
    fn store_just_beyond_radius_is_dropped() {
        let origin = GeoPoint::new(37.5665, 126.978).unwrap();
        let near = store(1, 37.5665, 126.978);
        let far = store(2, 37.5665, 127.5);

        // Radius a hair short of the far store's distance.
        let distance = haversine_km(origin, far.location);
        let filter = base_filter(origin, distance - 1e-6);
        let kept = filter_candidates(vec![near, far], &filter, noon_monday());

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].store.store_id, 1);
    }

    #[test]
    fn excluded_categories_are_dropped() {
        let origin = GeoPoint::new(37.5665, 126.978).unwrap();
        let mut disliked = store(1, 37.5665, 126.978);
        disliked.category_id = 9;
        let liked = store(2, 37.5665, 126.978);

        let mut filter = base_filter(origin, 5.0);
        filter.excluded_category_ids.insert(9);
        let kept = filter_candidates(vec![disliked, liked], &filter, noon_monday());

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].store.store_id, 2);
    }

    #[test]
    fn open_only_uses_evaluation_time() {
        let origin = GeoPoint::new(37.5665, 126.978).unwrap();
        let mut closed_monday = store(1, 37.5665, 126.978);
        closed_monday.opening_hours = OpeningHours {
            windows: vec![OpeningWindow {
                day: 1, // Tuesday
                open: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                close: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
                break_start: None,
                break_end: None,
            }],
        };

        let mut filter = base_filter(origin, 5.0);
        filter.open_only = true;
        let kept = filter_candidates(vec![closed_monday.clone()], &filter, noon_monday());
        assert!(kept.is_empty());

        filter.open_only = false;
        let kept = filter_candidates(vec![closed_monday], &filter, noon_monday());
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn keyword_matches_food_names_diacritic_insensitive() {
        let origin = GeoPoint::new(37.5665, 126.978).unwrap();
        let mut creperie = store(1, 37.5665, 126.978);
        creperie.food_names = vec!["Crêpe Suzette".to_string()];
        let other = store(2, 37.5665, 126.978);

        let mut filter = base_filter(origin, 5.0);
        filter.keyword = Some("CREPE".to_string());
        let kept = filter_candidates(vec![creperie, other], &filter, noon_monday());

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].store.store_id, 1);
    }

    #[test]
    fn store_type_filter_is_equality() {
        let origin = GeoPoint::new(37.5665, 126.978).unwrap();
        let restaurant = store(1, 37.5665, 126.978);
        let mut cafeteria = store(2, 37.5665, 126.978);
        cafeteria.store_type = StoreType::Cafeteria;

        let mut filter = base_filter(origin, 5.0);
        filter.store_type = Some(StoreType::Cafeteria);
        let kept = filter_candidates(vec![restaurant, cafeteria], &filter, noon_monday());

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].store.store_id, 2);
    }

    #[test]
    fn input_order_is_preserved() {
        let origin = GeoPoint::new(37.5665, 126.978).unwrap();
        let stores = vec![store(3, 37.567, 126.978), store(1, 37.5665, 126.978)];
        let filter = base_filter(origin, 5.0);
        let kept = filter_candidates(stores, &filter, noon_monday());
        assert_eq!(kept[0].store.store_id, 3);
        assert_eq!(kept[1].store.store_id, 1);
    }
}
