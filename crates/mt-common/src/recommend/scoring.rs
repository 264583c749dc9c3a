//! Composite scoring of filtered candidates.
//!
//! Each candidate gets three sub-scores on the 0..=100 scale, a weighted
//! sum per the member's `RecommendationType` preset, and an optional
//! recency penalty for stores visited inside the cooldown window.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::geo::FilteredCandidate;
use super::normalize::{normalize, normalize_log, normalize_min_max};
use super::weights::{ScoreWeights, ScoringConfig};
use crate::UserProfile;

/// Fully scored candidate, ordered and rank-stamped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub store_id: i64,
    pub name: String,
    pub distance_km: f64,
    pub preference_score: f64,
    pub popularity_score: f64,
    pub proximity_score: f64,
    pub recency_penalty: f64,
    pub composite_score: f64,
    /// 1-based position in the full ranking, assigned before pagination.
    pub rank: usize,
}

/// Stateless scorer bound to one member's weights and the run's tunables.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    weights: ScoreWeights,
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(weights: ScoreWeights, config: ScoringConfig) -> Self {
        Self { weights, config }
    }

    pub fn for_profile(profile: &UserProfile, config: ScoringConfig) -> Self {
        Self::new(profile.recommendation_type.weights(), config)
    }

    /// Scores every candidate and returns them sorted: composite desc,
    /// then distance asc, then store id asc. Ties cannot reorder between
    /// runs on the same input.
    pub fn score_all(
        &self,
        candidates: Vec<FilteredCandidate>,
        profile: &UserProfile,
        favorite_counts: &HashMap<i64, i64>,
        radius_km: f64,
        now: DateTime<Utc>,
    ) -> Vec<ScoredCandidate> {
        let max_favorites = candidates
            .iter()
            .map(|c| favorite_counts.get(&c.store.store_id).copied().unwrap_or(0))
            .max()
            .unwrap_or(0) as f64;

        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|candidate| self.score_one(candidate, profile, favorite_counts, max_favorites, radius_km, now))
            .collect();

        scored.sort_by(|a, b| {
            b.composite_score
                .partial_cmp(&a.composite_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    a.distance_km
                        .partial_cmp(&b.distance_km)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.store_id.cmp(&b.store_id))
        });

        for (i, candidate) in scored.iter_mut().enumerate() {
            candidate.rank = i + 1;
        }
        scored
    }

    fn score_one(
        &self,
        candidate: FilteredCandidate,
        profile: &UserProfile,
        favorite_counts: &HashMap<i64, i64>,
        max_favorites: f64,
        radius_km: f64,
        now: DateTime<Utc>,
    ) -> ScoredCandidate {
        let store = candidate.store;

        let preference_score = normalize(
            f64::from(profile.preference_weight(store.category_id)),
            -100.0,
            100.0,
        );

        let favorites = favorite_counts.get(&store.store_id).copied().unwrap_or(0) as f64;
        // With no favorites anywhere the range is degenerate and
        // normalize_log already hands back the neutral 50.
        let popularity_score = normalize_log(favorites, 0.0, max_favorites);

        let proximity_score = 100.0 - normalize_min_max(candidate.distance_km, 0.0, radius_km);

        let weighted = self.weights.preference * preference_score
            + self.weights.popularity * popularity_score
            + self.weights.proximity * proximity_score;

        let recency_penalty = match profile.last_visited(store.store_id) {
            Some(visited_at)
                if now - visited_at <= Duration::days(self.config.recency_window_days) =>
            {
                weighted * self.config.recency_penalty_pct / 100.0
            }
            _ => 0.0,
        };

        ScoredCandidate {
            store_id: store.store_id,
            name: store.name,
            distance_km: candidate.distance_km,
            preference_score,
            popularity_score,
            proximity_score,
            recency_penalty,
            composite_score: (weighted - recency_penalty).clamp(0.0, 100.0),
            rank: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GeoPoint, OpeningHours, RecommendationType, Store, StoreType};

    fn candidate(id: i64, category_id: i64, distance_km: f64) -> FilteredCandidate {
        FilteredCandidate {
            store: Store {
                store_id: id,
                name: format!("store-{id}"),
                category_id,
                location: GeoPoint::new(37.5665, 126.978).unwrap(),
                store_type: StoreType::Restaurant,
                opening_hours: OpeningHours::default(),
                food_names: vec![],
            },
            distance_km,
        }
    }

    fn profile(preferences: &[(i64, i32)]) -> UserProfile {
        UserProfile::new(
            7,
            RecommendationType::Balanced,
            preferences.iter().copied().collect(),
            vec![],
            HashMap::new(),
            GeoPoint::new(37.5665, 126.978).unwrap(),
        )
        .unwrap()
    }

    fn engine() -> ScoringEngine {
        ScoringEngine::new(
            RecommendationType::Balanced.weights(),
            ScoringConfig::default(),
        )
    }

    #[test]
    fn liked_category_outranks_neutral_all_else_equal() {
        let profile = profile(&[(1, 100)]);
        let scored = engine().score_all(
            vec![candidate(1, 1, 1.0), candidate(2, 2, 1.0)],
            &profile,
            &HashMap::new(),
            5.0,
            Utc::now(),
        );

        assert_eq!(scored[0].store_id, 1);
        assert!(scored[0].composite_score > scored[1].composite_score);
        assert_eq!(scored[0].rank, 1);
        assert_eq!(scored[1].rank, 2);
    }

    #[test]
    fn ties_break_by_distance_then_store_id() {
        let profile = profile(&[]);
        // Identical in every sub-score; the tie falls through distance
        // to the store-id tiebreak.
        let scored = engine().score_all(
            vec![candidate(9, 1, 2.0), candidate(3, 1, 2.0)],
            &profile,
            &HashMap::new(),
            5.0,
            Utc::now(),
        );
        assert_eq!(scored[0].store_id, 3);
        assert_eq!(scored[1].store_id, 9);

        // Closer store wins outright once distances differ.
        let scored = engine().score_all(
            vec![candidate(9, 1, 1.0), candidate(3, 1, 4.0)],
            &profile,
            &HashMap::new(),
            5.0,
            Utc::now(),
        );
        assert_eq!(scored[0].store_id, 9);
    }

    #[test]
    fn no_favorites_anywhere_is_neutral_popularity() {
        let profile = profile(&[]);
        let scored = engine().score_all(
            vec![candidate(1, 1, 1.0)],
            &profile,
            &HashMap::new(),
            5.0,
            Utc::now(),
        );
        assert_eq!(scored[0].popularity_score, 50.0);
    }

    #[test]
    fn popular_store_outscores_unpopular() {
        let profile = profile(&[]);
        let mut favorites = HashMap::new();
        favorites.insert(1_i64, 200_i64);
        favorites.insert(2_i64, 3_i64);

        let scored = engine().score_all(
            vec![candidate(1, 1, 1.0), candidate(2, 1, 1.0)],
            &profile,
            &favorites,
            5.0,
            Utc::now(),
        );
        assert_eq!(scored[0].store_id, 1);
        assert!(scored[0].popularity_score > scored[1].popularity_score);
    }

    #[test]
    fn recent_visit_applies_percentage_penalty() {
        let now = Utc::now();
        let mut visits = HashMap::new();
        visits.insert(1_i64, now - Duration::days(2));
        let profile = UserProfile::new(
            7,
            RecommendationType::Balanced,
            HashMap::new(),
            vec![],
            visits,
            GeoPoint::new(37.5665, 126.978).unwrap(),
        )
        .unwrap();

        let scored = engine().score_all(
            vec![candidate(1, 1, 1.0), candidate(2, 1, 1.0)],
            &profile,
            &HashMap::new(),
            5.0,
            now,
        );

        let penalized = scored.iter().find(|c| c.store_id == 1).unwrap();
        let clean = scored.iter().find(|c| c.store_id == 2).unwrap();
        assert!(penalized.recency_penalty > 0.0);
        assert_eq!(clean.recency_penalty, 0.0);
        assert!(penalized.composite_score < clean.composite_score);
        // 20% of the weighted sum.
        let weighted = penalized.composite_score + penalized.recency_penalty;
        assert!((penalized.recency_penalty - weighted * 0.2).abs() < 1e-9);
    }

    #[test]
    fn visit_outside_window_is_not_penalized() {
        let now = Utc::now();
        let mut visits = HashMap::new();
        visits.insert(1_i64, now - Duration::days(30));
        let profile = UserProfile::new(
            7,
            RecommendationType::Balanced,
            HashMap::new(),
            vec![],
            visits,
            GeoPoint::new(37.5665, 126.978).unwrap(),
        )
        .unwrap();

        let scored = engine().score_all(
            vec![candidate(1, 1, 1.0)],
            &profile,
            &HashMap::new(),
            5.0,
            now,
        );
        assert_eq!(scored[0].recency_penalty, 0.0);
    }

    #[test]
    fn composite_stays_on_scale() {
        let profile = profile(&[(1, 100)]);
        let mut favorites = HashMap::new();
        favorites.insert(1_i64, 1000_i64);

        let scored = engine().score_all(
            vec![candidate(1, 1, 0.0)],
            &profile,
            &favorites,
            5.0,
            Utc::now(),
        );
        assert!(scored[0].composite_score <= 100.0);
        assert!(scored[0].composite_score >= 0.0);
    }

    #[test]
    fn empty_input_yields_empty_ranking() {
        let profile = profile(&[]);
        let scored = engine().score_all(vec![], &profile, &HashMap::new(), 5.0, Utc::now());
        assert!(scored.is_empty());
    }

    #[test]
    fn saver_weights_preference_heavier_than_adventurer() {
        let profile_saver = UserProfile::new(
            1,
            RecommendationType::Saver,
            [(1, 100)].into_iter().collect(),
            vec![],
            HashMap::new(),
            GeoPoint::new(37.5665, 126.978).unwrap(),
        )
        .unwrap();
        let profile_adventurer = UserProfile {
            recommendation_type: RecommendationType::Adventurer,
            ..profile_saver.clone()
        };
        let config = ScoringConfig::default();

        let saver = ScoringEngine::for_profile(&profile_saver, config).score_all(
            vec![candidate(1, 1, 5.0)],
            &profile_saver,
            &HashMap::new(),
            5.0,
            Utc::now(),
        );
        let adventurer = ScoringEngine::for_profile(&profile_adventurer, config).score_all(
            vec![candidate(1, 1, 5.0)],
            &profile_adventurer,
            &HashMap::new(),
            5.0,
            Utc::now(),
        );

        // Liked category at max distance: the saver preset leans on
        // preference and scores it higher.
        assert!(saver[0].composite_score > adventurer[0].composite_score);
    }
}
