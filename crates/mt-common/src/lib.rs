pub mod aggregation;
pub mod db;
pub mod keyword;
pub mod logging;
pub mod ranking;
pub mod recommend;
pub mod schedule;
pub mod warmer;

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("coordinate out of range: lat={lat}, lon={lon}")]
    CoordinateOutOfRange { lat: f64, lon: f64 },
    #[error("preference weight for category {category_id} must be -100, 0 or 100, got {weight}")]
    InvalidPreferenceWeight { category_id: i64, weight: i32 },
}

/// WGS84 coordinate. Constructed through `new` so out-of-range values are
/// rejected at the boundary instead of surfacing as NaN distances later.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self, ModelError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(ModelError::CoordinateOutOfRange { lat, lon });
        }
        Ok(Self { lat, lon })
    }
}

/// Weighting persona chosen by the member; selects a named weight preset
/// in `recommend::weights`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    Saver,
    Adventurer,
    #[default]
    Balanced,
}

impl RecommendationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationType::Saver => "saver",
            RecommendationType::Adventurer => "adventurer",
            RecommendationType::Balanced => "balanced",
        }
    }

    /// Lenient parse for values read back from storage; unknown values fall
    /// back to `Balanced` rather than failing the whole profile load.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "saver" => Some(RecommendationType::Saver),
            "adventurer" => Some(RecommendationType::Adventurer),
            "balanced" => Some(RecommendationType::Balanced),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    Restaurant,
    Cafeteria,
    Franchise,
}

impl StoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::Restaurant => "restaurant",
            StoreType::Cafeteria => "cafeteria",
            StoreType::Franchise => "franchise",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "restaurant" => Some(StoreType::Restaurant),
            "cafeteria" => Some(StoreType::Cafeteria),
            "franchise" => Some(StoreType::Franchise),
            _ => None,
        }
    }
}

/// One open window on one weekday, with an optional mid-day break during
/// which the store counts as closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningWindow {
    /// 0 = Monday .. 6 = Sunday.
    pub day: u8,
    pub open: NaiveTime,
    pub close: NaiveTime,
    #[serde(default)]
    pub break_start: Option<NaiveTime>,
    #[serde(default)]
    pub break_end: Option<NaiveTime>,
}

impl OpeningWindow {
    fn applies_to(&self, weekday: Weekday) -> bool {
        u32::from(self.day) == weekday.num_days_from_monday()
    }

    fn contains(&self, time: NaiveTime) -> bool {
        if time < self.open || time > self.close {
            return false;
        }
        if let (Some(start), Some(end)) = (self.break_start, self.break_end) {
            // Break boundaries belong to the open period.
            if time > start && time < end {
                return false;
            }
        }
        true
    }
}

/// Weekly opening schedule, expressed in UTC (the open-now check runs
/// against the UTC clock). An empty schedule means the hours are unknown;
/// unknown hours never filter a store out (neutral on missing data).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpeningHours {
    pub windows: Vec<OpeningWindow>,
}

impl OpeningHours {
    pub fn is_open_at(&self, weekday: Weekday, time: NaiveTime) -> bool {
        if self.windows.is_empty() {
            return true;
        }
        self.windows
            .iter()
            .any(|window| window.applies_to(weekday) && window.contains(time))
    }
}

/// Candidate store as read from the relational source. Never mutated by
/// this subsystem.
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    pub store_id: i64,
    pub name: String,
    pub category_id: i64,
    pub location: GeoPoint,
    pub store_type: StoreType,
    pub opening_hours: OpeningHours,
    /// Names of foods linked to this store, used for keyword matching.
    pub food_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpenditureRecord {
    pub category_id: i64,
    pub amount: i64,
    pub spent_at: DateTime<Utc>,
}

/// Immutable per-request snapshot of everything the scorer needs to know
/// about a member.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub member_id: i64,
    pub recommendation_type: RecommendationType,
    /// category id -> weight, strictly in {-100, 0, 100}.
    pub category_preferences: HashMap<i64, i32>,
    pub recent_expenditures: Vec<ExpenditureRecord>,
    /// store id -> last visit timestamp.
    pub visit_history: HashMap<i64, DateTime<Utc>>,
    pub home_location: GeoPoint,
}

impl UserProfile {
    pub fn new(
        member_id: i64,
        recommendation_type: RecommendationType,
        category_preferences: HashMap<i64, i32>,
        recent_expenditures: Vec<ExpenditureRecord>,
        visit_history: HashMap<i64, DateTime<Utc>>,
        home_location: GeoPoint,
    ) -> Result<Self, ModelError> {
        for (&category_id, &weight) in &category_preferences {
            if !matches!(weight, -100 | 0 | 100) {
                return Err(ModelError::InvalidPreferenceWeight {
                    category_id,
                    weight,
                });
            }
        }

        Ok(Self {
            member_id,
            recommendation_type,
            category_preferences,
            recent_expenditures,
            visit_history,
            home_location,
        })
    }

    pub fn preference_weight(&self, category_id: i64) -> i32 {
        self.category_preferences
            .get(&category_id)
            .copied()
            .unwrap_or(0)
    }

    /// Category ids the member marked as disliked (-100); these are excluded
    /// from candidate selection entirely, not merely scored down.
    pub fn disliked_category_ids(&self) -> Vec<i64> {
        self.category_preferences
            .iter()
            .filter(|(_, &weight)| weight == -100)
            .map(|(&category_id, _)| category_id)
            .collect()
    }

    pub fn expenditures_within(&self, days: i64, now: DateTime<Utc>) -> Vec<&ExpenditureRecord> {
        let cutoff = now - Duration::days(days);
        self.recent_expenditures
            .iter()
            .filter(|record| record.spent_at >= cutoff)
            .collect()
    }

    pub fn last_visited(&self, store_id: i64) -> Option<DateTime<Utc>> {
        self.visit_history.get(&store_id).copied()
    }
}

/// Append-only fact recorded on every autocomplete search or click.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchKeywordEvent {
    /// Anonymous searches are allowed.
    pub member_id: Option<i64>,
    pub raw_keyword: String,
    pub normalized_keyword: String,
    pub clicked_food_id: Option<i64>,
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
}

impl SearchKeywordEvent {
    pub fn from_raw(
        member_id: Option<i64>,
        raw_keyword: &str,
        clicked_food_id: Option<i64>,
        location: Option<GeoPoint>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            member_id,
            raw_keyword: raw_keyword.to_string(),
            normalized_keyword: keyword::normalize_keyword(raw_keyword),
            clicked_food_id,
            location,
            created_at,
        }
    }
}
