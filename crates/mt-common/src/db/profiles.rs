//! Member profile reads feeding the scoring engine.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::instrument;

use crate::db::PgPool;
use crate::{
    ExpenditureRecord, GeoPoint, ModelError, RecommendationType, UserProfile,
};

/// How far back expenditure history is loaded.
pub const EXPENDITURE_WINDOW_DAYS: i64 = 180;

#[derive(Debug, Error)]
pub enum ProfileFetchError {
    #[error("member {0} not found")]
    NotFound(i64),
    #[error("database pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("database query error: {0}")]
    Query(#[from] tokio_postgres::Error),
    #[error("stored profile is invalid: {0}")]
    Invalid(#[from] ModelError),
}

/// Loads the full scoring snapshot for one member: recommendation type,
/// home location, category preferences, expenditures inside the
/// 180-day window, and per-store last-visit timestamps.
#[instrument(skip(pool))]
pub async fn load_user_profile(
    pool: &PgPool,
    member_id: i64,
) -> Result<UserProfile, ProfileFetchError> {
    let client = pool.get().await?;

    let member_stmt = client
        .prepare_cached(
            "SELECT recommendation_type, home_lat, home_lon\
             FROM members WHERE member_id = $1",
        )
        .await?;
    let member_row = client
        .query_opt(&member_stmt, &[&member_id])
        .await?
        .ok_or(ProfileFetchError::NotFound(member_id))?;

    let recommendation_type = member_row
        .get::<_, Option<String>>("recommendation_type")
        .as_deref()
        .and_then(RecommendationType::parse)
        .unwrap_or_default();
    let home_location = GeoPoint::new(member_row.get("home_lat"), member_row.get("home_lon"))?;

    let preferences_stmt = client
        .prepare_cached(
            "SELECT category_id, weight\
             FROM member_category_preferences WHERE member_id = $1",
        )
        .await?;
    let category_preferences: HashMap<i64, i32> = client
        .query(&preferences_stmt, &[&member_id])
        .await?
        .into_iter()
        .map(|row| (row.get("category_id"), row.get("weight")))
        .collect();

    let cutoff = Utc::now() - Duration::days(EXPENDITURE_WINDOW_DAYS);
    let expenditures_stmt = client
        .prepare_cached(
            "SELECT category_id, amount, spent_at\
             FROM expenditures\
             WHERE member_id = $1 AND spent_at >= $2\
             ORDER BY spent_at DESC",
        )
        .await?;
    let recent_expenditures: Vec<ExpenditureRecord> = client
        .query(&expenditures_stmt, &[&member_id, &cutoff])
        .await?
        .into_iter()
        .map(|row| ExpenditureRecord {
            category_id: row.get("category_id"),
            amount: row.get("amount"),
            spent_at: row.get("spent_at"),
        })
        .collect();

    let visits_stmt = client
        .prepare_cached(
            "SELECT store_id, MAX(visited_at) AS last_visit\
             FROM store_visits\
             WHERE member_id = $1\
             GROUP BY store_id",
        )
        .await?;
    let visit_history: HashMap<i64, DateTime<Utc>> = client
        .query(&visits_stmt, &[&member_id])
        .await?
        .into_iter()
        .map(|row| (row.get("store_id"), row.get("last_visit")))
        .collect();

    Ok(UserProfile::new(
        member_id,
        recommendation_type,
        category_preferences,
        recent_expenditures,
        visit_history,
        home_location,
    )?)
}
