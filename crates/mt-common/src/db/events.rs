//! Search keyword event log: append-only writes, windowed reads.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use crate::db::PgPool;
use crate::{GeoPoint, SearchKeywordEvent};

#[derive(Debug, Error)]
pub enum SearchEventStorageError {
    #[error("keyword is blank")]
    BlankKeyword,
    #[error("database pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("database query error: {0}")]
    Query(#[from] tokio_postgres::Error),
}

/// Appends one event. Events are facts; there is no update path.
#[instrument(skip(pool, event), fields(keyword = %event.normalized_keyword))]
pub async fn insert_search_event(
    pool: &PgPool,
    event: &SearchKeywordEvent,
) -> Result<(), SearchEventStorageError> {
    if event.normalized_keyword.is_empty() {
        return Err(SearchEventStorageError::BlankKeyword);
    }

    let client = pool.get().await?;
    let stmt = client
        .prepare_cached(
            "INSERT INTO search_keyword_events (\
                member_id, raw_keyword, normalized_keyword,\
                clicked_food_id, lat, lon, created_at\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .await?;

    client
        .execute(
            &stmt,
            &[
                &event.member_id,
                &event.raw_keyword,
                &event.normalized_keyword,
                &event.clicked_food_id,
                &event.location.map(|p| p.lat),
                &event.location.map(|p| p.lon),
                &event.created_at,
            ],
        )
        .await?;
    Ok(())
}

/// Events with `from <= created_at < to`, oldest first. The half-open
/// range keeps adjacent aggregation windows from double-reading the
/// boundary instant.
#[instrument(skip(pool))]
pub async fn fetch_events_between(
    pool: &PgPool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<SearchKeywordEvent>, SearchEventStorageError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare_cached(
            "SELECT member_id, raw_keyword, normalized_keyword,\
                    clicked_food_id, lat, lon, created_at\
             FROM search_keyword_events\
             WHERE created_at >= $1 AND created_at < $2\
             ORDER BY created_at ASC",
        )
        .await?;
    let rows = client.query(&stmt, &[&from, &to]).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let lat: Option<f64> = row.get("lat");
            let lon: Option<f64> = row.get("lon");
            let location = match (lat, lon) {
                (Some(lat), Some(lon)) => GeoPoint::new(lat, lon).ok(),
                _ => None,
            };
            SearchKeywordEvent {
                member_id: row.get("member_id"),
                raw_keyword: row.get("raw_keyword"),
                normalized_keyword: row.get("normalized_keyword"),
                clicked_food_id: row.get("clicked_food_id"),
                location,
                created_at: row.get("created_at"),
            }
        })
        .collect())
}
