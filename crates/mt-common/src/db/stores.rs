//! Candidate store reads.

use std::collections::HashMap;

use thiserror::Error;
use tracing::instrument;

use crate::db::PgPool;
use crate::{GeoPoint, OpeningHours, Store, StoreType};

#[derive(Debug, Error)]
pub enum StoreFetchError {
    #[error("database pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("database query error: {0}")]
    Query(#[from] tokio_postgres::Error),
    #[error("bad opening_hours payload for store {store_id}: {source}")]
    BadOpeningHours {
        store_id: i64,
        source: serde_json::Error,
    },
    #[error("unknown store_type {value:?} for store {store_id}")]
    UnknownStoreType { store_id: i64, value: String },
    #[error("bad coordinates for store {store_id}")]
    BadCoordinates { store_id: i64 },
}

/// Kilometers per degree of latitude; longitude degrees shrink with
/// cos(lat). Used only for the coarse bounding box, the exact haversine
/// cut happens in the filter stage.
const KM_PER_DEGREE: f64 = 111.0;

/// Fetches stores inside a bounding box around `origin`, optionally
/// narrowed by a case-insensitive keyword match on store or food names.
/// Over-fetches by design; callers apply the exact radius cut.
#[instrument(skip(pool))]
pub async fn find_stores_in_radius(
    pool: &PgPool,
    origin: GeoPoint,
    radius_km: f64,
    keyword: Option<&str>,
) -> Result<Vec<Store>, StoreFetchError> {
    let lat_delta = radius_km / KM_PER_DEGREE;
    let lon_delta = radius_km / (KM_PER_DEGREE * origin.lat.to_radians().cos().max(0.01));

    let lat_min = origin.lat - lat_delta;
    let lat_max = origin.lat + lat_delta;
    let lon_min = origin.lon - lon_delta;
    let lon_max = origin.lon + lon_delta;

    let client = pool.get().await?;

    let rows = if let Some(keyword) = keyword.filter(|k| !k.trim().is_empty()) {
        let pattern = format!("%{}%", keyword.trim());
        let stmt = client
            .prepare_cached(
                "SELECT s.store_id, s.name, s.category_id, s.lat, s.lon, s.store_type,\
                        s.opening_hours,\
                        COALESCE(array_agg(f.name) FILTER (WHERE f.name IS NOT NULL), '{}') AS food_names\
                 FROM stores s\
                 LEFT JOIN foods f ON f.store_id = s.store_id\
                 WHERE s.lat BETWEEN $1 AND $2\
                   AND s.lon BETWEEN $3 AND $4\
                 GROUP BY s.store_id\
                 HAVING s.name ILIKE $5 OR bool_or(f.name ILIKE $5)",
            )
            .await?;
        client
            .query(&stmt, &[&lat_min, &lat_max, &lon_min, &lon_max, &pattern])
            .await?
    } else {
        let stmt = client
            .prepare_cached(
                "SELECT s.store_id, s.name, s.category_id, s.lat, s.lon, s.store_type,\
                        s.opening_hours,\
                        COALESCE(array_agg(f.name) FILTER (WHERE f.name IS NOT NULL), '{}') AS food_names\
                 FROM stores s\
                 LEFT JOIN foods f ON f.store_id = s.store_id\
                 WHERE s.lat BETWEEN $1 AND $2\
                   AND s.lon BETWEEN $3 AND $4\
                 GROUP BY s.store_id",
            )
            .await?;
        client
            .query(&stmt, &[&lat_min, &lat_max, &lon_min, &lon_max])
            .await?
    };

    rows.into_iter()
        .map(|row| {
            let store_id: i64 = row.get("store_id");
            let store_type_raw: String = row.get("store_type");
            let store_type = StoreType::parse(&store_type_raw).ok_or_else(|| {
                StoreFetchError::UnknownStoreType {
                    store_id,
                    value: store_type_raw.clone(),
                }
            })?;
            let opening_hours: OpeningHours = match row.get::<_, Option<serde_json::Value>>("opening_hours") {
                Some(value) => serde_json::from_value(value)
                    .map_err(|source| StoreFetchError::BadOpeningHours { store_id, source })?,
                None => OpeningHours::default(),
            };
            let location = GeoPoint::new(row.get("lat"), row.get("lon"))
                .map_err(|_| StoreFetchError::BadCoordinates { store_id })?;

            Ok(Store {
                store_id,
                name: row.get("name"),
                category_id: row.get("category_id"),
                location,
                store_type,
                opening_hours,
                food_names: row.get("food_names"),
            })
        })
        .collect()
}

/// Favorite counts for a batch of stores. Stores with no favorites are
/// simply absent from the map.
#[instrument(skip(pool, store_ids), fields(count = store_ids.len()))]
pub async fn count_favorites_by_store_ids(
    pool: &PgPool,
    store_ids: &[i64],
) -> Result<HashMap<i64, i64>, StoreFetchError> {
    if store_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let client = pool.get().await?;
    let stmt = client
        .prepare_cached(
            "SELECT store_id, COUNT(*) AS favorites\
             FROM favorites\
             WHERE store_id = ANY($1)\
             GROUP BY store_id",
        )
        .await?;
    let rows = client.query(&stmt, &[&store_ids]).await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get("store_id"), row.get("favorites")))
        .collect())
}

/// Baseline warming input: every store name with its favorite count as
/// the seed score.
#[instrument(skip(pool))]
pub async fn popular_store_keywords(
    pool: &PgPool,
) -> Result<Vec<(String, f64)>, StoreFetchError> {
    let client = pool.get().await?;
    let stmt = client
        .prepare_cached(
            "SELECT s.name, COUNT(v.store_id) AS favorites\
             FROM stores s\
             LEFT JOIN favorites v ON v.store_id = s.store_id\
             GROUP BY s.store_id",
        )
        .await?;
    let rows = client.query(&stmt, &[]).await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.get("name"), row.get::<_, i64>("favorites") as f64))
        .collect())
}

/// Relational autocomplete fallback for when the ranking cache is cold or
/// unreachable: store names by prefix, most-favorited first.
#[instrument(skip(pool))]
pub async fn suggest_store_names(
    pool: &PgPool,
    prefix: &str,
    limit: i64,
) -> Result<Vec<String>, StoreFetchError> {
    let prefix = prefix.trim();
    if prefix.is_empty() || limit <= 0 {
        return Ok(Vec::new());
    }

    let client = pool.get().await?;
    let stmt = client
        .prepare_cached(
            "SELECT s.name\
             FROM stores s\
             LEFT JOIN favorites v ON v.store_id = s.store_id\
             WHERE s.name ILIKE $1\
             GROUP BY s.store_id\
             ORDER BY COUNT(v.store_id) DESC, s.name ASC\
             LIMIT $2",
        )
        .await?;
    let pattern = format!("{prefix}%");
    let rows = client.query(&stmt, &[&pattern, &limit]).await?;

    Ok(rows.into_iter().map(|row| row.get("name")).collect())
}
