pub mod events;
pub mod pool;
pub mod profiles;
pub mod stores;

// Keep re-exports unique so downstream crates see a single symbol per helper.
pub use events::{fetch_events_between, insert_search_event, SearchEventStorageError};
pub use pool::{create_pool_from_url, DbPoolError, PgPool};
pub use profiles::{load_user_profile, ProfileFetchError, EXPENDITURE_WINDOW_DAYS};
pub use stores::{
    count_favorites_by_store_ids, find_stores_in_radius, popular_store_keywords,
    suggest_store_names, StoreFetchError,
};

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::aggregation::{AggregationError, SearchEventSource};
use crate::recommend::{DataSourceError, RecommendationData};
use crate::warmer::{WarmingError, WarmingSource};
use crate::{GeoPoint, SearchKeywordEvent, Store, UserProfile};

/// Postgres-backed implementation of every data trait the engine needs.
/// Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct PgDataSource {
    pool: PgPool,
}

impl PgDataSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecommendationData for PgDataSource {
    async fn load_user_profile(&self, member_id: i64) -> Result<UserProfile, DataSourceError> {
        profiles::load_user_profile(&self.pool, member_id)
            .await
            .map_err(|err| match err {
                ProfileFetchError::NotFound(_) => DataSourceError::NotFound,
                other => DataSourceError::Unavailable(other.to_string()),
            })
    }

    async fn find_stores_in_radius(
        &self,
        origin: GeoPoint,
        radius_km: f64,
        keyword: Option<&str>,
    ) -> Result<Vec<Store>, DataSourceError> {
        stores::find_stores_in_radius(&self.pool, origin, radius_km, keyword)
            .await
            .map_err(|err| DataSourceError::Unavailable(err.to_string()))
    }

    async fn count_favorites(
        &self,
        store_ids: &[i64],
    ) -> Result<HashMap<i64, i64>, DataSourceError> {
        stores::count_favorites_by_store_ids(&self.pool, store_ids)
            .await
            .map_err(|err| DataSourceError::Unavailable(err.to_string()))
    }
}

#[async_trait]
impl SearchEventSource for PgDataSource {
    async fn events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SearchKeywordEvent>, AggregationError> {
        events::fetch_events_between(&self.pool, from, to)
            .await
            .map_err(|err| AggregationError::EventSource(err.to_string()))
    }
}

#[async_trait]
impl WarmingSource for PgDataSource {
    async fn popular_keywords(&self) -> Result<Vec<(String, f64)>, WarmingError> {
        stores::popular_store_keywords(&self.pool)
            .await
            .map_err(|err| WarmingError::Source(err.to_string()))
    }
}
