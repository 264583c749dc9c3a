//! End-to-end ranking orchestration: load profile, fetch candidates,
//! filter, score, paginate.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use super::geo::{filter_candidates, CandidateFilter};
use super::scoring::{ScoredCandidate, ScoringEngine};
use super::weights::ScoringConfig;
use crate::{GeoPoint, Store, StoreType, UserProfile};

/// Default upper bound on the candidate-store read.
pub const DEFAULT_CANDIDATE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("member {0} not found")]
    NotFound(i64),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("transient store failure: {0}")]
    Transient(String),
}

/// Failures surfaced by data sources backing the recommender.
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("not found")]
    NotFound,
    #[error("data source unavailable: {0}")]
    Unavailable(String),
}

/// Read-side data the ranking operation needs. Implemented over Postgres
/// in `db` and in-memory in tests.
#[async_trait]
pub trait RecommendationData: Send + Sync {
    async fn load_user_profile(&self, member_id: i64) -> Result<UserProfile, DataSourceError>;

    /// Coarse candidate read; the exact inclusive radius cut happens in
    /// the filter stage, so over-fetching here is fine.
    async fn find_stores_in_radius(
        &self,
        origin: GeoPoint,
        radius_km: f64,
        keyword: Option<&str>,
    ) -> Result<Vec<Store>, DataSourceError>;

    async fn count_favorites(
        &self,
        store_ids: &[i64],
    ) -> Result<HashMap<i64, i64>, DataSourceError>;
}

/// One ranking request as it arrives from the serving layer.
#[derive(Debug, Clone)]
pub struct RankRequest {
    pub member_id: i64,
    /// Falls back to the member's home location when absent.
    pub location: Option<GeoPoint>,
    pub radius_km: f64,
    pub open_only: bool,
    pub store_type: Option<StoreType>,
    pub keyword: Option<String>,
    /// 0-based page index.
    pub page: usize,
    pub size: usize,
}

pub struct Recommender<D> {
    data: D,
    config: ScoringConfig,
    candidate_timeout: Duration,
}

impl<D: RecommendationData> Recommender<D> {
    pub fn new(data: D, config: ScoringConfig) -> Self {
        Self {
            data,
            config,
            candidate_timeout: DEFAULT_CANDIDATE_TIMEOUT,
        }
    }

    pub fn with_candidate_timeout(mut self, timeout: Duration) -> Self {
        self.candidate_timeout = timeout;
        self
    }

    /// Produces the requested page of ranked candidates. Ranks are
    /// positions in the full ordering, so page 1 starts at rank
    /// `size + 1`.
    #[instrument(skip(self), fields(member_id = request.member_id))]
    pub async fn rank(&self, request: RankRequest) -> Result<Vec<ScoredCandidate>, RecommendError> {
        if request.radius_km <= 0.0 || !request.radius_km.is_finite() {
            return Err(RecommendError::InvalidArgument(format!(
                "radius_km must be positive, got {}",
                request.radius_km
            )));
        }
        if request.size == 0 {
            return Err(RecommendError::InvalidArgument(
                "page size must be positive".to_string(),
            ));
        }

        let profile = self
            .data
            .load_user_profile(request.member_id)
            .await
            .map_err(|err| match err {
                DataSourceError::NotFound => RecommendError::NotFound(request.member_id),
                DataSourceError::Unavailable(msg) => RecommendError::Transient(msg),
            })?;

        let origin = request.location.unwrap_or(profile.home_location);

        let stores = tokio::time::timeout(
            self.candidate_timeout,
            self.data
                .find_stores_in_radius(origin, request.radius_km, request.keyword.as_deref()),
        )
        .await
        .map_err(|_| RecommendError::Transient("candidate store read timed out".to_string()))?
        .map_err(|err| RecommendError::Transient(err.to_string()))?;

        let filter = CandidateFilter {
            origin,
            radius_km: request.radius_km,
            excluded_category_ids: profile.disliked_category_ids().into_iter().collect(),
            open_only: request.open_only,
            store_type: request.store_type,
            keyword: request.keyword.clone(),
        };
        // Open-now is evaluated at UTC weekday/time; stored opening
        // windows must be expressed in UTC. Deployments serving a single
        // local market convert store hours to UTC at write time.
        let now = Utc::now();
        let candidates = filter_candidates(stores, &filter, now.naive_utc());

        let store_ids: Vec<i64> = candidates.iter().map(|c| c.store.store_id).collect();
        let favorites = self
            .data
            .count_favorites(&store_ids)
            .await
            .map_err(|err| RecommendError::Transient(err.to_string()))?;

        let engine = ScoringEngine::for_profile(&profile, self.config);
        let ranked = engine.score_all(candidates, &profile, &favorites, request.radius_km, now);

        let start = request.page.saturating_mul(request.size);
        Ok(ranked
            .into_iter()
            .skip(start)
            .take(request.size)
            .collect())
    }
}
