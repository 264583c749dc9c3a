use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use mt_common::recommend::{RankRequest, ScoredCandidate};
use mt_common::{GeoPoint, StoreType};

use crate::error::ApiError;
use crate::SharedState;

pub const DEFAULT_RADIUS_KM: f64 = 2.0;
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

fn default_radius_km() -> f64 {
    DEFAULT_RADIUS_KM
}

fn default_size() -> usize {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Deserialize)]
pub struct RecommendationsQuery {
    pub member_id: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
    #[serde(default)]
    pub open_only: bool,
    pub store_type: Option<String>,
    pub keyword: Option<String>,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_size")]
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub page: usize,
    pub size: usize,
    pub candidates: Vec<ScoredCandidate>,
}

pub async fn list_recommendations(
    State(state): State<SharedState>,
    Query(query): Query<RecommendationsQuery>,
) -> Result<Json<RecommendationsResponse>, ApiError> {
    let location = match (query.lat, query.lon) {
        (Some(lat), Some(lon)) => Some(
            GeoPoint::new(lat, lon)
                .map_err(|err| ApiError::BadRequest(err.to_string()))?,
        ),
        (None, None) => None,
        _ => {
            return Err(ApiError::BadRequest(
                "lat and lon must be provided together".into(),
            ));
        }
    };

    let store_type = match query.store_type.as_deref() {
        Some(raw) => Some(
            StoreType::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown store_type: {raw}")))?,
        ),
        None => None,
    };

    let size = query.size.clamp(1, MAX_PAGE_SIZE);
    let request = RankRequest {
        member_id: query.member_id,
        location,
        radius_km: query.radius_km,
        open_only: query.open_only,
        store_type,
        keyword: query.keyword,
        page: query.page,
        size,
    };

    let candidates = state.recommender.rank(request).await?;
    Ok(Json(RecommendationsResponse {
        page: query.page,
        size,
        candidates,
    }))
}
