use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

use mt_common::db::insert_search_event;
use mt_common::{GeoPoint, SearchKeywordEvent};

use crate::error::ApiError;
use crate::SharedState;

#[derive(Debug, Deserialize)]
pub struct SearchEventRequest {
    pub member_id: Option<i64>,
    pub keyword: String,
    pub clicked_food_id: Option<i64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Records one search or click event. Fire-and-forget: the write happens
/// on a detached task and failure is logged, never surfaced, so event
/// logging can never slow down or break a search.
pub async fn submit_search_event(
    State(state): State<SharedState>,
    Json(request): Json<SearchEventRequest>,
) -> Result<StatusCode, ApiError> {
    if request.keyword.trim().is_empty() {
        return Err(ApiError::BadRequest("keyword must not be blank".into()));
    }

    let location = match (request.lat, request.lon) {
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

    let event = SearchKeywordEvent::from_raw(
        request.member_id,
        &request.keyword,
        request.clicked_food_id,
        location,
        Utc::now(),
    );
    if event.normalized_keyword.is_empty() {
        return Err(ApiError::BadRequest("keyword must not be blank".into()));
    }

    let pool = state.pool.clone();
    tokio::spawn(async move {
        if let Err(err) = insert_search_event(&pool, &event).await {
            warn!(error = %err, keyword = %event.normalized_keyword, "search event write failed");
        }
    });

    Ok(StatusCode::ACCEPTED)
}
