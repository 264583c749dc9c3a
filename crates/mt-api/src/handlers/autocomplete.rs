use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use mt_common::db::suggest_store_names;
use mt_common::keyword::{normalize_keyword, MAX_PREFIX_CHARS};

use crate::error::ApiError;
use crate::SharedState;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 30;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

#[derive(Debug, Deserialize)]
pub struct AutocompleteQuery {
    pub keyword: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct AutocompleteResponse {
    pub keyword: String,
    pub suggestions: Vec<String>,
    /// True when the ranking cache answered; false on relational fallback.
    pub from_cache: bool,
}

/// Top keywords for a prefix, cache first. A cold or unreachable cache
/// degrades to a relational prefix match instead of failing the request.
pub async fn suggest(
    State(state): State<SharedState>,
    Query(query): Query<AutocompleteQuery>,
) -> Result<Json<AutocompleteResponse>, ApiError> {
    let normalized = normalize_keyword(&query.keyword);
    let limit = query.limit.clamp(1, MAX_LIMIT);

    if normalized.is_empty() {
        return Ok(Json(AutocompleteResponse {
            keyword: normalized,
            suggestions: Vec::new(),
            from_cache: true,
        }));
    }

    // Buckets only exist for the first 1..=3 characters; longer inputs
    // query the longest bucket and narrow client-side.
    let bucket: String = normalized.chars().take(MAX_PREFIX_CHARS).collect();

    // Over-fetch so narrowing by the full input still fills the page.
    let cached = state.ranking.top_keywords(&bucket, limit * 4).await;
    let suggestions = match cached {
        Ok(keywords) => keywords
            .into_iter()
            .filter(|k| k.starts_with(&normalized))
            .take(limit)
            .collect::<Vec<_>>(),
        Err(err) => {
            warn!(error = %err, "ranking cache unavailable, using relational fallback");
            Vec::new()
        }
    };

    if !suggestions.is_empty() {
        return Ok(Json(AutocompleteResponse {
            keyword: normalized,
            suggestions,
            from_cache: true,
        }));
    }

    let fallback = suggest_store_names(&state.pool, &normalized, limit as i64).await?;
    Ok(Json(AutocompleteResponse {
        keyword: normalized,
        suggestions: fallback,
        from_cache: false,
    }))
}
