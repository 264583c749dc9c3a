//! Windowed aggregation of search events into the keyword ranking cache.
//!
//! Each run drains the events since the last watermark, buckets score
//! deltas per (prefix, keyword), and applies them with atomic increments.
//! A failed prefix is logged and skipped; the watermark only advances on
//! a run that completed its read, so missed events are retried next tick.

use std::collections::HashMap;
use std::env;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::keyword::prefixes;
use crate::ranking::KeywordRankingCache;
use crate::SearchKeywordEvent;

pub const DEFAULT_WINDOW_MINUTES: i64 = 5;
pub const DEFAULT_SEARCH_WEIGHT: f64 = 0.7;
pub const DEFAULT_CLICK_WEIGHT: f64 = 1.3;
pub const DEFAULT_MAX_KEYWORDS_PER_PREFIX: usize = 200;
pub const DEFAULT_TTL: Duration = Duration::from_secs(12 * 3600);

#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("event source failure: {0}")]
    EventSource(String),
}

/// Read side of the search-event log.
#[async_trait]
pub trait SearchEventSource: Send + Sync {
    async fn events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SearchKeywordEvent>, AggregationError>;
}

#[derive(Debug, Clone)]
pub struct AggregationConfig {
    pub window_minutes: i64,
    pub search_weight: f64,
    pub click_weight: f64,
    pub max_keywords_per_prefix: usize,
    pub ttl: Duration,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            window_minutes: DEFAULT_WINDOW_MINUTES,
            search_weight: DEFAULT_SEARCH_WEIGHT,
            click_weight: DEFAULT_CLICK_WEIGHT,
            max_keywords_per_prefix: DEFAULT_MAX_KEYWORDS_PER_PREFIX,
            ttl: DEFAULT_TTL,
        }
    }
}

impl AggregationConfig {
    /// Reads `MT_AGG_*` overrides, falling back to the defaults on
    /// absent or unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            window_minutes: parse_env("MT_AGG_WINDOW_MINUTES", defaults.window_minutes),
            search_weight: parse_env("MT_AGG_SEARCH_WEIGHT", defaults.search_weight),
            click_weight: parse_env("MT_AGG_CLICK_WEIGHT", defaults.click_weight),
            max_keywords_per_prefix: parse_env(
                "MT_AGG_MAX_KEYWORDS_PER_PREFIX",
                defaults.max_keywords_per_prefix,
            ),
            ttl: Duration::from_secs(parse_env(
                "MT_AGG_TTL_SECS",
                defaults.ttl.as_secs(),
            )),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Outcome of one aggregation run, for the worker's logs.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AggregationReport {
    pub events_seen: usize,
    pub prefixes_updated: usize,
    pub prefixes_failed: usize,
}

pub struct KeywordAggregationPipeline<S> {
    events: S,
    cache: KeywordRankingCache,
    config: AggregationConfig,
    last_processed: Mutex<Option<DateTime<Utc>>>,
}

impl<S: SearchEventSource> KeywordAggregationPipeline<S> {
    pub fn new(events: S, cache: KeywordRankingCache, config: AggregationConfig) -> Self {
        Self {
            events,
            cache,
            config,
            last_processed: Mutex::new(None),
        }
    }

    /// Aggregates one window ending at `now`. The first run after startup
    /// covers the configured window length; later runs resume from the
    /// previous watermark.
    #[instrument(skip(self))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<AggregationReport, AggregationError> {
        let from = self
            .watermark()
            .unwrap_or(now - chrono::Duration::minutes(self.config.window_minutes));

        let events = self.events.events_between(from, now).await?;
        let deltas = self.bucket_deltas(&events);

        let mut report = AggregationReport {
            events_seen: events.len(),
            ..AggregationReport::default()
        };

        for (prefix, keyword_deltas) in &deltas {
            let applied = async {
                self.cache
                    .increment_scores(prefix, keyword_deltas, self.config.ttl)
                    .await?;
                self.cache
                    .trim_ranking(prefix, self.config.max_keywords_per_prefix)
                    .await
            }
            .await;
            match applied {
                Ok(_) => report.prefixes_updated += 1,
                Err(err) => {
                    warn!(prefix, error = %err, "prefix update failed, skipping");
                    report.prefixes_failed += 1;
                }
            }
        }

        self.set_watermark(now);
        debug!(
            events = report.events_seen,
            updated = report.prefixes_updated,
            failed = report.prefixes_failed,
            "aggregation run complete"
        );
        Ok(report)
    }

    /// prefix -> keyword -> score delta. A plain search earns the search
    /// weight; a clicked search earns search + click weight.
    fn bucket_deltas(
        &self,
        events: &[SearchKeywordEvent],
    ) -> HashMap<String, HashMap<String, f64>> {
        let mut deltas: HashMap<String, HashMap<String, f64>> = HashMap::new();
        for event in events {
            let keyword = event.normalized_keyword.as_str();
            if keyword.is_empty() {
                continue;
            }
            let mut delta = self.config.search_weight;
            if event.clicked_food_id.is_some() {
                delta += self.config.click_weight;
            }
            for prefix in prefixes(keyword) {
                *deltas
                    .entry(prefix)
                    .or_default()
                    .entry(keyword.to_string())
                    .or_insert(0.0) += delta;
            }
        }
        deltas
    }

    fn watermark(&self) -> Option<DateTime<Utc>> {
        match self.last_processed.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_watermark(&self, to: DateTime<Utc>) {
        match self.last_processed.lock() {
            Ok(mut guard) => *guard = Some(to),
            Err(poisoned) => *poisoned.into_inner() = Some(to),
        }
    }
}
