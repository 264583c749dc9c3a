//! Daily cache warming: seeds every prefix bucket with baseline keyword
//! scores so autocomplete has answers before organic traffic builds up.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::keyword::{normalize_keyword, prefixes};
use crate::ranking::KeywordRankingCache;

pub const DEFAULT_WARM_TTL: Duration = Duration::from_secs(24 * 3600);
pub const DEFAULT_MAX_KEYWORDS_PER_PREFIX: usize = 200;

#[derive(Debug, Error)]
pub enum WarmingError {
    #[error("warming source failure: {0}")]
    Source(String),
}

/// Relational read producing `(keyword, baseline_score)` pairs, e.g.
/// store names weighted by favorite count.
#[async_trait]
pub trait WarmingSource: Send + Sync {
    async fn popular_keywords(&self) -> Result<Vec<(String, f64)>, WarmingError>;
}

#[derive(Debug, Clone)]
pub struct WarmerConfig {
    pub ttl: Duration,
    pub max_keywords_per_prefix: usize,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_WARM_TTL,
            max_keywords_per_prefix: DEFAULT_MAX_KEYWORDS_PER_PREFIX,
        }
    }
}

impl WarmerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl: Duration::from_secs(
                env::var("MT_WARM_TTL_SECS")
                    .ok()
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(defaults.ttl.as_secs()),
            ),
            max_keywords_per_prefix: env::var("MT_WARM_MAX_KEYWORDS_PER_PREFIX")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_keywords_per_prefix),
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct WarmReport {
    pub keywords_seeded: usize,
    pub prefixes_written: usize,
    pub prefixes_failed: usize,
}

pub struct CacheWarmer<S> {
    source: S,
    cache: KeywordRankingCache,
    config: WarmerConfig,
}

impl<S: WarmingSource> CacheWarmer<S> {
    pub fn new(source: S, cache: KeywordRankingCache, config: WarmerConfig) -> Self {
        Self {
            source,
            cache,
            config,
        }
    }

    /// Seeds every prefix bucket with absolute scores. Writes overwrite,
    /// so re-running with the same source state is a no-op in effect.
    #[instrument(skip(self))]
    pub async fn warm_all(&self) -> Result<WarmReport, WarmingError> {
        let keywords = self.source.popular_keywords().await?;

        let mut per_prefix: HashMap<String, HashMap<String, f64>> = HashMap::new();
        let mut seeded = 0;
        for (raw, score) in &keywords {
            let keyword = normalize_keyword(raw);
            if keyword.is_empty() {
                continue;
            }
            seeded += 1;
            for prefix in prefixes(&keyword) {
                per_prefix
                    .entry(prefix)
                    .or_default()
                    .insert(keyword.clone(), *score);
            }
        }

        let mut report = WarmReport {
            keywords_seeded: seeded,
            ..WarmReport::default()
        };
        for (prefix, scores) in &per_prefix {
            let written = async {
                self.cache.set_scores(prefix, scores, self.config.ttl).await?;
                self.cache
                    .trim_ranking(prefix, self.config.max_keywords_per_prefix)
                    .await
            }
            .await;
            match written {
                Ok(_) => report.prefixes_written += 1,
                Err(err) => {
                    warn!(prefix, error = %err, "warming write failed, skipping prefix");
                    report.prefixes_failed += 1;
                }
            }
        }

        info!(
            keywords = report.keywords_seeded,
            written = report.prefixes_written,
            failed = report.prefixes_failed,
            "cache warming complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ranking::MemoryRankedStore;

    struct VecSource(Vec<(String, f64)>);

    #[async_trait]
    impl WarmingSource for VecSource {
        async fn popular_keywords(&self) -> Result<Vec<(String, f64)>, WarmingError> {
            Ok(self.0.clone())
        }
    }

    fn warmer(pairs: Vec<(&str, f64)>) -> (CacheWarmer<VecSource>, KeywordRankingCache) {
        let cache = KeywordRankingCache::new(Arc::new(MemoryRankedStore::new()));
        let source = VecSource(
            pairs
                .into_iter()
                .map(|(k, s)| (k.to_string(), s))
                .collect(),
        );
        (
            CacheWarmer::new(source, cache.clone(), WarmerConfig::default()),
            cache,
        )
    }

    #[tokio::test]
    async fn seeds_every_prefix_bucket() {
        let (warmer, cache) = warmer(vec![("Kimchi Stew", 40.0), ("Kimbap", 25.0)]);

        let report = warmer.warm_all().await.unwrap();
        assert_eq!(report.keywords_seeded, 2);
        assert_eq!(report.prefixes_failed, 0);

        assert_eq!(
            cache.top_keywords("ki", 10).await.unwrap(),
            vec!["kimchi stew".to_string(), "kimbap".to_string()]
        );
        assert_eq!(
            cache.keyword_score("kim", "kimbap").await.unwrap(),
            Some(25.0)
        );
    }

    #[tokio::test]
    async fn rewarming_overwrites_instead_of_accumulating() {
        let (warmer, cache) = warmer(vec![("ramen", 10.0)]);

        warmer.warm_all().await.unwrap();
        warmer.warm_all().await.unwrap();

        assert_eq!(cache.keyword_score("r", "ramen").await.unwrap(), Some(10.0));
    }

    #[tokio::test]
    async fn blank_keywords_are_skipped() {
        let (warmer, cache) = warmer(vec![("  ", 10.0), ("udon", 5.0)]);

        let report = warmer.warm_all().await.unwrap();
        assert_eq!(report.keywords_seeded, 1);
        assert_eq!(
            cache.top_keywords("u", 10).await.unwrap(),
            vec!["udon".to_string()]
        );
    }
}
