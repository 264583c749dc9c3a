//! Keyword popularity ranking over an abstract sorted-set store.
//!
//! `RankedStore` is the narrow seam between ranking semantics and the
//! backend; `KeywordRankingCache` owns the key scheme and the operation
//! contracts and never talks wire protocol itself.

pub mod memory;
pub mod redis;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::instrument;

pub use memory::MemoryRankedStore;
pub use self::redis::RedisRankedStore;

#[derive(Debug, Error)]
pub enum RankingStoreError {
    #[error("ranking backend failure: {0}")]
    Backend(String),
}

/// Minimal sorted-set surface the ranking cache needs. Every operation
/// is atomic per key on both backends.
#[async_trait]
pub trait RankedStore: Send + Sync {
    /// Adds `delta` to the member's score, creating it at `delta` if
    /// absent. Returns the new score.
    async fn increment_score(
        &self,
        key: &str,
        member: &str,
        delta: f64,
    ) -> Result<f64, RankingStoreError>;

    /// Absolute write; overwrites any existing score.
    async fn set_score(&self, key: &str, member: &str, score: f64)
        -> Result<(), RankingStoreError>;

    async fn member_score(&self, key: &str, member: &str)
        -> Result<Option<f64>, RankingStoreError>;

    /// Members by descending score, up to `limit`.
    async fn top_members(&self, key: &str, limit: usize) -> Result<Vec<String>, RankingStoreError>;

    async fn cardinality(&self, key: &str) -> Result<usize, RankingStoreError>;

    /// Removes the `count` lowest-scored members.
    async fn remove_lowest(&self, key: &str, count: usize) -> Result<(), RankingStoreError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), RankingStoreError>;
}

/// Sorted-set key for one autocomplete prefix bucket.
pub fn prefix_key(prefix: &str) -> String {
    format!("keyword:prefix:{prefix}")
}

/// Ranking semantics over any [`RankedStore`].
#[derive(Clone)]
pub struct KeywordRankingCache {
    store: Arc<dyn RankedStore>,
}

impl KeywordRankingCache {
    pub fn new(store: Arc<dyn RankedStore>) -> Self {
        Self { store }
    }

    /// Applies a batch of score deltas to one prefix bucket and refreshes
    /// its TTL. An empty batch is a no-op; blank keywords are skipped.
    #[instrument(skip(self, deltas), fields(count = deltas.len()))]
    pub async fn increment_scores(
        &self,
        prefix: &str,
        deltas: &HashMap<String, f64>,
        ttl: Duration,
    ) -> Result<(), RankingStoreError> {
        let applicable: Vec<(&String, &f64)> = deltas
            .iter()
            .filter(|(keyword, _)| !keyword.trim().is_empty())
            .collect();
        if applicable.is_empty() {
            return Ok(());
        }

        let key = prefix_key(prefix);
        for (keyword, delta) in applicable {
            self.store.increment_score(&key, keyword, *delta).await?;
        }
        self.store.expire(&key, ttl).await
    }

    /// Absolute writes for warming; re-running with the same input leaves
    /// the bucket unchanged.
    pub async fn set_scores(
        &self,
        prefix: &str,
        scores: &HashMap<String, f64>,
        ttl: Duration,
    ) -> Result<(), RankingStoreError> {
        if scores.is_empty() {
            return Ok(());
        }
        let key = prefix_key(prefix);
        for (keyword, score) in scores {
            if keyword.trim().is_empty() {
                continue;
            }
            self.store.set_score(&key, keyword, *score).await?;
        }
        self.store.expire(&key, ttl).await
    }

    /// Drops the lowest-scored members beyond `max_keywords`. Idempotent:
    /// a bucket at or under the cap is untouched.
    pub async fn trim_ranking(
        &self,
        prefix: &str,
        max_keywords: usize,
    ) -> Result<(), RankingStoreError> {
        let key = prefix_key(prefix);
        let cardinality = self.store.cardinality(&key).await?;
        if cardinality <= max_keywords {
            return Ok(());
        }
        self.store
            .remove_lowest(&key, cardinality - max_keywords)
            .await
    }

    /// Top keywords for a prefix, best first. A blank prefix, a
    /// non-positive limit, or a missing bucket all yield an empty list,
    /// never an error.
    pub async fn top_keywords(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<String>, RankingStoreError> {
        if prefix.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        self.store.top_members(&prefix_key(prefix), limit).await
    }

    pub async fn keyword_score(
        &self,
        prefix: &str,
        keyword: &str,
    ) -> Result<Option<f64>, RankingStoreError> {
        self.store.member_score(&prefix_key(prefix), keyword).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> KeywordRankingCache {
        KeywordRankingCache::new(Arc::new(MemoryRankedStore::new()))
    }

    fn ttl() -> Duration {
        Duration::from_secs(12 * 3600)
    }

    #[tokio::test]
    async fn increments_accumulate_without_duplicates() {
        let cache = cache();
        let mut first = HashMap::new();
        first.insert("kimchi".to_string(), 5.0);
        cache.increment_scores("k", &first, ttl()).await.unwrap();

        let mut second = HashMap::new();
        second.insert("kimchi".to_string(), 3.0);
        cache.increment_scores("k", &second, ttl()).await.unwrap();

        assert_eq!(cache.keyword_score("k", "kimchi").await.unwrap(), Some(8.0));
        assert_eq!(
            cache.top_keywords("k", 10).await.unwrap(),
            vec!["kimchi".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_and_blank_deltas_are_no_ops() {
        let cache = cache();
        cache
            .increment_scores("k", &HashMap::new(), ttl())
            .await
            .unwrap();

        let mut blanks = HashMap::new();
        blanks.insert("   ".to_string(), 4.0);
        cache.increment_scores("k", &blanks, ttl()).await.unwrap();

        assert!(cache.top_keywords("k", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn trim_keeps_highest_scored() {
        let cache = cache();
        let mut deltas = HashMap::new();
        for (keyword, score) in [("a", 1.0), ("b", 2.0), ("c", 3.0), ("d", 4.0), ("e", 5.0)] {
            deltas.insert(keyword.to_string(), score);
        }
        cache.increment_scores("k", &deltas, ttl()).await.unwrap();

        cache.trim_ranking("k", 2).await.unwrap();

        assert_eq!(
            cache.top_keywords("k", 10).await.unwrap(),
            vec!["e".to_string(), "d".to_string()]
        );

        // Already at the cap: nothing changes.
        cache.trim_ranking("k", 2).await.unwrap();
        assert_eq!(cache.top_keywords("k", 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn top_keywords_orders_by_score_desc() {
        let cache = cache();
        let mut deltas = HashMap::new();
        deltas.insert("kimbap".to_string(), 2.0);
        deltas.insert("kimchi".to_string(), 7.0);
        cache.increment_scores("ki", &deltas, ttl()).await.unwrap();

        assert_eq!(
            cache.top_keywords("ki", 10).await.unwrap(),
            vec!["kimchi".to_string(), "kimbap".to_string()]
        );
        assert_eq!(
            cache.top_keywords("ki", 1).await.unwrap(),
            vec!["kimchi".to_string()]
        );
    }

    #[tokio::test]
    async fn misses_and_degenerate_queries_yield_empty() {
        let cache = cache();
        assert!(cache.top_keywords("zz", 10).await.unwrap().is_empty());
        assert!(cache.top_keywords("  ", 10).await.unwrap().is_empty());
        assert!(cache.top_keywords("k", 0).await.unwrap().is_empty());
        assert_eq!(cache.keyword_score("zz", "nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_scores_are_idempotent() {
        let cache = cache();
        let mut scores = HashMap::new();
        scores.insert("kimchi".to_string(), 40.0);

        cache.set_scores("k", &scores, ttl()).await.unwrap();
        cache.set_scores("k", &scores, ttl()).await.unwrap();

        assert_eq!(
            cache.keyword_score("k", "kimchi").await.unwrap(),
            Some(40.0)
        );
    }
}
